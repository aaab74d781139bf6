/// sqlhelper CLI
///
/// Runs a single statement through the pooled, auto-releasing execution path
/// and prints the result as JSON. Useful for checking connectivity and
/// configuration without writing any code.

use sqlhelper::cli;

#[tokio::main]
async fn main() {
    if let Err(e) = cli::run_cli().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
