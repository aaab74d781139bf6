use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value as JsonValue;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::helper::SqlHelper;
use crate::types::{BindParams, ExecuteOptions, ResultShape};

#[derive(Parser)]
#[command(name = "sqlhelper")]
#[command(about = "Run statements through a lazily created, auto-releasing connection pool", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Dotenv file to load instead of `.env`
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Connect string (overrides config file and env vars)
    #[arg(long, global = true)]
    pub connect_string: Option<String>,

    /// Database user (overrides config file and env vars)
    #[arg(long, global = true)]
    pub user: Option<String>,

    /// Database password (overrides config file and env vars)
    #[arg(long, global = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute one statement and print the result as JSON
    Exec {
        /// Statement text
        sql: String,

        /// Positional bind value (JSON; bare words are taken as strings)
        #[arg(short = 'p', long = "param")]
        params: Vec<String>,

        /// Named bind values as a JSON object
        #[arg(long, conflicts_with = "params")]
        named: Option<String>,

        /// Row shape in the output
        #[arg(long, value_enum, default_value = "object")]
        shape: ShapeArg,

        /// Run without auto-commit (changes are rolled back on release)
        #[arg(long)]
        no_auto_commit: bool,

        /// Maximum number of rows to return (0 for no limit)
        #[arg(long)]
        max_rows: Option<usize>,
    },

    /// Print the resolved configuration (password redacted)
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ShapeArg {
    Object,
    Array,
}

impl From<ShapeArg> for ResultShape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Object => ResultShape::Object,
            ShapeArg::Array => ResultShape::Array,
        }
    }
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load and validate configuration before anything touches the database
    let config = Config::builder()
        .config_path(cli.config)
        .env_file(cli.env_file)
        .connect_string(cli.connect_string)
        .user(cli.user)
        .password(cli.password)
        .build()
        .context("Failed to load configuration")?;

    init_logging(&config.logging.level);

    match cli.command {
        Commands::Exec {
            sql,
            params,
            named,
            shape,
            no_auto_commit,
            max_rows,
        } => {
            let params = parse_params(params, named)?;
            let options = ExecuteOptions {
                result_shape: shape.into(),
                auto_commit: !no_auto_commit,
                max_rows,
            };

            let helper = SqlHelper::from_config(&config.database)?;
            let outcome = helper.simple_execute(&sql, params, Some(options)).await;
            // Tear down regardless so the process does not exit holding connections
            let teardown = helper.destroy_pool().await;

            let result = outcome?;
            teardown?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Config => {
            println!("{:#?}", config);
        }
    }

    Ok(())
}

fn init_logging(default_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_params(positional: Vec<String>, named: Option<String>) -> Result<Option<BindParams>> {
    if let Some(named) = named {
        let value: JsonValue =
            serde_json::from_str(&named).context("--named must be a JSON object")?;
        return match value {
            JsonValue::Object(map) => Ok(Some(BindParams::Named(map.into_iter().collect()))),
            _ => bail!("--named must be a JSON object"),
        };
    }

    if positional.is_empty() {
        return Ok(None);
    }
    let values = positional
        .into_iter()
        .map(|raw| serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw)))
        .collect();
    Ok(Some(BindParams::Positional(values)))
}
