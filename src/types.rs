use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Bind parameters for a statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BindParams {
    Positional(Vec<JsonValue>),
    Named(BTreeMap<String, JsonValue>),
}

impl BindParams {
    pub fn is_empty(&self) -> bool {
        match self {
            BindParams::Positional(values) => values.is_empty(),
            BindParams::Named(values) => values.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            BindParams::Positional(values) => values.len(),
            BindParams::Named(values) => values.len(),
        }
    }
}

impl Default for BindParams {
    fn default() -> Self {
        BindParams::Positional(Vec::new())
    }
}

impl From<Vec<JsonValue>> for BindParams {
    fn from(values: Vec<JsonValue>) -> Self {
        BindParams::Positional(values)
    }
}

impl From<BTreeMap<String, JsonValue>> for BindParams {
    fn from(values: BTreeMap<String, JsonValue>) -> Self {
        BindParams::Named(values)
    }
}

/// How rows are rendered in an [`ExecutionResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultShape {
    /// One JSON object per row, keyed by column name
    #[default]
    Object,
    /// One JSON array per row, in column order
    Array,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteOptions {
    pub result_shape: ResultShape,
    pub auto_commit: bool,
    /// Row cap for this statement; the driver's configured cap applies when unset
    pub max_rows: Option<usize>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            result_shape: ResultShape::Object,
            auto_commit: true,
            max_rows: None,
        }
    }
}

/// A single statement to run on one connection
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub statement: String,
    pub params: BindParams,
    pub options: ExecuteOptions,
}

impl ExecutionRequest {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            params: BindParams::default(),
            options: ExecuteOptions::default(),
        }
    }

    pub fn params(mut self, params: impl Into<BindParams>) -> Self {
        self.params = params.into();
        self
    }

    pub fn options(mut self, options: ExecuteOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub columns: Vec<String>,
    pub rows: Vec<JsonValue>,
    pub rows_affected: u64,
}
