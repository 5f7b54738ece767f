//! Wire format of invocation requests and responses.

use dockmod_common::error::{DockmodError, ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::object::InputArgs;

/// A named argument carrying its JSON-encoded value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallArgument {
    /// Argument wire name.
    pub name: String,
    /// JSON text of the value.
    pub value: String,
}

/// One invocation request from the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Object the function belongs to; empty for a schema call.
    #[serde(default)]
    pub parent_name: String,
    /// Function (or object, on construction) name.
    #[serde(default)]
    pub name: String,
    /// JSON text of the parent's serialized state.
    #[serde(default)]
    pub parent: String,
    /// Raw arguments.
    #[serde(default)]
    pub input_args: Vec<CallArgument>,
}

impl FunctionCall {
    /// Collects the raw arguments by name; a repeated name keeps its last
    /// value.
    pub fn input(&self) -> InputArgs {
        self.input_args
            .iter()
            .map(|arg| (arg.name.as_str(), arg.value.as_bytes()))
            .collect()
    }
}

/// Outcome of an invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CallResponse {
    /// The call succeeded.
    Ok {
        /// Returned value.
        value: Value,
    },
    /// The call failed.
    Error {
        /// Error category.
        kind: ErrorKind,
        /// Human-readable message.
        message: String,
    },
}

impl From<DockmodError> for CallResponse {
    fn from(err: DockmodError) -> Self {
        Self::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
