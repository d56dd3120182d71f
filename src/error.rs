use std::path::PathBuf;

use thiserror::Error;

/// Structural problems found while building a dialog graph.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("dialog object `{0}` not found in definition")]
    MissingObject(String),

    #[error("`{0}` is not an object of node entries")]
    NotAnObject(String),

    #[error("no `root` node in `{0}`")]
    MissingRoot(String),

    #[error("node `{id}` has unknown type `{kind}`")]
    UnknownType { id: String, kind: String },

    #[error("node `{id}` is malformed: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("node `{id}` points to missing node `{target}`")]
    DanglingSuccessor { id: String, target: String },

    #[error("choice node `{id}` has {options} options but {texts} translated texts")]
    ChoiceMismatch {
        id: String,
        options: usize,
        texts: usize,
    },

    #[error("condition node `{id}`: {reason}")]
    InvalidCondition { id: String, reason: String },
}

/// Misuse of a running [`DialogSession`](crate::dialog::DialogSession) by its driver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session has not started")]
    NotStarted,

    #[error("session is already running")]
    AlreadyStarted,

    #[error("session has ended")]
    Ended,

    #[error("session is waiting for a delayed advance")]
    Advancing,

    #[error("node `{node}` is not waiting for `{input}`")]
    UnexpectedInput { node: String, input: &'static str },

    #[error("choice {index} out of range ({available} available)")]
    InvalidChoice { index: usize, available: usize },

    #[error("no node with index {0}")]
    UnknownNode(usize),
}

#[derive(Error, Debug)]
pub enum LocalizationError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
