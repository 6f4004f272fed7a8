use thiserror::Error;

use crate::model::RecordKey;

#[derive(Error, Debug)]
pub enum FormulaPadError {
    #[error("Record not found in {partition}: {key}")]
    NotFound {
        partition: &'static str,
        key: RecordKey,
    },

    #[error("Unknown partition: {0}")]
    UnknownPartition(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl FormulaPadError {
    /// Storage failures cover everything the embedded database can report:
    /// unknown partitions, I/O, and corrupted partition files.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            FormulaPadError::Storage(_)
                | FormulaPadError::UnknownPartition(_)
                | FormulaPadError::Io(_)
                | FormulaPadError::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FormulaPadError>;
