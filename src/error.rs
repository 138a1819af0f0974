use thiserror::Error;

/// Every failure the engine can surface to a caller.
///
/// Each variant maps to a distinct caller reaction, so a transport layer can
/// translate them into response codes without inspecting messages.
#[derive(Error, Debug)]
pub enum CreditError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },
    #[error("{entity} {id} is {status}; cannot {operation}")]
    InvalidState {
        entity: &'static str,
        id: u64,
        status: String,
        operation: String,
    },
    #[error("Insufficient credit: requested {requested}, available {available}")]
    InsufficientCredit { requested: u64, available: u64 },
    #[error("{entity} {id} is already {current}; refusing transition to {requested}")]
    Conflict {
        entity: &'static str,
        id: u64,
        current: String,
        requested: String,
    },
    #[error("Unknown {entity} status: {status:?}")]
    UnknownStatus { entity: &'static str, status: String },
    #[error("Credit scoring failed: {0}")]
    Scoring(String),
    #[error("Deadline exceeded")]
    Timeout,
    #[error("Persistence error: {0}")]
    PersistenceError(Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDB(#[from] rocksdb::Error),
}

impl CreditError {
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceError(Box::new(std::io::Error::other(message.into())))
    }

    /// True for failures caused by the request itself rather than by the engine
    /// or its collaborators.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::NotFound { .. }
                | Self::InvalidState { .. }
                | Self::InsufficientCredit { .. }
                | Self::Conflict { .. }
                | Self::UnknownStatus { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CreditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(CreditError::ValidationError("bad".into()).is_client_error());
        assert!(
            CreditError::NotFound {
                entity: "payment",
                id: 7
            }
            .is_client_error()
        );
        assert!(!CreditError::Timeout.is_client_error());
        assert!(!CreditError::persistence("disk full").is_client_error());
    }

    #[test]
    fn test_error_messages() {
        let err = CreditError::InsufficientCredit {
            requested: 7000,
            available: 6000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient credit: requested 7000, available 6000"
        );

        let err = CreditError::UnknownStatus {
            entity: "payment",
            status: "REFUNDED".into(),
        };
        assert_eq!(err.to_string(), "Unknown payment status: \"REFUNDED\"");
    }
}
