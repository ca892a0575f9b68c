use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid time window: {0}")]
    InvalidTimeWindow(String),

    #[error("Refund of {requested} exceeds net paid balance of {net_paid}")]
    InvalidRefund { requested: f64, net_paid: f64 },

    #[error("Order has financial activity (net paid {net_paid}): refund or delete all payment records before voiding")]
    OrderHasActivity { net_paid: f64 },

    #[error("Order {0} is void: no further payment activity is permitted")]
    OrderVoid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
