#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Request name is empty")]
    EmptyName,
    #[error("Month filter '{0}' is not in YYYY-MM form")]
    InvalidMonthFilter(String),
    #[error("Tally update for request {0} would decrease a vote count")]
    TallyDecrease(String),
}

#[derive(thiserror::Error, Debug)]
pub enum SnackError {
    #[error("Request {0} was not found")]
    NotFound(String),
    #[error("Request {0} is no longer active, it may have been purchased already")]
    AlreadyPurchased(String),
    #[error("Order {0} already exists and cannot be overwritten")]
    OrderExists(String),
    #[error("A purchase needs at least one request")]
    EmptyPurchase,
    #[error("User {0} is not allowed to purchase")]
    Unauthorized(String),
    #[error("Subscription to the request registry was closed")]
    SubscriptionClosed,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode record: {0}")]
    Encode(String),
    #[error("Failed to decode record: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, SnackError>;

/// CBOR-encode a record for storage.
pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>> {
    minicbor::to_vec(value).map_err(|e| SnackError::Encode(e.to_string()))
}

/// Decode a stored record.
pub(crate) fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|e| SnackError::Decode(e.to_string()))
}
