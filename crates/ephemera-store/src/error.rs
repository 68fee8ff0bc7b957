use ephemera_types::TypeError;

/// Errors from ephemeral store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The caller supplied something the store refuses to keep.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The payload exceeds the configured object size limit.
    #[error("payload of {size} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { size: u64, max: u64 },

    /// Unknown, malformed, or expired id. Deliberately carries no detail.
    #[error("object not found")]
    NotFound,

    /// A freshly generated id is already in use; nothing was overwritten.
    #[error("generated object id collides with an existing object")]
    IdCollision,

    /// I/O fault in the backing store.
    #[error("backing store fault: {0}")]
    Backing(#[from] std::io::Error),

    /// Rejected configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Returns `true` for errors caused by the caller's input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::PayloadTooLarge { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
