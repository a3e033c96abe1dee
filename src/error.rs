use thiserror::Error;

/// Failures surfaced to whoever is ringing up a sale or editing the catalog.
///
/// None of these leave the order session in a partially-modified state.
#[derive(Debug, Error)]
pub enum PosError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{0}")]
    AlreadyExists(String),
    #[error("Could not persist to the database: {0:#}")]
    PersistenceFailure(anyhow::Error),
}

impl PosError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
