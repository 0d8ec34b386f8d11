use crate::domain::catalog::ProductId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PosError>;

#[derive(Error, Debug)]
pub enum PosError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("catalog source error: {0}")]
    CatalogSource(String),
    #[error("product {0} is no longer in the catalog")]
    UnknownProduct(ProductId),
    #[error(transparent)]
    Ledger(#[from] LedgerStoreError),
}

/// Failures reported by a [`LedgerStore`](crate::domain::ports::LedgerStore)
/// implementation, classified so the writer can decide whether to retry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerStoreError {
    #[error("ledger append timed out")]
    Timeout,
    #[error("ledger rate limited")]
    RateLimited,
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
    #[error("ledger rejected record: {0}")]
    Rejected(String),
}

impl LedgerStoreError {
    /// Whether another attempt at the same write may succeed. `Rejected`
    /// means the store refused the record itself; retrying the identical
    /// record cannot help.
    pub fn is_transient(&self) -> bool {
        !matches!(self, LedgerStoreError::Rejected(_))
    }
}

/// Outcome of an exhausted or refused checkout commit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    #[error("commit failed after {attempts} attempts: {last}")]
    Transient { attempts: u32, last: LedgerStoreError },
    #[error("commit rejected: {0}")]
    Permanent(LedgerStoreError),
    #[error("commit cancelled before completion")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LedgerStoreError::Timeout.is_transient());
        assert!(LedgerStoreError::RateLimited.is_transient());
        assert!(LedgerStoreError::Unavailable("down".into()).is_transient());
        assert!(!LedgerStoreError::Rejected("bad record".into()).is_transient());
    }
}
