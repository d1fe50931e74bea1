//! Crate-wide error types.
//!
//! Most call sites propagate `anyhow::Result`; this module exists for the few
//! boundaries where callers need to match on error *kind* (store retries,
//! decoder diagnostics) rather than just log-and-bail.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("buffer shorter than minimum ({len} < {min})")]
    TooShort { len: usize, min: usize },
    #[error("truncated varint (remaining-length field never terminated)")]
    TruncatedVarint,
    #[error("varint longer than 4 bytes")]
    VarintTooLong,
    #[error("remaining length {0} exceeds buffer")]
    RemainingLengthOverflow(u32),
    #[error("truncated topic string")]
    TruncatedTopic,
    #[error("topic is not valid UTF-8")]
    InvalidTopicUtf8,
    #[error("truncated packet identifier")]
    TruncatedPacketId,
}

/// Vendor-specific MySQL error codes the Store Adapter must recognize and retry.
pub const MYSQL_DEADLOCK: u16 = 1213;
pub const MYSQL_LOCK_WAIT_TIMEOUT: u16 = 1205;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transient error (code {code}), retries exhausted")]
    RetriesExhausted { code: u16 },
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl StoreError {
    /// Returns the MySQL vendor error code if this is a server error we know how to classify.
    pub fn vendor_code(err: &sqlx::Error) -> Option<u16> {
        match err {
            sqlx::Error::Database(db_err) => db_err.code().and_then(|c| c.parse::<u16>().ok()),
            _ => None,
        }
    }

    pub fn is_retryable(err: &sqlx::Error) -> bool {
        matches!(
            Self::vendor_code(err),
            Some(MYSQL_DEADLOCK) | Some(MYSQL_LOCK_WAIT_TIMEOUT)
        )
    }
}
</content>
