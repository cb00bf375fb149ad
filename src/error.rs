//! The crate-wide error taxonomy.
//!
//! Every fallible operation returns one of these variants. Host callback
//! failures (`Write`, `Flush`, `Seek`, `Read`) are surfaced verbatim and
//! never retried. Record-level mistakes (`TooLong`, `Malformed`) leave the
//! context usable for subsequent operations.

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("Operation failed.")]
    Failed,
    #[error("The page size exponent must be between 9 (512 bytes) and 16 (65536 bytes).")]
    InvalidPageSize,
    #[error("The row does not fit within a single page.")]
    TooLong,
    #[error("The host write callback failed.")]
    Write,
    #[error("The host flush callback failed.")]
    Flush,
    #[error("The host seek failed.")]
    Seek,
    #[error("The host read callback failed.")]
    Read,
    #[error("The file signature is not one this library writes.")]
    InvalidSig,
    #[error("A record header walk went out of bounds.")]
    Malformed,
    #[error("No matching row.")]
    NotFound,
    #[error("The database has not been finalized.")]
    NotFinalized,
    #[error("The search value kind does not match the stored column kind.")]
    TypeMismatch,
    #[error("A page checksum does not match its contents.")]
    InvalidChecksum,
}

impl Error {
    /// The stable numeric code for this error, for hosts that speak the
    /// original integer taxonomy.
    pub fn code(&self) -> i32 {
        match self {
            Error::Failed => -1,
            Error::InvalidPageSize => -2,
            Error::TooLong => -3,
            Error::Write => -4,
            Error::Flush => -5,
            Error::Seek => -6,
            Error::Read => -7,
            Error::InvalidSig => -8,
            Error::Malformed => -9,
            Error::NotFound => -10,
            Error::NotFinalized => -11,
            Error::TypeMismatch => -12,
            Error::InvalidChecksum => -13,
        }
    }
}

#[test]
fn test_codes_are_stable() {
    assert_eq!(Error::Failed.code(), -1);
    assert_eq!(Error::TooLong.code(), -3);
    assert_eq!(Error::NotFound.code(), -10);
    assert_eq!(Error::InvalidChecksum.code(), -13);
}
