//! Bridge errors.

use thiserror::Error;

/// Errors raised while decoding a restored cookie.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// A `%` not followed by two hex digits.
    #[error("malformed escape at byte {0}")]
    MalformedEscape(usize),

    /// The decoded bytes are not UTF-8.
    #[error("decoded cookie is not valid UTF-8")]
    InvalidUtf8,
}
