//! Error types for invite-code decoding.

use thiserror::Error;

/// Errors raised by invite-code protocols.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The string does not match the dialect's grammar.
    ///
    /// Raised at decode time, before any process or network action. There is
    /// no partial success: a code either decodes fully or not at all.
    #[error("invalid {dialect} invite code: {code:?}")]
    InvalidInviteCode {
        /// Dialect that rejected the code.
        dialect: &'static str,
        /// The offending input, after normalization.
        code: String,
    },
}
