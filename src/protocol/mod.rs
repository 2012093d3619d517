//! Invite-code protocols.
//!
//! An invite code is a short human-shareable string that encodes everything
//! needed to join a lobby's virtual network: the network name, the port the
//! host's game listens on, and the shared network secret.
//!
//! Only the PCL dialect exists today, but codes from other launchers are
//! expected eventually, so decoding sits behind the [`InviteProtocol`] trait.
//! A dialect is selected by probing the registry with [`detect`] rather than
//! by caller choice; whichever protocol's `verify` matches wins.

mod error;
mod pcl;

pub use error::ProtocolError;
pub use pcl::PclProtocol;

use crate::config::NetworkTuning;

/// Connection parameters decoded from an invite code.
///
/// Constructed only by a successful [`InviteProtocol::decode`]; a value of
/// this type is always well-formed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Token uniquely identifying the virtual network.
    pub network_name: String,
    /// Port the lobby host's game listens on inside the virtual network.
    pub port: u16,
    /// Shared authentication secret for the virtual network.
    pub secret: String,
}

/// A decodable invite-code dialect.
pub trait InviteProtocol: Sync {
    /// Short dialect name for logs and user-facing messages.
    fn name(&self) -> &'static str;

    /// Check whether `raw` matches this dialect's grammar.
    ///
    /// Applies the same normalization as [`decode`](Self::decode), so the
    /// two always agree: `verify` returns true exactly when `decode`
    /// succeeds.
    fn verify(&self, raw: &str) -> bool;

    /// Decode `raw` into connection parameters.
    ///
    /// Pure function of its input; the only failure is
    /// [`ProtocolError::InvalidInviteCode`].
    fn decode(&self, raw: &str) -> Result<ConnectionParams, ProtocolError>;

    /// Build the daemon startup argument list for a decoded code.
    ///
    /// `hostname` is the per-session daemon identity; `tuning` carries the
    /// relay endpoints and transport flags from configuration.
    fn start_args(
        &self,
        params: &ConnectionParams,
        tuning: &NetworkTuning,
        hostname: &str,
    ) -> Vec<String>;
}

/// All registered invite-code dialects, in probe order.
pub const PROTOCOLS: &[&dyn InviteProtocol] = &[&PclProtocol];

/// Find the first registered protocol whose grammar matches `raw`.
pub fn detect(raw: &str) -> Option<&'static dyn InviteProtocol> {
    PROTOCOLS.iter().copied().find(|p| p.verify(raw))
}
