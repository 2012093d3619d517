//! The PCL invite-code dialect.
//!
//! PCL codes look like `P1A2B-3C4D5-E5F6G`, optionally wrapped in ASCII or
//! full-width brackets as pasted from chat. The leading `P` marks the
//! dialect; the four hex digits after it are the lobby host's game port in
//! base 16; `P<hex4>-<5 chars>` together name the virtual network; the
//! trailing five characters are the network secret.
//!
//! Codes are typed or transcribed by hand, so normalization folds the two
//! classic OCR confusions before matching: letter `O` becomes digit `0` and
//! letter `I` becomes digit `1`.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{ConnectionParams, InviteProtocol, ProtocolError};
use crate::config::NetworkTuning;
use crate::daemon::CoreArgs;

static PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\[【]?(P([0-9A-F]{4})-[A-Z0-9_]{5})-([A-Z0-9_]{5})[\]】]?$")
        .expect("PCL invite pattern is valid")
});

/// Decoder for PCL lobby invite codes.
pub struct PclProtocol;

impl PclProtocol {
    /// Uppercase and fold OCR-confusable glyphs (`O`→`0`, `I`→`1`).
    fn normalize(raw: &str) -> String {
        raw.trim().to_uppercase().replace('O', "0").replace('I', "1")
    }
}

impl InviteProtocol for PclProtocol {
    fn name(&self) -> &'static str {
        "PCL"
    }

    fn verify(&self, raw: &str) -> bool {
        PATTERN.is_match(&Self::normalize(raw))
    }

    fn decode(&self, raw: &str) -> Result<ConnectionParams, ProtocolError> {
        let code = Self::normalize(raw);
        let caps = PATTERN
            .captures(&code)
            .ok_or_else(|| ProtocolError::InvalidInviteCode {
                dialect: self.name(),
                code: code.clone(),
            })?;

        // Group 2 is exactly four hex digits by construction of the pattern.
        let port = u16::from_str_radix(&caps[2], 16).expect("4 hex digits fit in u16");

        Ok(ConnectionParams {
            network_name: caps[1].to_string(),
            port,
            secret: caps[3].to_string(),
        })
    }

    fn start_args(
        &self,
        params: &ConnectionParams,
        tuning: &NetworkTuning,
        hostname: &str,
    ) -> Vec<String> {
        let mut args = CoreArgs::new().no_detach();
        for peer in &tuning.peers {
            args = args.peer(peer);
        }
        args = args.encryption_algorithm(&tuning.encryption);
        if tuning.kcp_proxy {
            args = args.enable_kcp_proxy();
        }
        if tuning.smoltcp {
            args = args.use_smoltcp();
        }
        if tuning.no_tun {
            args = args.no_tun();
        }
        args = args.compression(&tuning.compression);
        if tuning.multi_thread {
            args = args.multi_thread();
        }
        if tuning.latency_first {
            args = args.latency_first();
        }
        args.network_name(&params.network_name)
            .network_secret(&params.secret)
            .hostname(hostname)
            .build()
    }
}
