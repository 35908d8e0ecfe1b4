//! Router Error Kinds
//!
//! Every failure the routing core can surface, as one closed enumeration so
//! callers branch on the kind instead of the message text.

use alloy_primitives::Address;
use thiserror::Error;

pub type RouterResult<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// Missing, conflicting or out-of-range inputs. Raised before any network call.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A provider or router was used before it was wired up.
    #[error("{0} not initialized")]
    Uninitialized(&'static str),

    #[error("Unknown token(s): {}", format_addresses(.0))]
    UnknownToken(Vec<Address>),

    /// One route/percentage pair could not be quoted after retries.
    #[error("Quote unavailable for route {route} at {percent}%: {reason}")]
    QuoteUnavailable {
        route: usize,
        percent: u32,
        reason: String,
    },

    #[error("No route found: {0}")]
    NoRouteFound(String),

    /// Every estimator in the gas price chain failed.
    #[error("Gas price unavailable: {0}")]
    GasPriceUnavailable(String),

    #[error("Chain call failed: {0}")]
    Transport(String),

    #[error("Failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}

impl RouterError {
    /// Transport failures are transient; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RouterError::Transport(_))
    }

    pub fn decode(what: &'static str, reason: impl ToString) -> Self {
        RouterError::Decode {
            what,
            reason: reason.to_string(),
        }
    }
}

impl From<alloy_transport::TransportError> for RouterError {
    fn from(err: alloy_transport::TransportError) -> Self {
        RouterError::Transport(err.to_string())
    }
}

fn format_addresses(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(|a| format!("{:?}", a))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_is_retryable() {
        assert!(RouterError::Transport("timeout".into()).is_retryable());
        assert!(!RouterError::NoRouteFound("empty".into()).is_retryable());
        assert!(!RouterError::GasPriceUnavailable("all failed".into()).is_retryable());
    }

    #[test]
    fn test_unknown_token_lists_addresses() {
        let err = RouterError::UnknownToken(vec![Address::ZERO, Address::repeat_byte(0x11)]);
        let msg = err.to_string();
        assert!(msg.contains("0x0000000000000000000000000000000000000000"));
        assert!(msg.contains("0x1111111111111111111111111111111111111111"));
    }

    #[test]
    fn test_uninitialized_message() {
        let err = RouterError::Uninitialized("gas price provider");
        assert_eq!(err.to_string(), "gas price provider not initialized");
    }
}
