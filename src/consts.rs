//! Engine-wide constants

use std::time::Duration;

/// Base64 engine used for wallet token envelopes
pub const BASE64_ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Per-request timeout for a single gateway call
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Total wall-clock window for a status polling loop
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Delay between consecutive status probes
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(3);

/// Message attached to the pending outcome produced when the polling window
/// elapses without a terminal status
pub const POLL_TIMEOUT_MESSAGE: &str =
    "Status check timed out while the transaction was still pending";

/// Message for a transaction the gateway still reports as in flight
pub const PENDING_MESSAGE: &str = "The transaction has not reached a terminal status yet";

/// Message attached to errors synthesized for transport-level failures
pub const NETWORK_UNREACHABLE_MESSAGE: &str = "Failed to reach the payment gateway";
