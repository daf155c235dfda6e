//! Global shutdown signal for Ctrl+C.

use once_cell::sync::Lazy;
use tokio_util::sync::CancellationToken;

/// Cancelled once the operator asks the launcher to stop.
pub static SHUTDOWN: Lazy<CancellationToken> = Lazy::new(CancellationToken::new);
