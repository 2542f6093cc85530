//! Time and timestamp utilities

use chrono::Utc;

/// Get current Unix timestamp in seconds
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}
