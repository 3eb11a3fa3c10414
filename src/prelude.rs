use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

/// Type alias for Arc<RwLock<T>>, a common pattern for shared mutable state
pub type RwArc<T> = Arc<RwLock<T>>;

/// Macro to create a new SHA-256 hasher with optional data to hash
///
/// Usage:
/// - `sha256!()` - creates a new hasher
/// - `sha256!(data)` - creates a hasher and updates it with data
/// - `sha256!(data1, data2, ...)` - creates a hasher and updates it with multiple values
///
/// The caller needs `sha2::Digest` in scope.
#[macro_export]
macro_rules! sha256 {
    () => {
        sha2::Sha256::new()
    };
    ($($data:expr),+ $(,)?) => {{
        let mut hasher = sha2::Sha256::new();
        $(
            hasher.update($data);
        )+
        hasher
    }};
}

/// Current wall-clock time as unix seconds.
///
/// A clock before the epoch reads as 0 rather than failing; every caller only
/// compares timestamps it produced itself.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Normalize a catalog item id the way clients are allowed to spell it
/// (`k01`, ` K01 `) into its canonical upper-case form.
pub fn normalize_item_id(id: &str) -> String {
    id.trim().to_ascii_uppercase()
}
