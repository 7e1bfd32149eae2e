use std::path::Path;

use anyhow::{Context, Result};
use rand::Rng;
use tracing::{debug, info};

const PREFIX: &str = "guest";

/// `guest` followed by a random 10-digit number.
pub fn generate_guest_id() -> String {
    let n: u64 = rand::rng().random_range(1_000_000_000..=9_999_999_999);
    format!("{PREFIX}{n}")
}

fn is_valid(id: &str) -> bool {
    id.strip_prefix(PREFIX)
        .is_some_and(|digits| digits.len() == 10 && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Reuse the id stored at `path`, or mint and persist a new one.
pub fn load_or_create(path: &Path) -> Result<String> {
    if let Ok(stored) = std::fs::read_to_string(path) {
        let stored = stored.trim();
        if is_valid(stored) {
            debug!(guest_id = stored, "reusing guest id");
            return Ok(stored.to_string());
        }
    }

    let id = generate_guest_id();
    std::fs::write(path, &id)
        .with_context(|| format!("Failed to write guest id: {}", path.display()))?;
    info!(guest_id = %id, "created guest id");
    Ok(id)
}
