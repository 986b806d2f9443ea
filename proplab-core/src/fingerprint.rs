//! Config fingerprint — content-addressable hash of the effective settings.
//!
//! Echoed into `summary.json` so every artifact set is attributable to an
//! exact configuration: two runs with the same fingerprint are reproducible
//! from one another.

use crate::config::Config;

/// Deterministic blake3 hex digest of the serialized config.
pub fn config_fingerprint(cfg: &Config) -> String {
    let json = serde_json::to_string(cfg).expect("Config serialization failed");
    blake3::hash(json.as_bytes()).to_hex().to_string()
}
