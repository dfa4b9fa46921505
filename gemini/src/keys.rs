//! Round-robin credential rotation across long batch runs.
//!
//! A [`KeyRing`] holds the configured API keys plus a small state file
//! recording which key the next run should start from. The index
//! advances once per acquisition, before any request is made, so a run
//! that crashes mid-batch still hands the following run a fresh key.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::GeminiError;

/// Environment variable holding the comma-separated API keys.
pub const KEYS_ENV_VAR: &str = "GEMINI_API_KEYS";

/// Rotating set of API keys with a persisted starting position.
#[derive(Debug, Clone)]
pub struct KeyRing {
    keys: Vec<String>,
    state_path: PathBuf,
}

impl KeyRing {
    /// Builds a ring from an explicit key list.
    ///
    /// # Errors
    ///
    /// Returns [`GeminiError::Config`] when `keys` is empty.
    pub fn new(keys: Vec<String>, state_path: impl Into<PathBuf>) -> Result<Self, GeminiError> {
        if keys.is_empty() {
            return Err(GeminiError::Config("no API keys configured".into()));
        }
        Ok(Self { keys, state_path: state_path.into() })
    }

    /// Builds a ring from the `GEMINI_API_KEYS` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`GeminiError::Config`] when the variable is unset or
    /// holds no non-empty entries.
    pub fn from_env(state_path: impl Into<PathBuf>) -> Result<Self, GeminiError> {
        let raw = std::env::var(KEYS_ENV_VAR)
            .map_err(|_| GeminiError::Config(format!("{KEYS_ENV_VAR} is not set")))?;
        let keys = split_keys(&raw);
        if keys.is_empty() {
            return Err(GeminiError::Config(format!("{KEYS_ENV_VAR} holds no keys")));
        }
        Ok(Self { keys, state_path: state_path.into() })
    }

    /// Number of keys in the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; the constructors reject empty rings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Runs `op` with each key in turn until one succeeds.
    ///
    /// The starting key comes from the state file, and the stored index
    /// advances immediately so concurrent or subsequent runs pick a
    /// different key. Errors where [`GeminiError::rotates_key`] holds
    /// move on to the next key; any other error aborts at once.
    ///
    /// # Errors
    ///
    /// Returns the first non-rotating error, or
    /// [`GeminiError::KeysExhausted`] once every key was rejected.
    pub fn try_each<T>(
        &self,
        mut op: impl FnMut(&str) -> Result<T, GeminiError>,
    ) -> Result<T, GeminiError> {
        let start = self.start_index();
        self.advance((start + 1) % self.keys.len());

        let mut last_err: Option<GeminiError> = None;
        for offset in 0..self.keys.len() {
            let index = (start + offset) % self.keys.len();
            // Only the index is logged; the key itself never is.
            match op(&self.keys[index]) {
                Ok(value) => return Ok(value),
                Err(err) if err.rotates_key() => {
                    warn!(key_index = index, error = %err, "API key rejected, rotating");
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        let last = last_err.map_or_else(|| "ring is empty".to_string(), |e| e.to_string());
        Err(GeminiError::KeysExhausted(last))
    }

    fn start_index(&self) -> usize {
        let stored = fs::read_to_string(&self.state_path)
            .ok()
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(0);
        stored % self.keys.len()
    }

    fn advance(&self, next: usize) {
        if let Err(e) = fs::write(&self.state_path, format!("{next}\n")) {
            warn!(path = %self.state_path.display(), error = %e, "could not persist key index");
        } else {
            debug!(next, "key rotation index advanced");
        }
    }
}

fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|k| !k.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn ring(keys: &[&str], state: &std::path::Path) -> KeyRing {
        KeyRing::new(keys.iter().map(|k| (*k).to_string()).collect(), state).unwrap()
    }

    #[test]
    fn empty_rings_are_rejected() {
        let err = KeyRing::new(Vec::new(), "unused").unwrap_err();
        assert!(matches!(err, GeminiError::Config(_)));
    }

    #[test]
    fn env_splitting_drops_blanks() {
        assert_eq!(split_keys("a, b ,,c,"), vec!["a", "b", "c"]);
        assert!(split_keys(" , ").is_empty());
    }

    #[test]
    fn starting_key_comes_from_the_state_file() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("key_index");
        fs::write(&state, "1\n").unwrap();

        let ring = ring(&["a", "b", "c"], &state);
        let used = ring.try_each(|key| Ok::<_, GeminiError>(key.to_string())).unwrap();
        assert_eq!(used, "b");
        assert_eq!(fs::read_to_string(&state).unwrap().trim(), "2");
    }

    #[test]
    fn missing_or_garbage_state_starts_at_zero() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("key_index");

        let ring = ring(&["a", "b"], &state);
        assert_eq!(ring.try_each(|k| Ok::<_, GeminiError>(k.to_string())).unwrap(), "a");

        fs::write(&state, "not a number").unwrap();
        assert_eq!(ring.try_each(|k| Ok::<_, GeminiError>(k.to_string())).unwrap(), "a");
    }

    #[test]
    fn oversized_stored_index_wraps() {
        let dir = tempdir().unwrap();
        let state = dir.path().join("key_index");
        fs::write(&state, "7").unwrap();

        let ring = ring(&["a", "b", "c"], &state);
        assert_eq!(ring.try_each(|k| Ok::<_, GeminiError>(k.to_string())).unwrap(), "b");
    }

    #[test]
    fn quota_errors_rotate_to_the_next_key() {
        let dir = tempdir().unwrap();
        let ring = ring(&["bad", "good"], &dir.path().join("key_index"));

        let mut tried = Vec::new();
        let used = ring
            .try_each(|key| {
                tried.push(key.to_string());
                if key == "bad" {
                    Err(GeminiError::RateLimit {
                        message: "quota exceeded".into(),
                        retry_after_secs: None,
                    })
                } else {
                    Ok(key.to_string())
                }
            })
            .unwrap();
        assert_eq!(used, "good");
        assert_eq!(tried, vec!["bad", "good"]);
    }

    #[test]
    fn non_quota_errors_abort_immediately() {
        let dir = tempdir().unwrap();
        let ring = ring(&["a", "b"], &dir.path().join("key_index"));

        let mut calls = 0;
        let err = ring
            .try_each(|_: &str| -> Result<(), GeminiError> {
                calls += 1;
                Err(GeminiError::Parse("bad payload".into()))
            })
            .unwrap_err();
        assert!(matches!(err, GeminiError::Parse(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn exhausting_every_key_reports_the_last_error() {
        let dir = tempdir().unwrap();
        let ring = ring(&["a", "b"], &dir.path().join("key_index"));

        let err = ring
            .try_each(|key| -> Result<(), GeminiError> {
                Err(GeminiError::Api { status: 403, message: format!("{key} denied") })
            })
            .unwrap_err();
        let GeminiError::KeysExhausted(last) = err else {
            panic!("expected exhaustion, got {err:?}");
        };
        assert_eq!(last, "b denied");
    }
}
