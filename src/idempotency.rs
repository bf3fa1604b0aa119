//! Idempotency keys attached to every request.
use std::sync::Arc;

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::args::IdempotencyMode;

/// Length of generated keys; 62^24 possible values.
pub const KEY_LEN: usize = 24;

/// Issues idempotency keys for one run. A `per-run` provider generates its key
/// on construction, so every run gets its own key.
#[derive(Debug, Clone)]
pub struct IdempotencyKeyProvider {
    mode: IdempotencyMode,
    run_key: Option<Arc<str>>,
}

impl IdempotencyKeyProvider {
    #[must_use]
    pub fn new(mode: IdempotencyMode) -> Self {
        let run_key = match mode {
            IdempotencyMode::PerRun => Some(generate_key()),
            IdempotencyMode::PerIteration => None,
        };
        Self { mode, run_key }
    }

    #[must_use]
    pub const fn mode(&self) -> IdempotencyMode {
        self.mode
    }

    /// Key for the next iteration.
    #[must_use]
    pub fn next_key(&self) -> Arc<str> {
        match &self.run_key {
            Some(key) => Arc::clone(key),
            None => generate_key(),
        }
    }
}

fn generate_key() -> Arc<str> {
    let key: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(KEY_LEN)
        .map(char::from)
        .collect();
    Arc::from(key)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn per_run_reuses_one_key() -> Result<(), String> {
        let provider = IdempotencyKeyProvider::new(IdempotencyMode::PerRun);
        let first = provider.next_key();
        for _ in 0..1_000 {
            if provider.next_key() != first {
                return Err("per-run key changed".to_owned());
            }
        }
        if first.len() != KEY_LEN || !first.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(format!("Unexpected key format: {}", first));
        }
        Ok(())
    }

    #[test]
    fn per_run_keys_differ_between_runs() -> Result<(), String> {
        let first = IdempotencyKeyProvider::new(IdempotencyMode::PerRun).next_key();
        let second = IdempotencyKeyProvider::new(IdempotencyMode::PerRun).next_key();
        if first == second {
            return Err("Two runs shared a key".to_owned());
        }
        Ok(())
    }

    #[test]
    fn per_iteration_never_repeats() -> Result<(), String> {
        let provider = IdempotencyKeyProvider::new(IdempotencyMode::PerIteration);
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let key = provider.next_key();
            if key.len() != KEY_LEN {
                return Err(format!("Unexpected key length: {}", key.len()));
            }
            if !seen.insert(key) {
                return Err("Duplicate per-iteration key".to_owned());
            }
        }
        Ok(())
    }
}
