//! Per-number cancellation of sibling stage-2 work.
//!
//! All shards of one input number share a single token. Once any shard
//! proves the cofactor is a probable prime the token is cancelled, and it
//! stays cancelled for the rest of the run.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The token for `identifier`, created on first use.
    pub fn token_for(&self, identifier: &str) -> CancellationToken {
        let mut tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
        tokens
            .entry(identifier.to_string())
            .or_insert_with(|| {
                debug!(id = identifier, "creating cancellation token");
                CancellationToken::new()
            })
            .clone()
    }

    /// Cancel every stage-2 worker for `identifier`.
    pub fn cancel(&self, identifier: &str) {
        debug!(id = identifier, "cancelling sibling stage-2 work");
        self.token_for(identifier).cancel();
    }

    pub fn is_cancelled(&self, identifier: &str) -> bool {
        let tokens = self.tokens.lock().unwrap_or_else(|p| p.into_inner());
        tokens
            .get(identifier)
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    /// Number of identifiers that have a token.
    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
