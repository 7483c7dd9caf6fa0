//! Delegation tokens for the command channel.
//!
//! A client principal asks for a token bound to `(client_token, action)`;
//! an agent principal later presents the same triple to confirm the action
//! was delegated. Only the SHA-256 digest of an issued token is retained.

use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Default token lifetime.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Length of an issued token in bytes.
pub const TOKEN_LEN: usize = 256;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TokenKey {
    client_token: Vec<u8>,
    action: String,
}

struct IssuedToken {
    digest: [u8; 32],
    issued_at: Instant,
}

fn digest(token: &[u8]) -> [u8; 32] {
    Sha256::digest(token).into()
}

pub struct TokenManager {
    entries: DashMap<TokenKey, IssuedToken>,
    timeout: Duration,
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TIMEOUT)
    }
}

impl TokenManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn is_expired(&self, issued: &IssuedToken, now: Instant) -> bool {
        now.saturating_duration_since(issued.issued_at) > self.timeout
    }

    /// Issue a fresh token, replacing any earlier token for the same pair.
    ///
    /// Callers check that the requesting principal may delegate `action`.
    pub fn generate(&self, client_token: &[u8], action: &str) -> Vec<u8> {
        let mut token = vec![0u8; TOKEN_LEN];
        rand::thread_rng().fill_bytes(&mut token);

        let key = TokenKey {
            client_token: client_token.to_vec(),
            action: action.to_string(),
        };
        let replaced = self
            .entries
            .insert(
                key,
                IssuedToken {
                    digest: digest(&token),
                    issued_at: Instant::now(),
                },
            )
            .is_some();

        info!(action = %action, replaced, "delegation token issued");
        token
    }

    /// Check a presented token.
    ///
    /// Unknown pairs, wrong tokens and expired tokens all yield `false`.
    /// A matching token is consumed; an expired entry is dropped.
    pub fn verify(&self, client_token: &[u8], action: &str, token: &[u8]) -> bool {
        let key = TokenKey {
            client_token: client_token.to_vec(),
            action: action.to_string(),
        };
        let presented = digest(token);
        let now = Instant::now();

        let mut matched = false;
        let removed = self.entries.remove_if(&key, |_, issued| {
            if self.is_expired(issued, now) {
                return true;
            }
            matched = issued.digest == presented;
            matched
        });

        let verified = removed.is_some() && matched;
        debug!(action = %action, verified, "delegation token verification");
        verified
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, issued| !self.is_expired(issued, now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of outstanding (possibly expired) tokens.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Spawn a task sweeping expired tokens every `interval`.
    ///
    /// The caller keeps the handle; aborting it stops the sweeper.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let swept = self.sweep_expired();
                if swept > 0 {
                    debug!(swept, "expired delegation tokens swept");
                }
            }
        })
    }
}
