//! API key pool
//!
//! Priority-weighted round-robin over validated keys with rate-limit
//! cooldowns. The pool is the only component that mutates key state; it is
//! internally synchronized and shared as a cheap cloneable handle. Keys are
//! in-memory only and surface outside the pool solely as short prefixes.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Default rate-limit cooldown: 60 seconds
pub const DEFAULT_COOLDOWN_MS: i64 = 60_000;

/// Error classification for `mark_error`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyErrorKind {
    /// 401 from the provider: the key is dead, evict it
    InvalidKey,
    /// Anything else: count it, keep the key
    Other,
}

/// Per-key summary with the raw key reduced to a prefix
#[derive(Debug, Clone, Serialize)]
pub struct KeyStats {
    pub key_prefix: String,
    pub priority: u32,
    pub success_count: u64,
    pub error_count: u64,
    pub rate_limited: bool,
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct PoolEntry {
    key: String,
    priority: u32,
    /// Round-robin credits remaining in the current cycle
    credits: u32,
    last_used: Option<DateTime<Utc>>,
    rate_limited_until: Option<DateTime<Utc>>,
    success_count: u64,
    error_count: u64,
}

impl PoolEntry {
    fn new(key: String, priority: u32) -> Self {
        let priority = priority.max(1);
        Self {
            key,
            priority,
            credits: priority,
            last_used: None,
            rate_limited_until: None,
            success_count: 0,
            error_count: 0,
        }
    }

    fn selectable(&self) -> bool {
        self.rate_limited_until.is_none()
    }
}

#[derive(Default)]
struct PoolInner {
    keys: Vec<PoolEntry>,
    cursor: usize,
}

/// Shared key pool handle
#[derive(Clone, Default)]
pub struct KeyPool {
    inner: Arc<Mutex<PoolInner>>,
}

impl KeyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key, or update the priority of one already pooled.
    pub fn add_key(&self, key: impl Into<String>, priority: u32) {
        let key = key.into();
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.keys.iter_mut().find(|e| e.key == key) {
            entry.priority = priority.max(1);
            return;
        }
        tracing::info!(key_prefix = %prefix(&key), priority, "Key added to pool");
        inner.keys.push(PoolEntry::new(key, priority));
    }

    /// Next key by priority-weighted round-robin.
    ///
    /// Expired cooldowns are cleared on each pass. Returns `None` when the
    /// pool is empty or every key is cooling down; the caller falls back to
    /// a client/environment key or fails with `NoAvailableKey`.
    pub fn next(&self) -> Option<String> {
        let mut inner = self.inner.lock();
        let now = Utc::now();

        for entry in &mut inner.keys {
            if entry.rate_limited_until.is_some_and(|until| until <= now) {
                entry.rate_limited_until = None;
            }
        }

        if !inner.keys.iter().any(|e| e.selectable()) {
            return None;
        }

        // At most two passes: one over remaining credits, one after refill.
        for _ in 0..2 {
            let len = inner.keys.len();
            let cursor = inner.cursor;
            for offset in 0..len {
                let idx = (cursor + offset) % len;
                let entry = &mut inner.keys[idx];
                if !entry.selectable() || entry.credits == 0 {
                    continue;
                }
                entry.credits -= 1;
                entry.last_used = Some(now);
                let key = entry.key.clone();
                inner.cursor = (idx + 1) % len;
                return Some(key);
            }
            for entry in &mut inner.keys {
                entry.credits = entry.priority;
            }
        }

        None
    }

    /// Record a successful call.
    pub fn mark_success(&self, key: &str) {
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.keys.iter_mut().find(|e| e.key == key) {
            entry.success_count += 1;
        }
    }

    /// Put a key into cooldown (default 60 s) after a provider 429.
    pub fn mark_rate_limited(&self, key: &str, cooldown: Option<Duration>) {
        let cooldown = cooldown.unwrap_or_else(|| Duration::milliseconds(DEFAULT_COOLDOWN_MS));
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.keys.iter_mut().find(|e| e.key == key) {
            entry.rate_limited_until = Some(Utc::now() + cooldown);
            entry.error_count += 1;
            tracing::warn!(
                key_prefix = %prefix(key),
                cooldown_secs = cooldown.num_seconds(),
                "Key rate limited, entering cooldown"
            );
        }
    }

    /// Record a failed call; `InvalidKey` evicts the key entirely.
    pub fn mark_error(&self, key: &str, kind: KeyErrorKind) {
        let mut inner = self.inner.lock();
        match kind {
            KeyErrorKind::InvalidKey => {
                let before = inner.keys.len();
                inner.keys.retain(|e| e.key != key);
                if inner.keys.len() < before {
                    tracing::warn!(key_prefix = %prefix(key), "Invalid key evicted from pool");
                }
                if inner.cursor >= inner.keys.len() {
                    inner.cursor = 0;
                }
            }
            KeyErrorKind::Other => {
                if let Some(entry) = inner.keys.iter_mut().find(|e| e.key == key) {
                    entry.error_count += 1;
                }
            }
        }
    }

    /// Per-key summaries for the status endpoint; raw keys never leave.
    pub fn stats(&self) -> Vec<KeyStats> {
        let inner = self.inner.lock();
        let now = Utc::now();
        inner
            .keys
            .iter()
            .map(|entry| KeyStats {
                key_prefix: prefix(&entry.key),
                priority: entry.priority,
                success_count: entry.success_count,
                error_count: entry.error_count,
                rate_limited: entry.rate_limited_until.is_some_and(|until| until > now),
                last_used: entry.last_used,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().keys.is_empty()
    }
}

fn prefix(key: &str) -> String {
    let head: String = key.chars().take(12).collect();
    format!("{}...", head)
}
