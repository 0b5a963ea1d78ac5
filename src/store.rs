// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Biblio Contributors

//! Two-tier persistence for the bearer credential.
//!
//! The browser exposes two process-wide storage tiers: an ephemeral one
//! (cleared when the browsing context ends) and a persistent one (survives
//! restarts). Both are unsynchronized last-writer-wins state that another
//! browsing context may mutate, so callers must treat every [`TokenStore::read`]
//! as possibly reflecting an external change and never cache the result
//! beyond the current decision.
//!
//! The tiers are abstracted behind [`StorageBackend`] so the store can run
//! against the real browser storage in a WASM host and against
//! [`MemoryBackend`] in tests.
//!
//! ## Key layout
//!
//! Earlier releases stored the credential under `access_token`; the current
//! one uses `token`. The store treats a value under either name as the same
//! logical credential and writes both, so readers pinned to either name
//! observe updates. A `remember` marker (`"1"`) sits next to the credential
//! in the persistent tier only.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::warn;

/// Primary storage key for the credential.
pub const TOKEN_KEY: &str = "token";
/// Legacy storage key still read and written for backward compatibility.
pub const LEGACY_TOKEN_KEY: &str = "access_token";
/// Persistent-tier marker set when the user asked to be remembered.
pub const REMEMBER_KEY: &str = "remember";

const REMEMBER_VALUE: &str = "1";

/// Failure inside a storage tier (quota exceeded, privacy-mode restrictions).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage quota exceeded")]
    QuotaExceeded,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// One browser storage tier.
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: StorageBackend + ?Sized> StorageBackend for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

/// In-memory tier, used in tests and non-browser hosts.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// Persists and retrieves the raw credential across the two tiers.
///
/// At most one logical credential is active at a time: [`TokenStore::write`]
/// clears both tiers before writing to exactly one. Expiry is never stored
/// next to the credential; it is always recomputed from the token itself.
pub struct TokenStore {
    ephemeral: Box<dyn StorageBackend>,
    persistent: Box<dyn StorageBackend>,
    /// Holds the credential for the rest of the tab's life when a tier
    /// rejects the write (quota, privacy mode). Cleared with everything else.
    fallback: Mutex<Option<String>>,
}

impl TokenStore {
    pub fn new(ephemeral: Box<dyn StorageBackend>, persistent: Box<dyn StorageBackend>) -> Self {
        Self {
            ephemeral,
            persistent,
            fallback: Mutex::new(None),
        }
    }

    /// Store with both tiers in memory.
    pub fn in_memory() -> Self {
        Self::new(
            Box::new(MemoryBackend::new()),
            Box::new(MemoryBackend::new()),
        )
    }

    /// Clear both tiers, then write the credential to the selected one.
    ///
    /// Never fails: a tier that rejects the write degrades to an in-memory
    /// credential for the remaining life of the tab.
    pub fn write(&self, token: &str, persistent: bool) {
        self.clear();

        let tier: &dyn StorageBackend = if persistent {
            &*self.persistent
        } else {
            &*self.ephemeral
        };

        let mut degraded = false;
        for key in [TOKEN_KEY, LEGACY_TOKEN_KEY] {
            if let Err(e) = tier.set(key, token) {
                warn!(key, error = %e, "credential write failed, keeping in-memory copy");
                degraded = true;
            }
        }

        if persistent {
            if let Err(e) = self.persistent.set(REMEMBER_KEY, REMEMBER_VALUE) {
                warn!(error = %e, "remember marker write failed");
            }
        }

        if degraded {
            *self.fallback.lock().unwrap() = Some(token.to_string());
        }
    }

    /// Current credential, ephemeral tier first.
    ///
    /// Ephemeral precedence supports a session-only override even when a
    /// persistent "remember" credential exists from a prior visit.
    pub fn read(&self) -> Option<String> {
        for tier in [&self.ephemeral, &self.persistent] {
            for key in [TOKEN_KEY, LEGACY_TOKEN_KEY] {
                match tier.get(key) {
                    Ok(Some(token)) => return Some(token),
                    Ok(None) => {}
                    Err(e) => warn!(key, error = %e, "credential read failed"),
                }
            }
        }
        self.fallback.lock().unwrap().clone()
    }

    /// Remove the credential from both tiers and drop the remember marker.
    pub fn clear(&self) {
        for tier in [&self.ephemeral, &self.persistent] {
            for key in [TOKEN_KEY, LEGACY_TOKEN_KEY] {
                if let Err(e) = tier.remove(key) {
                    warn!(key, error = %e, "credential removal failed");
                }
            }
        }
        if let Err(e) = self.persistent.remove(REMEMBER_KEY) {
            warn!(error = %e, "remember marker removal failed");
        }
        *self.fallback.lock().unwrap() = None;
    }

    /// Whether the user asked to be remembered on the last login.
    pub fn remembered(&self) -> bool {
        matches!(self.persistent.get(REMEMBER_KEY), Ok(Some(v)) if v == REMEMBER_VALUE)
    }
}
