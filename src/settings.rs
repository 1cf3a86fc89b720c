use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::frames::{Setting, SettingId};

/// Identity of a server endpoint, the key under which its persisted
/// settings live.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Origin {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Origin {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// Process-wide store of settings a peer asked us to persist, keyed by
/// origin. Lives for the process; sessions hold an injected `Arc` handle.
/// The lock is held only across a single insert/update/remove; reads copy.
#[derive(Default)]
pub struct SettingsStore {
    inner: Mutex<HashMap<Origin, HashMap<SettingId, u32>>>,
}

impl SettingsStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Stores one persist-value entry for `origin`.
    pub fn persist(&self, origin: &Origin, setting: &Setting) {
        let mut inner = self.inner.lock();
        inner
            .entry(origin.clone())
            .or_default()
            .insert(setting.id, setting.value);
    }

    /// Drops everything persisted for `origin` (CLEAR_SETTINGS).
    pub fn clear(&self, origin: &Origin) {
        self.inner.lock().remove(origin);
    }

    /// Copy of the settings persisted for `origin`, if any.
    pub fn get(&self, origin: &Origin) -> Option<HashMap<SettingId, u32>> {
        self.inner.lock().get(origin).cloned()
    }
}
