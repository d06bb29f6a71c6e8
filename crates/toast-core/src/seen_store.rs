//! Bounded set of notification identities already relayed by this process.

use std::collections::{HashSet, VecDeque};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

const SEEN_STATE_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_SEEN_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeenState {
    schema_version: u32,
    #[serde(default)]
    identities: Vec<String>,
}

/// Remembers emitted identities in insertion order, evicting the oldest past `capacity`.
///
/// Without a state path the store lives only in memory. With one, `save` writes the
/// current window atomically so a restart keeps deduplicating.
#[derive(Debug)]
pub struct SeenIdStore {
    path: Option<PathBuf>,
    capacity: usize,
    order: VecDeque<String>,
    index: HashSet<String>,
    dirty: bool,
}

impl SeenIdStore {
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            path: None,
            capacity: capacity.max(1),
            order: VecDeque::new(),
            index: HashSet::new(),
            dirty: false,
        }
    }

    /// Opens a persisted store, starting empty when the file does not exist yet.
    pub fn load(path: PathBuf, capacity: usize) -> Result<Self> {
        let mut store = Self::in_memory(capacity);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read seen state {}", path.display()))?;
            let state = serde_json::from_str::<SeenState>(&raw)
                .with_context(|| format!("failed to parse seen state {}", path.display()))?;
            if state.schema_version != SEEN_STATE_SCHEMA_VERSION {
                bail!(
                    "unsupported seen state schema: expected {}, found {}",
                    SEEN_STATE_SCHEMA_VERSION,
                    state.schema_version
                );
            }
            for identity in state.identities {
                store.insert_evicting(identity);
            }
        }
        store.path = Some(path);
        store.dirty = false;
        Ok(store)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index.contains(identity)
    }

    /// Records `identity`, returning `false` when it was already present.
    pub fn mark_seen(&mut self, identity: &str) -> bool {
        if self.index.contains(identity) {
            return false;
        }
        self.insert_evicting(identity.to_string());
        self.dirty = true;
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the store when it is persisted and changed since the last save.
    ///
    /// Returns whether a write happened.
    pub fn save_if_dirty(&mut self) -> Result<bool> {
        let Some(path) = self.path.as_deref() else {
            return Ok(false);
        };
        if !self.dirty {
            return Ok(false);
        }
        let state = SeenState {
            schema_version: SEEN_STATE_SCHEMA_VERSION,
            identities: self.order.iter().cloned().collect(),
        };
        let mut payload =
            serde_json::to_string_pretty(&state).context("failed to serialize seen state")?;
        payload.push('\n');
        replace_state_file(path, &payload)
            .with_context(|| format!("failed to write seen state {}", path.display()))?;
        self.dirty = false;
        Ok(true)
    }

    fn insert_evicting(&mut self, identity: String) {
        if !self.index.insert(identity.clone()) {
            return;
        }
        self.order.push_back(identity);
        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.index.remove(&evicted);
            }
        }
    }
}

/// Stages `payload` next to `path` and renames it over the live file, so readers only ever
/// see a complete state document.
fn replace_state_file(path: &Path, payload: &str) -> Result<()> {
    if path.is_dir() {
        bail!("seen state path {} is a directory", path.display());
    }
    let Some(file_name) = path.file_name() else {
        bail!("seen state path {} has no file name", path.display());
    };
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let mut staged_name = file_name.to_os_string();
    staged_name.push(".partial");
    let staged = dir.join(staged_name);
    let mut file = std::fs::File::create(&staged)
        .with_context(|| format!("failed to create {}", staged.display()))?;
    file.write_all(payload.as_bytes())
        .and_then(|()| file.sync_all())
        .with_context(|| format!("failed to write {}", staged.display()))?;
    drop(file);
    std::fs::rename(&staged, path)
        .with_context(|| format!("failed to move {} into place", staged.display()))
}
