use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use guildmind_common::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreState {
    #[serde(default)]
    chat_channels: Vec<u64>,
    #[serde(default)]
    settings: HashMap<String, String>,
}

/// JSON-file-backed store for activated chat channels and string settings.
///
/// Every mutation rewrites the file. The state lock serializes concurrent
/// turns touching the store from separate tasks.
pub struct DataStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl DataStore {
    /// Open the store, creating the backing file if missing. A corrupt file
    /// is reset to defaults rather than aborting startup.
    pub fn open(path: &Path) -> Result<Self> {
        let state = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!("store file {} is corrupt ({e}); resetting", path.display());
                    StoreState::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("creating store file {}", path.display());
                StoreState::default()
            }
            Err(e) => return Err(Error::Store(format!("cannot read {}: {e}", path.display()))),
        };

        let store = Self {
            path: path.to_path_buf(),
            state: Mutex::new(state),
        };
        store.flush(&store.state.lock().unwrap())?;
        Ok(store)
    }

    fn flush(&self, state: &StoreState) -> Result<()> {
        let raw = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, raw)
            .map_err(|e| Error::Store(format!("cannot write {}: {e}", self.path.display())))
    }

    pub fn chat_channels(&self) -> Vec<u64> {
        self.state.lock().unwrap().chat_channels.clone()
    }

    pub fn is_chat_channel(&self, channel_id: u64) -> bool {
        self.state.lock().unwrap().chat_channels.contains(&channel_id)
    }

    /// Returns `true` if the channel was newly added.
    pub fn add_chat_channel(&self, channel_id: u64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.chat_channels.contains(&channel_id) {
            return Ok(false);
        }
        state.chat_channels.push(channel_id);
        self.flush(&state)?;
        info!("chat channel added: {channel_id}");
        Ok(true)
    }

    /// Returns `true` if the channel was present and removed.
    pub fn remove_chat_channel(&self, channel_id: u64) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.chat_channels.len();
        state.chat_channels.retain(|id| *id != channel_id);
        if state.chat_channels.len() == before {
            return Ok(false);
        }
        self.flush(&state)?;
        info!("chat channel removed: {channel_id}");
        Ok(true)
    }

    pub fn get_setting(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().settings.get(key).cloned()
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.settings.insert(key.to_string(), value.to_string());
        self.flush(&state)?;
        info!("setting saved: {key}={value}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, DataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = DataStore::open(&dir.path().join("data.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn channel_add_remove_round_trip() {
        let (_dir, store) = temp_store();

        assert!(store.add_chat_channel(42).unwrap());
        assert!(!store.add_chat_channel(42).unwrap());
        assert!(store.is_chat_channel(42));

        assert!(store.remove_chat_channel(42).unwrap());
        assert!(!store.remove_chat_channel(42).unwrap());
        assert!(!store.is_chat_channel(42));
    }

    #[test]
    fn settings_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        {
            let store = DataStore::open(&path).unwrap();
            store.set_setting("history_num", "10").unwrap();
            store.add_chat_channel(7).unwrap();
        }

        let store = DataStore::open(&path).unwrap();
        assert_eq!(store.get_setting("history_num").as_deref(), Some("10"));
        assert_eq!(store.chat_channels(), vec![7]);
    }

    #[test]
    fn corrupt_file_resets_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = DataStore::open(&path).unwrap();
        assert!(store.chat_channels().is_empty());
        assert!(store.get_setting("history_num").is_none());
    }
}
