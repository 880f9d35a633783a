use crate::{
    inventory::InventoryItem,
    ledger::{
        Currency,
        Ledger,
    },
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
    },
};
use thiserror::Error;

/// Everything that outlives the process: balances, owned items and the
/// counter that keeps item ids unique across restarts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileState {
    #[serde(rename = "balances")]
    pub ledger: Ledger,
    #[serde(default)]
    pub items: Vec<InventoryItem>,
    #[serde(default = "first_item_seq")]
    pub next_item_seq: u64,
}

fn first_item_seq() -> u64 {
    1
}

impl ProfileState {
    pub fn starting(stars: u64, ton: u64) -> Self {
        Self {
            ledger: Ledger::with_balances([(Currency::Stars, stars), (Currency::Ton, ton)]),
            items: Vec::new(),
            next_item_seq: first_item_seq(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to access profile file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("profile file {path} is not valid JSON")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("profile store lock poisoned")]
    Poisoned,
}

pub trait ProfileStore {
    /// `None` when nothing has been saved yet.
    fn load(&self) -> Result<Option<ProfileState>, StoreError>;

    /// Write or overwrite the stored profile.
    fn save(&mut self, state: &ProfileState) -> Result<(), StoreError>;
}

#[derive(Clone, Default)]
pub struct InMemoryProfileStore {
    state: Arc<Mutex<Option<ProfileState>>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_with_state(state: ProfileState) -> Self {
        Self {
            state: Arc::new(Mutex::new(Some(state))),
        }
    }

    pub fn state(&self) -> Arc<Mutex<Option<ProfileState>>> {
        self.state.clone()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn load(&self) -> Result<Option<ProfileState>, StoreError> {
        let guard = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.clone())
    }

    fn save(&mut self, state: &ProfileState) -> Result<(), StoreError> {
        let mut guard = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        *guard = Some(state.clone());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct JsonFileProfileStore {
    path: PathBuf,
}

impl JsonFileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ProfileStore for JsonFileProfileStore {
    fn load(&self) -> Result<Option<ProfileState>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = fs::read(&self.path).map_err(|e| self.io_error(e))?;
        if data.is_empty() {
            return Ok(None);
        }
        let state = serde_json::from_slice(&data).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        Ok(Some(state))
    }

    fn save(&mut self, state: &ProfileState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json =
            serde_json::to_vec_pretty(state).map_err(|source| StoreError::Json {
                path: self.path.clone(),
                source,
            })?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        catalog::default_cases,
        inventory::ItemId,
    };
    use chrono::{
        TimeZone,
        Utc,
    };
    use tempdir::TempDir;

    fn profile_with_item() -> ProfileState {
        let cases = default_cases();
        let gift = &cases[1].gifts[1];
        let obtained_at = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 0).unwrap();
        let mut state = ProfileState::starting(19_200, 12_345);
        state.items.push(InventoryItem::from_gift(
            ItemId::new(&gift.id, 1),
            "memes",
            gift,
            obtained_at,
        ));
        state.next_item_seq = 2;
        state
    }

    #[test]
    fn in_memory__load_before_save_is_empty() {
        let store = InMemoryProfileStore::new();

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn in_memory__clones_share_saved_state() {
        // given
        let mut store = InMemoryProfileStore::new();
        let observer = store.clone();

        // when
        store.save(&profile_with_item()).unwrap();

        // then
        assert_eq!(observer.load().unwrap(), Some(profile_with_item()));
    }

    #[test]
    fn json_file__missing_file_loads_as_none() {
        let dir = TempDir::new("profile_store_missing").unwrap();
        let store = JsonFileProfileStore::new(dir.path().join("profile.json"));

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn json_file__save_then_load_restores_profile() {
        // given
        let dir = TempDir::new("profile_store_roundtrip").unwrap();
        let path = dir.path().join("nested").join("profile.json");
        let mut store = JsonFileProfileStore::new(&path);
        let state = profile_with_item();

        // when
        store.save(&state).unwrap();
        let loaded = JsonFileProfileStore::new(&path).load().unwrap();

        // then
        assert_eq!(loaded, Some(state));
    }

    #[test]
    fn json_file__corrupt_file_reports_json_error() {
        let dir = TempDir::new("profile_store_corrupt").unwrap();
        let path = dir.path().join("profile.json");
        fs::write(&path, b"{ nope").unwrap();

        let err = JsonFileProfileStore::new(&path).load().unwrap_err();

        assert!(matches!(err, StoreError::Json { .. }));
    }

    #[test]
    fn profile_state__missing_seq_defaults_to_first() {
        let json = r#"{ "balances": { "stars": 10 } }"#;

        let state: ProfileState = serde_json::from_str(json).unwrap();

        assert_eq!(state.next_item_seq, 1);
        assert_eq!(state.ledger.balance(Currency::Stars), 10);
        assert!(state.items.is_empty());
    }
}
