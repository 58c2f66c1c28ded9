use super::KvStore;
use crate::error::AppError;
use crate::paths::app_file;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

pub const SCHEMA_VERSION: u32 = 1;
const STORE_FILE_NAME: &str = "store.json";
const STORE_ENV_VAR: &str = "STRONGTHREAD_STORE_PATH";

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredUsers {
    schema_version: u32,
    #[serde(default)]
    users: BTreeMap<String, BTreeMap<String, String>>,
}

/// File-backed store: one JSON document holding every user's keys.
///
/// Each call re-reads the file so that a CLI invocation and a running poller
/// see each other's writes; the last writer wins.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self::new(store_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, BTreeMap<String, String>>),
    ) -> Result<(), AppError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AppError::io("store lock poisoned"))?;
        let mut stored = load_document(&self.path)?;
        f(&mut stored.users);
        save_document(&self.path, &stored)
    }
}

impl KvStore for JsonFileStore {
    fn get(&self, user_id: &str, key: &str) -> Result<Option<String>, AppError> {
        let stored = load_document(&self.path)?;
        Ok(stored
            .users
            .get(user_id)
            .and_then(|keys| keys.get(key))
            .cloned())
    }

    fn set(&self, user_id: &str, key: &str, value: &str) -> Result<(), AppError> {
        self.update(|users| {
            users
                .entry(user_id.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        })
    }

    fn set_many(&self, user_id: &str, entries: &[(&str, String)]) -> Result<(), AppError> {
        self.update(|users| {
            let keys = users.entry(user_id.to_string()).or_default();
            for (key, value) in entries {
                keys.insert((*key).to_string(), value.clone());
            }
        })
    }

    fn remove(&self, user_id: &str, key: &str) -> Result<(), AppError> {
        self.update(|users| {
            if let Some(keys) = users.get_mut(user_id) {
                keys.remove(key);
                if keys.is_empty() {
                    users.remove(user_id);
                }
            }
        })
    }

    fn users(&self) -> Result<Vec<String>, AppError> {
        let stored = load_document(&self.path)?;
        Ok(stored
            .users
            .into_iter()
            .filter(|(_, keys)| !keys.is_empty())
            .map(|(user, _)| user)
            .collect())
    }
}

pub fn store_path() -> Result<PathBuf, AppError> {
    app_file(STORE_ENV_VAR, STORE_FILE_NAME)
}

fn load_document(path: &Path) -> Result<StoredUsers, AppError> {
    if !path.exists() {
        return Ok(StoredUsers {
            schema_version: SCHEMA_VERSION,
            users: BTreeMap::new(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let stored: StoredUsers = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;

    if !(1..=SCHEMA_VERSION).contains(&stored.schema_version) {
        return Err(AppError::invalid_data("schema_version mismatch"));
    }

    Ok(stored)
}

fn save_document(path: &Path, stored: &StoredUsers) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| AppError::io(err.to_string()))?;
    }

    let document = StoredUsers {
        schema_version: SCHEMA_VERSION,
        users: stored.users.clone(),
    };
    let content = serde_json::to_string_pretty(&document)?;
    std::fs::write(path, content).map_err(|err| AppError::io(err.to_string()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, permissions).map_err(|err| AppError::io(err.to_string()))?;
    }

    debug!(path = %path.display(), users = document.users.len(), "store saved");
    Ok(())
}
