use super::KvStore;
use crate::error::AppError;
use std::collections::BTreeMap;
use std::sync::Mutex;

type Users = BTreeMap<String, BTreeMap<String, String>>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<Users>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_users<T>(&self, f: impl FnOnce(&mut Users) -> T) -> Result<T, AppError> {
        let mut guard = self
            .users
            .lock()
            .map_err(|_| AppError::io("memory store lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

impl KvStore for MemoryStore {
    fn get(&self, user_id: &str, key: &str) -> Result<Option<String>, AppError> {
        self.with_users(|users| users.get(user_id).and_then(|keys| keys.get(key)).cloned())
    }

    fn set(&self, user_id: &str, key: &str, value: &str) -> Result<(), AppError> {
        self.with_users(|users| {
            users
                .entry(user_id.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        })
    }

    fn set_many(&self, user_id: &str, entries: &[(&str, String)]) -> Result<(), AppError> {
        self.with_users(|users| {
            let keys = users.entry(user_id.to_string()).or_default();
            for (key, value) in entries {
                keys.insert((*key).to_string(), value.clone());
            }
        })
    }

    fn remove(&self, user_id: &str, key: &str) -> Result<(), AppError> {
        self.with_users(|users| {
            if let Some(keys) = users.get_mut(user_id) {
                keys.remove(key);
            }
        })
    }

    fn users(&self) -> Result<Vec<String>, AppError> {
        self.with_users(|users| {
            users
                .iter()
                .filter(|(_, keys)| !keys.is_empty())
                .map(|(user, _)| user.clone())
                .collect()
        })
    }
}
