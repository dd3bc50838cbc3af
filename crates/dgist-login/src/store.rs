//! Persisted key/value state shared with the settings surface.
//!
//! Values are plain JSON, there are no transactions and the last writer wins.

use crate::token::AccessToken;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const KEY_USERNAME: &str = "storedUsername";
pub const KEY_PASSWORD: &str = "storedPassword";
pub const KEY_ACCESS_TOKEN: &str = "mailboxAccessToken";
pub const KEY_LAST_CODE: &str = "lastKnownCode";

pub trait Store: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> anyhow::Result<()>;
    fn remove(&self, keys: &[&str]) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Typed accessors over the raw keys.
pub trait StoreExt: Store {
    fn get_string(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self
            .get(key)?
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .filter(|s| !s.is_empty()))
    }

    /// Both halves must be present and non-empty.
    fn credentials(&self) -> anyhow::Result<Option<Credentials>> {
        let username = self.get_string(KEY_USERNAME)?;
        let password = self.get_string(KEY_PASSWORD)?;
        Ok(match (username, password) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            _ => None,
        })
    }

    fn save_credentials(&self, credentials: &Credentials) -> anyhow::Result<()> {
        self.set(KEY_USERNAME, Value::String(credentials.username.clone()))?;
        self.set(KEY_PASSWORD, Value::String(credentials.password.clone()))
    }

    fn clear_credentials(&self) -> anyhow::Result<()> {
        self.remove(&[KEY_USERNAME, KEY_PASSWORD])
    }

    fn access_token(&self) -> anyhow::Result<Option<AccessToken>> {
        match self.get(KEY_ACCESS_TOKEN)? {
            Some(value) => Ok(serde_json::from_value(value).ok()),
            None => Ok(None),
        }
    }

    fn save_access_token(&self, token: &AccessToken) -> anyhow::Result<()> {
        self.set(KEY_ACCESS_TOKEN, serde_json::to_value(token)?)
    }

    fn last_known_code(&self) -> anyhow::Result<Option<String>> {
        self.get_string(KEY_LAST_CODE)
    }

    fn save_last_known_code(&self, code: &str) -> anyhow::Result<()> {
        self.set(KEY_LAST_CODE, Value::String(code.to_string()))
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// All keys in one pretty-printed JSON object on disk.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Opens `state.json` in the application data directory.
    pub fn open_default() -> anyhow::Result<Self> {
        let dir = crate::utils::get_data_dir().map_err(|e| anyhow::anyhow!("{}", e))?;
        Ok(Self::new(dir.join("state.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> anyhow::Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            _ => Err(anyhow::anyhow!(
                "{} does not contain a JSON object",
                self.path.display()
            )),
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    fn guard(&self) -> anyhow::Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| anyhow::anyhow!("state store lock poisoned"))
    }
}

impl Store for JsonFileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let _guard = self.guard()?;
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let _guard = self.guard()?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }

    fn remove(&self, keys: &[&str]) -> anyhow::Result<()> {
        let _guard = self.guard()?;
        let mut map = self.read_map()?;
        for key in keys {
            map.remove(*key);
        }
        self.write_map(&map)
    }
}

#[derive(Default)]
pub struct MemoryStore(Mutex<HashMap<String, Value>>);

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> anyhow::Result<std::sync::MutexGuard<'_, HashMap<String, Value>>> {
        self.0
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        self.map()?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, keys: &[&str]) -> anyhow::Result<()> {
        let mut map = self.map()?;
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_need_both_halves() {
        let store = MemoryStore::new();
        store.set(KEY_USERNAME, Value::from("202311001")).unwrap();
        assert_eq!(store.credentials().unwrap(), None);

        store.set(KEY_PASSWORD, Value::from("")).unwrap();
        assert_eq!(store.credentials().unwrap(), None);

        store.set(KEY_PASSWORD, Value::from("hunter2")).unwrap();
        assert_eq!(
            store.credentials().unwrap(),
            Some(Credentials {
                username: "202311001".into(),
                password: "hunter2".into()
            })
        );

        store.clear_credentials().unwrap();
        assert_eq!(store.credentials().unwrap(), None);
    }

    #[test]
    fn malformed_token_reads_as_absent() {
        let store = MemoryStore::new();
        store.set(KEY_ACCESS_TOKEN, Value::from("not-an-object")).unwrap();
        assert_eq!(store.access_token().unwrap(), None);
    }

    #[test]
    fn json_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = JsonFileStore::new(&path);
        store.save_access_token(&AccessToken::new("abc", 10, 3600)).unwrap();
        store.save_last_known_code("482913").unwrap();
        store
            .save_credentials(&Credentials {
                username: "u".into(),
                password: "p".into(),
            })
            .unwrap();
        store.clear_credentials().unwrap();

        let reopened = JsonFileStore::new(&path);
        assert_eq!(
            reopened.access_token().unwrap(),
            Some(AccessToken::new("abc", 10, 3600))
        );
        assert_eq!(reopened.last_known_code().unwrap().as_deref(), Some("482913"));
        assert_eq!(reopened.credentials().unwrap(), None);
    }

    #[test]
    fn json_file_store_rejects_non_object_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(JsonFileStore::new(&path).get(KEY_USERNAME).is_err());
    }
}
