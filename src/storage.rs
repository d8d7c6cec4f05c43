// src/storage.rs
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{error, warn};

use crate::config::{AppConfig, AppRegistry};
use crate::error::StorageError;

/// 文字列のキー／値ストア (ブラウザの localStorage / sessionStorage に相当)
pub trait StorageBackend: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// プロセス内メモリに保持するバックエンド
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

/// 1 つの JSON オブジェクトファイルに保存するバックエンド
///
/// 書き込みのたびにファイル全体を書き直す。ファイルがなければ空として扱う。
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileBackend {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(backend_error(&self.path, err)),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&text).map_err(|err| backend_error(&self.path, err))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let text =
            serde_json::to_string_pretty(entries).map_err(|err| backend_error(&self.path, err))?;
        fs::write(&self.path, text).map_err(|err| backend_error(&self.path, err))
    }

    fn update(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.read_all()?;
        f(&mut entries);
        self.write_all(&entries)
    }
}

fn backend_error(path: &Path, err: impl std::fmt::Display) -> StorageError {
    StorageError::Backend(format!("{}: {err}", path.display()))
}

impl StorageBackend for JsonFileBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.update(BTreeMap::clear)
    }
}

/// 保存時の包み。expire は UNIX ミリ秒
#[derive(Serialize, Deserialize)]
struct StorageValue<T> {
    value: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expire: Option<u64>,
}

type Clock = Box<dyn Fn() -> u64 + Send + Sync>;

fn system_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// テナントごとに名前空間を切ったストレージ
///
/// キーは `{app_id}_{key}` の形で保存され、値には任意で TTL を付けられる。
pub struct StorageHub<L, S = MemoryBackend> {
    local: L,
    session: S,
    namespace: String,
    fallback: bool,
    now: Clock,
}

impl<L: StorageBackend, S: StorageBackend> StorageHub<L, S> {
    pub fn new(local: L, session: S, namespace: impl Into<String>) -> Self {
        StorageHub {
            local,
            session,
            namespace: namespace.into(),
            fallback: false,
            now: Box::new(system_millis),
        }
    }

    /// アプリ一覧から現在のテナントを決めて名前空間にする
    pub fn for_app(
        local: L,
        session: S,
        registry: &AppRegistry,
        default_app_id: Option<&str>,
        hostname: &str,
        pathname: &str,
    ) -> Self {
        let app: Option<&AppConfig> = registry.detect(hostname, pathname);
        let mut hub = Self::new(local, session, app.map(|a| a.id.clone()).unwrap_or_default());
        hub.fallback = app.is_some_and(|a| registry.is_fallback(a, default_app_id));
        hub
    }

    /// テスト等で時計を差し替える
    pub fn with_clock(mut self, now: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.now = Box::new(now);
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn local(&self) -> &L {
        &self.local
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    fn namespaced_key(&self, key: &str) -> Result<String, StorageError> {
        if self.namespace.is_empty() {
            error!(key, "app context is missing or has no id");
            return Err(StorageError::MissingNamespace(key.to_string()));
        }
        if self.fallback {
            warn!(
                context_id = %self.namespace,
                key,
                "using default/fallback app context for storage"
            );
        }
        Ok(format!("{}_{}", self.namespace, key))
    }

    /// 値を読み出す。期限切れなら削除して None
    ///
    /// 読み出しや復号に失敗した場合もログを出して None を返す。
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get_item(key) {
            Ok(value) => value,
            Err(err) => {
                error!(key, error = %err, "storage read failed");
                None
            }
        }
    }

    fn try_get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let namespaced = self.namespaced_key(key)?;
        let Some(raw) = self.local.get(&namespaced)? else {
            return Ok(None);
        };
        let stored: StorageValue<T> = serde_json::from_str(&raw)?;

        if stored.expire.is_some_and(|expire| expire < (self.now)()) {
            self.local.remove(&namespaced)?;
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    /// 値を保存する。`ttl_secs` を指定すると、その秒数後に読めなくなる
    ///
    /// 期限が u64 に収まらない場合は u64::MAX (実質無期限) に丸める。
    pub fn set_item<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<u64>,
    ) -> Result<(), StorageError> {
        let namespaced = self.namespaced_key(key)?;
        let stored = StorageValue {
            value,
            expire: ttl_secs
                .filter(|ttl| *ttl > 0)
                .map(|ttl| (self.now)().saturating_add(ttl.saturating_mul(1000))),
        };
        self.local.set(&namespaced, serde_json::to_string(&stored)?)
    }

    /// 包まずに保存された文字列をそのまま読む (状態コンテナの永続化用)
    pub fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.local.get(&self.namespaced_key(key)?)
    }

    pub fn set_string(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.local.set(&self.namespaced_key(key)?, value)
    }

    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.local.remove(&self.namespaced_key(key)?)
    }

    /// ローカル側をすべて消す (他テナントの分も含む)
    pub fn clear_items(&self) -> Result<(), StorageError> {
        self.local.clear()
    }

    pub fn set_session_item<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let namespaced = self.namespaced_key(key)?;
        self.session.set(&namespaced, serde_json::to_string(value)?)
    }

    pub fn get_session_item<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Result<Option<T>, StorageError> {
        let namespaced = self.namespaced_key(key)?;
        match self.session.get(&namespaced)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}
