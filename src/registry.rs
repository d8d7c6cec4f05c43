// src/registry.rs
use path_absolutize::Absolutize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RegistryError, ViewLoadError};
use crate::parser::parse_view_module;

/// 登録対象とするページモジュールの拡張子
pub const VIEW_EXTENSIONS: [&str; 4] = ["tsx", "jsx", "ts", "js"];

/// ロード済みのビューモジュール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewModule {
    /// モジュールの所在 (ファイルパスやバンドラのキー)
    pub source: String,
    /// default export の名前 (無名関数なら "default")
    pub default_export: String,
}

/// 引数なしで呼ばれ、default export を持つモジュールを返すローダー
pub trait ViewLoader: Send + Sync {
    fn load(&self) -> Result<ViewModule, ViewLoadError>;
}

impl<F> ViewLoader for F
where
    F: Fn() -> Result<ViewModule, ViewLoadError> + Send + Sync,
{
    fn load(&self) -> Result<ViewModule, ViewLoadError> {
        self()
    }
}

/// ディスク上のページファイルを読み、SWC で default export を確認するローダー
#[derive(Debug, Clone)]
pub struct FileViewLoader {
    path: PathBuf,
}

impl FileViewLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileViewLoader { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ViewLoader for FileViewLoader {
    fn load(&self) -> Result<ViewModule, ViewLoadError> {
        parse_view_module(&self.path)
    }
}

/// 最初に必要になった時点で一度だけロードされるビュー参照
///
/// 同じ識別子に対しては同じ `Arc<LazyView>` が返されるので、
/// 描画層は `Arc::ptr_eq` で参照の同一性を判定できる。
pub struct LazyView {
    key: String,
    loader: Arc<dyn ViewLoader>,
    module: OnceLock<Result<ViewModule, ViewLoadError>>,
}

impl LazyView {
    pub fn new(key: impl Into<String>, loader: Arc<dyn ViewLoader>) -> Self {
        LazyView {
            key: key.into(),
            loader,
            module: OnceLock::new(),
        }
    }

    /// レジストリ上のキー (例: "./pages/user/list.tsx")
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_loaded(&self) -> bool {
        self.module.get().is_some()
    }

    /// 初回のみローダーを呼び、以降は結果 (失敗も含む) を使い回す
    pub fn load(&self) -> Result<&ViewModule, ViewLoadError> {
        self.module
            .get_or_init(|| {
                debug!(key = %self.key, "loading view module");
                self.loader.load()
            })
            .as_ref()
            .map_err(|e| e.clone())
    }
}

impl fmt::Debug for LazyView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyView")
            .field("key", &self.key)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// レジストリの同一性。内容が変わるたびに新しい値になる
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryId(u64);

impl RegistryId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RegistryId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// パス風のキー → ビューローダー の対応表 (バンドラの glob import 結果に相当)
#[derive(Clone)]
pub struct ViewRegistry {
    id: RegistryId,
    entries: BTreeMap<String, Arc<dyn ViewLoader>>,
}

impl Default for ViewRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewRegistry {
    pub fn new() -> Self {
        ViewRegistry {
            id: RegistryId::next(),
            entries: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// ローダーを登録する。内容が変わるのでレジストリの id も更新される
    pub fn insert(&mut self, key: impl Into<String>, loader: Arc<dyn ViewLoader>) {
        self.entries.insert(key.into(), loader);
        self.id = RegistryId::next();
    }

    pub fn with(mut self, key: impl Into<String>, loader: impl ViewLoader + 'static) -> Self {
        self.insert(key, Arc::new(loader));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Arc<dyn ViewLoader>> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `pages_root` 以下のページファイルを再帰的に集めてレジストリを作る
    ///
    /// キーは `key_prefix` + ルートからの相対パス (区切りは常に `/`)。
    /// 例: key_prefix = "./pages/", ファイル = <root>/user/list.tsx → "./pages/user/list.tsx"
    pub fn from_pages_dir(pages_root: &Path, key_prefix: &str) -> Result<Self, RegistryError> {
        // 1) ルートを絶対パス化し、ディレクトリであることを確認
        let root = pages_root.absolutize()?.to_path_buf();
        if !root.is_dir() {
            return Err(RegistryError::NotADirectory(root));
        }

        // 2) WalkDir で全ファイルを探索し、ビュー拡張子のものだけ登録
        let mut registry = ViewRegistry::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_view = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| VIEW_EXTENSIONS.contains(&ext));
            if !is_view {
                continue;
            }
            // declaration ファイル (.d.ts) はビューではない
            if path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".d.ts"))
            {
                continue;
            }

            let Ok(relative) = path.strip_prefix(&root) else {
                continue;
            };
            let relative: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            let key = format!("{}{}", key_prefix, relative.join("/"));
            debug!(%key, path = %path.display(), "registered view");
            registry
                .entries
                .insert(key, Arc::new(FileViewLoader::new(path)));
        }
        Ok(registry)
    }
}

impl fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("id", &self.id)
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn lazy_view_loads_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let loader = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ViewLoadError>(ViewModule {
                source: "mem".into(),
                default_export: "Page".into(),
            })
        };
        let view = LazyView::new("pages/a.tsx", Arc::new(loader));
        assert!(!view.is_loaded());
        assert_eq!(view.load().unwrap().default_export, "Page");
        assert_eq!(view.load().unwrap().default_export, "Page");
        assert!(view.is_loaded());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inserting_changes_identity() {
        let mut registry = ViewRegistry::new();
        let before = registry.id();
        let loader = || {
            Ok::<_, ViewLoadError>(ViewModule {
                source: "a".into(),
                default_export: "A".into(),
            })
        };
        registry.insert("pages/a.tsx", Arc::new(loader));
        assert_ne!(registry.id(), before);
        assert!(registry.contains_key("pages/a.tsx"));
    }

    #[test]
    fn scans_pages_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("user/detail")).unwrap();
        fs::write(root.join("user/list.tsx"), "export default function List() {}").unwrap();
        fs::write(root.join("user/detail/index.tsx"), "export default () => null;").unwrap();
        fs::write(root.join("user/types.d.ts"), "export type A = string;").unwrap();
        fs::write(root.join("README.md"), "# pages").unwrap();

        let registry = ViewRegistry::from_pages_dir(root, "./pages/").unwrap();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(
            keys,
            ["./pages/user/detail/index.tsx", "./pages/user/list.tsx"]
        );
    }

    #[test]
    fn rejects_missing_pages_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(matches!(
            ViewRegistry::from_pages_dir(&missing, "pages/"),
            Err(RegistryError::NotADirectory(_))
        ));
    }
}
