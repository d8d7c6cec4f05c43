// src/error.rs
use std::path::PathBuf;

use thiserror::Error;

/// コンパイル全体を中断させるエラー (呼び出し元が空シェルにするか中断するかを決める)
#[derive(Debug, Error)]
pub enum CompileError {
    /// 同じ id を持つパーミッションが 2 つ以上ある
    #[error("configuration error: duplicate permission id `{0}`")]
    DuplicateId(String),

    /// route が空のパーミッション
    #[error("configuration error: permission `{0}` has an empty route segment")]
    EmptyRoute(String),

    /// component を指定するノードがあるのにビューレジストリが空
    #[error("configuration error: view registry is empty but permission `{0}` references a component")]
    EmptyRegistry(String),
}

/// 親チェーンの構造的な異常。コンパイラ内部で回復される
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralAnomaly {
    #[error("parent permission `{parent_id}` not found for `{id}`")]
    ParentNotFound { id: String, parent_id: String },

    #[error("parent chain of `{id}` exceeds {max_depth} levels (cycle?)")]
    DepthExceeded { id: String, max_depth: usize },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("pages root {0:?} is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to scan pages root: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// 遅延ロード時のエラー
#[derive(Debug, Clone, Error)]
pub enum ViewLoadError {
    #[error("failed to read view module {path:?}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse view module {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("view module {0:?} has no default export")]
    NoDefaultExport(PathBuf),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("app context is missing or has no id; refusing to write `{0}` without a namespace")]
    MissingNamespace(String),

    #[error("failed to encode storage value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("storage backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// 設定値の検証エラー (複数をまとめて返す)
    #[error("{}", .0.join("\n"))]
    Invalid(Vec<String>),
}
