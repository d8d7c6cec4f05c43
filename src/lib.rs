// src/lib.rs

//! 権限ツリーからルートツリーを組み立てるアプリケーションシェルのコア
//!
//! - `compiler`: パーミッションの森 → ルーティング可能なノードの森
//! - `storage` / `events` / `settings`: テナント別ストレージ、型付きイベントバス、テーマとロケールの同期

pub mod compiler;
pub mod config;
pub mod error;
pub mod events;
pub mod menu;
pub mod model;
pub mod parser;
pub mod path;
pub mod permission;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod shell;
pub mod storage;
pub mod tree;

pub use compiler::{Compilation, Diagnostic, RouteCompiler, UiAffordances};
pub use error::{CompileError, StructuralAnomaly};
pub use model::{MenuMeta, PermissionKind, PermissionNode, RoutableNode, RouteElement};
pub use registry::{LazyView, ViewLoader, ViewModule, ViewRegistry};
