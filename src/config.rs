// src/config.rs
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::compiler::UiAffordances;
use crate::error::ConfigError;
use crate::model::PermissionNode;
use crate::shell::AuthPages;

/// アプリ (テナント) 判定で最後に頼るデフォルト id
pub const FALLBACK_APP_ID: &str = "student";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontFamily {
    #[serde(default)]
    pub primary: Option<String>,
    #[serde(default)]
    pub secondary: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppThemeConfig {
    #[serde(default)]
    pub font_family: Option<FontFamily>,
    #[serde(default)]
    pub font_size: Option<u32>,
}

/// 1 つのテナントアプリ
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// ホスト名がこれで始まればこのアプリ
    #[serde(default)]
    pub host_prefix: Option<String>,
    /// パスがこれで始まればこのアプリ ("/" は判定に使わない)
    #[serde(default)]
    pub path_prefix: Option<String>,
    #[serde(default)]
    pub theme: Option<AppThemeConfig>,
}

impl AppConfig {
    pub fn base_path(&self) -> &str {
        self.path_prefix.as_deref().unwrap_or("/")
    }
}

/// 登録済みアプリの一覧。判定は先頭から順に行う
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppRegistry(pub Vec<AppConfig>);

impl AppRegistry {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 現在のホスト名とパスからアプリを決める
    ///
    /// 1) host_prefix / path_prefix に一致する最初のアプリ
    /// 2) id が FALLBACK_APP_ID のアプリ
    /// 3) 最後に登録されたアプリ
    pub fn detect(&self, hostname: &str, pathname: &str) -> Option<&AppConfig> {
        self.0
            .iter()
            .find(|app| {
                let host_match = app
                    .host_prefix
                    .as_deref()
                    .is_some_and(|prefix| !prefix.is_empty() && hostname.starts_with(prefix));
                let path_match = app
                    .path_prefix
                    .as_deref()
                    .is_some_and(|prefix| !prefix.is_empty() && prefix != "/" && pathname.starts_with(prefix));
                host_match || path_match
            })
            .or_else(|| self.0.iter().find(|app| app.id == FALLBACK_APP_ID))
            .or_else(|| self.0.last())
    }

    /// 一致するアプリが無く、既定 / 末尾のアプリに落ちたかどうか
    pub fn is_fallback(&self, app: &AppConfig, default_app_id: Option<&str>) -> bool {
        default_app_id == Some(app.id.as_str()) || self.0.last().is_some_and(|last| last.id == app.id)
    }
}

/// フレームワーク全体の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FrameworkSettings {
    pub storage_name: String,
    pub base_api: String,
    pub homepage: String,
    pub default_locale: String,
    pub app_registry: AppRegistry,
    pub default_app_id: Option<String>,
    pub super_admin_role: Option<String>,
    pub theme: Option<AppThemeConfig>,
}

impl Default for FrameworkSettings {
    fn default() -> Self {
        FrameworkSettings {
            storage_name: "app".to_string(),
            base_api: String::new(),
            homepage: "/".to_string(),
            default_locale: "en_US".to_string(),
            app_registry: AppRegistry::default(),
            default_app_id: None,
            super_admin_role: Some("superadmin".to_string()),
            theme: None,
        }
    }
}

impl FrameworkSettings {
    pub fn super_admin_role(&self) -> &str {
        self.super_admin_role.as_deref().unwrap_or("superadmin")
    }

    /// 必須項目をまとめて検証し、問題をすべて列挙して返す
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        if self.app_registry.is_empty() {
            errors.push(
                "Framework configuration error: 'appRegistry' must be a non-empty array."
                    .to_string(),
            );
        }
        if self.base_api.is_empty() {
            errors.push("Framework configuration error: 'baseApi' is required.".to_string());
        }
        if self.default_locale.is_empty() {
            errors.push("Framework configuration error: 'defaultLocale' is required.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

/// シェル全体の設定ファイル (JSON)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellConfig {
    #[serde(default)]
    pub settings: FrameworkSettings,
    #[serde(default)]
    pub auth: AuthPages,
    #[serde(default)]
    pub components: UiAffordances,
    /// ダッシュボードのレイアウト名 (描画側で解釈される)
    #[serde(default = "default_layout")]
    pub dashboard_layout: String,
    /// ログイン前やセッションに権限が無い場合に使う権限ツリー
    #[serde(default)]
    pub default_permissions: Vec<PermissionNode>,
}

fn default_layout() -> String {
    "DashboardLayout".to_string()
}

impl ShellConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded shell config");
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }
}

/// 権限ツリーだけの JSON ファイルを読む
pub fn load_permissions(path: &Path) -> Result<Vec<PermissionNode>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}
