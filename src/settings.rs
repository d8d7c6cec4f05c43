// src/settings.rs
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StorageError;
use crate::events::{EventBus, LanguageChanged, ThemeChanged};
use crate::storage::{StorageBackend, StorageHub};

/// 右から左に書く言語 (ロケールの先頭一致で判定)
pub const RTL_LOCALES: [&str; 4] = ["ar", "he", "fa", "ur"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeLayout {
    #[default]
    Vertical,
    Horizontal,
    Mini,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeColorPresets {
    #[default]
    Default,
    Cyan,
    Purple,
    Blue,
    Orange,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ltr,
    Rtl,
}

/// ロケールから文字の向きを決める
pub fn direction_for(locale: &str) -> Direction {
    if RTL_LOCALES.iter().any(|rtl| locale.starts_with(rtl)) {
        Direction::Rtl
    } else {
        Direction::Ltr
    }
}

/// 永続化される表示設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme_color_presets: ThemeColorPresets,
    pub theme_mode: ThemeMode,
    pub theme_layout: ThemeLayout,
    pub theme_stretch: bool,
    pub bread_crumb: bool,
    pub multi_tab: bool,
    pub dark_sidebar: bool,
    pub font_family: String,
    pub font_size: u32,
    pub direction: Direction,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            theme_color_presets: ThemeColorPresets::Default,
            theme_mode: ThemeMode::Light,
            theme_layout: ThemeLayout::Vertical,
            theme_stretch: false,
            bread_crumb: true,
            multi_tab: true,
            dark_sidebar: false,
            font_family: "Rubik".to_string(),
            font_size: 14,
            direction: Direction::Ltr,
        }
    }
}

/// 設定の保持と、テーマ・ロケール変更の通知
pub struct SettingsStore<'a, L, S> {
    hub: &'a StorageHub<L, S>,
    bus: &'a EventBus,
    key: String,
    settings: Settings,
    locale: String,
}

impl<'a, L: StorageBackend, S: StorageBackend> SettingsStore<'a, L, S> {
    /// 保存済みの設定を読み込む (無ければ既定値)
    pub fn load(
        hub: &'a StorageHub<L, S>,
        bus: &'a EventBus,
        storage_name: &str,
        default_locale: &str,
    ) -> Self {
        let key = format!("{storage_name}-settings");
        let settings = hub.get_item::<Settings>(&key).unwrap_or_default();
        debug!(%key, mode = settings.theme_mode.as_str(), "loaded settings");
        SettingsStore {
            hub,
            bus,
            key,
            settings,
            locale: default_locale.to_string(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn set_settings(&mut self, settings: Settings) -> Result<(), StorageError> {
        self.settings = settings;
        self.hub.set_item(&self.key, &self.settings, None)
    }

    pub fn set_theme_mode(&mut self, mode: ThemeMode) -> Result<(), StorageError> {
        let changed = self.settings.theme_mode != mode;
        self.set_settings(Settings {
            theme_mode: mode,
            ..self.settings.clone()
        })?;
        if changed {
            self.bus.emit(&ThemeChanged {
                theme: mode.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// ロケールを切り替え、文字の向きを設定に同期する
    pub fn set_locale(&mut self, locale: &str) -> Result<Direction, StorageError> {
        let direction = direction_for(locale);
        if self.settings.direction != direction {
            self.set_settings(Settings {
                direction,
                ..self.settings.clone()
            })?;
        }
        if self.locale != locale {
            self.locale = locale.to_string();
            self.bus.emit(&LanguageChanged {
                locale: self.locale.clone(),
            });
        }
        Ok(direction)
    }

    /// 保存済みの設定を消して既定値に戻す
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.settings = Settings::default();
        self.hub.remove_item(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use std::sync::{Arc, Mutex};

    fn hub() -> StorageHub<MemoryBackend> {
        StorageHub::new(MemoryBackend::new(), MemoryBackend::new(), "admin")
    }

    #[test]
    fn rtl_detection() {
        assert_eq!(direction_for("ar_EG"), Direction::Rtl);
        assert_eq!(direction_for("he"), Direction::Rtl);
        assert_eq!(direction_for("en_US"), Direction::Ltr);
        assert_eq!(direction_for("zh_CN"), Direction::Ltr);
    }

    #[test]
    fn theme_change_is_persisted_and_announced() {
        let hub = hub();
        let bus = EventBus::new();
        let themes = Arc::new(Mutex::new(Vec::new()));
        let sink = themes.clone();
        bus.on::<ThemeChanged>(move |e| sink.lock().unwrap().push(e.theme.clone()));

        let mut store = SettingsStore::load(&hub, &bus, "app", "en_US");
        store.set_theme_mode(ThemeMode::Dark).unwrap();
        store.set_theme_mode(ThemeMode::Dark).unwrap();
        assert_eq!(*themes.lock().unwrap(), ["dark"]);
        assert_eq!(hub.local().keys(), ["admin_app-settings"]);

        let reloaded = SettingsStore::load(&hub, &bus, "app", "en_US");
        assert_eq!(reloaded.settings().theme_mode, ThemeMode::Dark);
    }

    #[test]
    fn locale_switch_syncs_direction() {
        let hub = hub();
        let bus = EventBus::new();
        let locales = Arc::new(Mutex::new(Vec::new()));
        let sink = locales.clone();
        bus.on::<LanguageChanged>(move |e| sink.lock().unwrap().push(e.locale.clone()));

        let mut store = SettingsStore::load(&hub, &bus, "app", "en_US");
        assert_eq!(store.set_locale("ar_SA").unwrap(), Direction::Rtl);
        assert_eq!(store.settings().direction, Direction::Rtl);
        assert_eq!(store.locale(), "ar_SA");
        assert_eq!(store.set_locale("en_US").unwrap(), Direction::Ltr);
        assert_eq!(*locales.lock().unwrap(), ["ar_SA", "en_US"]);
    }

    #[test]
    fn clear_restores_defaults() {
        let hub = hub();
        let bus = EventBus::new();
        let mut store = SettingsStore::load(&hub, &bus, "app", "en_US");
        store.set_theme_mode(ThemeMode::Dark).unwrap();
        store.clear().unwrap();
        assert_eq!(store.settings(), &Settings::default());
        assert!(hub.local().keys().is_empty());
    }
}
