use std::sync::Arc;

use arc_swap::ArcSwap;
use chatoor_storage::{LocalStateStore, StorageError};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use gpui::*;
use gpui_component::{Theme, ThemeMode, ThemeRegistry};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::{ResultExt, Snafu};

/// Local state key holding the persisted configuration.
pub const CONFIG_STATE_KEY: &str = "app-config";
/// Environment variables with this prefix override stored values.
pub const CONFIG_ENV_PREFIX: &str = "CHATOOR_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub tight_border: bool,
    #[serde(
        default = "default_theme_mode",
        serialize_with = "serialize_theme_mode",
        deserialize_with = "deserialize_theme_mode"
    )]
    pub theme_mode: ThemeMode,
    #[serde(default)]
    pub theme_name: String,
    /// Where "Report This Error" points; the button is disabled when unset.
    #[serde(default)]
    pub issue_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tight_border: false,
            theme_mode: default_theme_mode(),
            theme_name: String::new(),
            issue_url: None,
        }
    }
}

impl AppConfig {
    pub fn normalized(mut self) -> Self {
        self.theme_name = self.theme_name.trim().to_string();
        self.issue_url = self
            .issue_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        self
    }

    pub fn apply_theme(&self, window: Option<&mut Window>, cx: &mut App) {
        if let Some(theme_config) = ThemeRegistry::global(cx)
            .themes()
            .get(&SharedString::from(self.theme_name.clone()))
            .cloned()
        {
            let mode = theme_config.mode;
            let theme = Theme::global_mut(cx);
            if mode.is_dark() {
                theme.dark_theme = theme_config;
            } else {
                theme.light_theme = theme_config;
            }
            Theme::change(mode, window, cx);
            return;
        }

        Theme::change(self.theme_mode, window, cx);
    }
}

/// Live configuration backed by local state.
pub struct ConfigStore {
    config: Arc<ArcSwap<AppConfig>>,
    state: Arc<dyn LocalStateStore>,
}

impl ConfigStore {
    pub fn new(state: Arc<dyn LocalStateStore>) -> Self {
        Self::with_env_prefix(state, CONFIG_ENV_PREFIX)
    }

    pub fn with_env_prefix(state: Arc<dyn LocalStateStore>, env_prefix: &'static str) -> Self {
        let config = Self::load_from_state(state.as_ref(), env_prefix);
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            state,
        }
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.config.load_full()
    }

    /// Applies `mutator` to a copy of the current config, persists it, then publishes it.
    pub fn update(
        &self,
        mutator: impl FnOnce(&mut AppConfig),
    ) -> Result<Arc<AppConfig>, SettingsError> {
        let mut next = AppConfig::clone(&self.config.load());
        mutator(&mut next);
        let next = Arc::new(next.normalized());

        self.persist(&next)?;
        self.config.store(next.clone());
        Ok(next)
    }

    fn load_from_state(state: &dyn LocalStateStore, env_prefix: &str) -> AppConfig {
        let stored = match state.get(CONFIG_STATE_KEY) {
            Ok(stored) => stored,
            Err(error) => {
                tracing::warn!("failed to read stored config: {error}. using defaults");
                None
            }
        };

        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        match stored {
            Some(stored) => figment = figment.merge(Json::string(&stored)),
            None => tracing::info!("no stored config found, using defaults"),
        }
        figment = figment.merge(Env::prefixed(env_prefix));

        match figment.extract::<AppConfig>() {
            Ok(config) => config.normalized(),
            Err(error) => {
                tracing::warn!("failed to parse stored config: {error}. using defaults");
                AppConfig::default()
            }
        }
    }

    fn persist(&self, config: &AppConfig) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(config).context(SerializeConfigSnafu {
            stage: "serialize-config-json",
        })?;

        self.state
            .set(CONFIG_STATE_KEY, &content)
            .context(PersistConfigSnafu {
                stage: "persist-config-state",
            })?;

        tracing::info!("saved config to local state");
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to serialize config on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to persist config on `{stage}`: {source}"))]
    PersistConfig {
        stage: &'static str,
        source: StorageError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsChanged {
    pub config: Arc<AppConfig>,
}

/// Config mutations available to views that only hold a config snapshot.
pub trait ConfigActions {
    fn update_config(&self, mutator: &dyn Fn(&mut AppConfig), cx: &mut App);
}

pub struct SettingsState {
    store: ConfigStore,
}

impl EventEmitter<SettingsChanged> for SettingsState {}

impl SettingsState {
    pub fn new(state: Arc<dyn LocalStateStore>) -> Self {
        Self {
            store: ConfigStore::new(state),
        }
    }

    pub fn config(&self) -> Arc<AppConfig> {
        self.store.config()
    }

    pub fn update_config(
        &mut self,
        mutator: impl FnOnce(&mut AppConfig),
        cx: &mut Context<Self>,
    ) -> Result<(), SettingsError> {
        let config = self.store.update(mutator)?;
        cx.emit(SettingsChanged { config });
        cx.notify();
        Ok(())
    }
}

impl ConfigActions for Entity<SettingsState> {
    fn update_config(&self, mutator: &dyn Fn(&mut AppConfig), cx: &mut App) {
        self.update(cx, |settings, cx| {
            if let Err(error) = settings.update_config(|config| mutator(config), cx) {
                tracing::error!("failed to update config: {error}");
            }
        });
    }
}

fn default_theme_mode() -> ThemeMode {
    ThemeMode::Light
}

fn serialize_theme_mode<S>(value: &ThemeMode, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(value.name())
}

fn deserialize_theme_mode<'de, D>(deserializer: D) -> Result<ThemeMode, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_theme_mode(&value))
}

fn parse_theme_mode(value: &str) -> ThemeMode {
    if value.trim().eq_ignore_ascii_case("dark") {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    }
}

#[cfg(test)]
mod tests {
    use chatoor_storage::MemoryLocalState;

    use super::*;

    #[::core::prelude::v1::test]
    fn missing_state_yields_defaults() {
        let store = ConfigStore::new(Arc::new(MemoryLocalState::new()));
        assert_eq!(*store.config(), AppConfig::default());
    }

    #[::core::prelude::v1::test]
    fn update_persists_into_local_state() {
        let state = Arc::new(MemoryLocalState::new());
        let store = ConfigStore::new(state.clone());

        let updated = store
            .update(|config| config.tight_border = !config.tight_border)
            .unwrap();
        assert!(updated.tight_border);

        let reloaded = ConfigStore::new(state.clone());
        assert!(reloaded.config().tight_border);
        assert!(state.get(CONFIG_STATE_KEY).unwrap().is_some());
    }

    #[::core::prelude::v1::test]
    fn stored_values_merge_over_defaults() {
        let state = Arc::new(MemoryLocalState::with_entries([(
            CONFIG_STATE_KEY,
            r#"{"theme_mode":"dark","issue_url":"  "}"#,
        )]));

        let config = ConfigStore::new(state).config();
        assert_eq!(config.theme_mode, ThemeMode::Dark);
        assert!(!config.tight_border);
        assert_eq!(config.issue_url, None);
    }

    #[::core::prelude::v1::test]
    fn unreadable_config_falls_back_to_defaults() {
        let state = Arc::new(MemoryLocalState::with_entries([(CONFIG_STATE_KEY, "{oops")]));
        assert_eq!(*ConfigStore::new(state).config(), AppConfig::default());
    }

    #[::core::prelude::v1::test]
    fn environment_overrides_stored_value() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CHATOOR_JAIL_TIGHT_BORDER", "true");
            let state = Arc::new(MemoryLocalState::with_entries([(
                CONFIG_STATE_KEY,
                r#"{"tight_border":false}"#,
            )]));

            let store = ConfigStore::with_env_prefix(state, "CHATOOR_JAIL_");
            assert!(store.config().tight_border);
            Ok(())
        });
    }
}
