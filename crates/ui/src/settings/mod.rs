pub mod state;

pub use state::{
    AppConfig, ConfigActions, ConfigStore, SettingsChanged, SettingsError, SettingsState,
};
