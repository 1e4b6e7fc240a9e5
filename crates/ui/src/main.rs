use std::path::PathBuf;
use std::sync::Arc;

use chatoor::app::{AppRoot, NewChannel, Quit, ToggleSidebar, default_themes_path};
use chatoor::settings::ConfigStore;
use chatoor_storage::{LocalStateStore, MemoryLocalState, SqliteLocalState};
use gpui::*;
use gpui_component::{Root, ThemeRegistry};

fn state_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("chatoor").join("state.db"))
        .unwrap_or_else(|| PathBuf::from(chatoor_storage::sqlite::DEFAULT_STATE_DB_RELATIVE_PATH))
}

/// Opens the on-disk state, falling back to process memory when it is unavailable.
fn open_local_state() -> Arc<dyn LocalStateStore> {
    let path = state_database_path();
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::warn!("failed to start storage runtime: {error}. state will not persist");
            return Arc::new(MemoryLocalState::new());
        }
    };

    match runtime.block_on(SqliteLocalState::open(&path.to_string_lossy())) {
        Ok(state) => Arc::new(state),
        Err(error) => {
            tracing::warn!("failed to open local state at {path:?}: {error}. state will not persist");
            Arc::new(MemoryLocalState::new())
        }
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let local_state = open_local_state();
    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(move |cx| {
        gpui_component::init(cx);

        // A missing themes directory is not fatal; built-in themes remain available.
        let theme_state = local_state.clone();
        if let Err(err) = ThemeRegistry::watch_dir(default_themes_path(), cx, move |cx| {
            ConfigStore::new(theme_state.clone())
                .config()
                .apply_theme(None, cx);
            tracing::info!("theme directory watch initialized");
        }) {
            tracing::warn!("failed to watch themes directory: {err}. using default themes");
            ConfigStore::new(local_state.clone())
                .config()
                .apply_theme(None, cx);
        }

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });

        cx.bind_keys([
            KeyBinding::new("cmd-q", Quit, None),
            KeyBinding::new("cmd-n", NewChannel, None),
            KeyBinding::new("cmd-b", ToggleSidebar, None),
        ]);

        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(1200.), px(800.)),
                        cx,
                    ))),
                    titlebar: Some(TitlebarOptions {
                        appears_transparent: true,
                        traffic_light_position: Some(point(px(9.), px(9.))),
                        ..Default::default()
                    }),
                    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
                    window_decorations: Some(WindowDecorations::Client),
                    #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
                    window_decorations: None,
                    ..Default::default()
                };

                let opened = cx.open_window(options, |window, cx| {
                    let root = cx.new(|cx| AppRoot::new(local_state, window, cx));
                    cx.new(|cx| Root::new(root, window, cx))
                });
                if let Err(error) = opened {
                    tracing::error!("failed to open main window: {error}");
                    cx.quit();
                    return;
                }

                cx.activate(true);
            })
        })
        .detach();
    });
}
