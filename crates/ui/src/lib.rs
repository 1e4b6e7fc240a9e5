#![deny(unsafe_code)]

/// Application root, shell layout and viewport classification.
pub mod app;
/// Channel list, channel chat pane and the channel store behind them.
pub mod chat;
/// Render fault containment and local data reset.
pub mod error_boundary;
/// Configuration persistence.
pub mod settings;
