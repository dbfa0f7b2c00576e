//! Envmap Viewer
//!
//! A pig model lit by one of four switchable environments:
//! - two ground-projected HDR skyboxes
//! - a real-time cube capture of an orbiting ring
//! - a blurred light-studio backdrop
//!
//! Usage: `envmap-viewer [config.json]`

mod app;
mod assets;
mod config;
mod environment;
mod render;
mod scene;
mod ui;

use std::path::PathBuf;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let explicit = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match config::load_config(explicit.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            log::error!("{err}; falling back to defaults");
            config::ViewerConfig::default()
        }
    };

    if let Err(err) = app::run(config) {
        log::error!("{err}");
        std::process::exit(1);
    }
}
