#[macro_use] extern crate log;
extern crate env_logger;

use std::sync::Arc;

use laptrace::app::AppState;
use laptrace::config::Config;
use laptrace::overlay::Viewer;
use laptrace::session::provider::ArchiveProvider;

fn main() {
    let config = Config::load_default();
    let level = config.as_ref().map(|c| c.log_level).unwrap_or(log::LevelFilter::Info);
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let config = config.unwrap_or_else(|err| {
        warn!["Ignoring configuration: {}", err];
        Config::default()
    });
    info!["Reading sessions from {}", config.data_dir.display()];

    let provider = Arc::new(ArchiveProvider::new(config.data_dir.clone()));
    let window = config.window.clone();
    let mut app = AppState::new(config, provider);
    app.select_year(app.year);

    match Viewer::new(app, &window) {
        Ok(viewer) => viewer.start_event_loop(),
        Err(err) => {
            error!["{}", err];
            std::process::exit(1);
        }
    }
}
