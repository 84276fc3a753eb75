#[macro_use] extern crate log;

pub mod app;
pub mod config;
pub mod cursor;
pub mod error;
pub mod figure;
pub mod plot;
pub mod session;
pub mod telemetry;

#[cfg(feature = "gui")]
pub mod canvas;
#[cfg(feature = "gui")]
pub mod overlay;
