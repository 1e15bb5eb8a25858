#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod auth;
pub mod catalogue;
pub mod config;
pub mod data;
pub mod detail;
pub mod logging;
pub mod query;
pub mod session;
pub mod storage;
pub mod ui;

#[cfg(test)]
mod test_server;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
