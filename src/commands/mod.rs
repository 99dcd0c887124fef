//! Application command handlers for specline.
//!
//! # Commands
//! - `run`: Live spectrum view (default)
//! - `list_devices`: List available audio input devices
//! - `config`: Open configuration file in user's preferred editor
//! - `logs`: Display recent log entries

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod run;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use run::{handle_run, RunOptions};
