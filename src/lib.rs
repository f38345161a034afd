pub mod common;
pub mod config;
pub mod error;
pub mod history;
pub mod network;
pub mod sync;
pub mod ui;
