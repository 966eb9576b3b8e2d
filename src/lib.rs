pub mod cli;
pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod exit;
pub mod logs;
pub mod parser;
pub mod session;
pub mod toggle;
pub mod ui;
pub mod vacuum;
