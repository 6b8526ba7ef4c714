//! Terminal application that counts how many seconds each focused application is used, keeps
//! daily and all-time statistics in json files, and writes reports that can be uploaded to a
//! Telegram chat.
//!

pub mod cli;
pub mod config;
pub mod error;
pub mod fs;
pub mod report;
pub mod session;
pub mod storage;
pub mod usage;
pub mod utils;
pub mod window_api;
