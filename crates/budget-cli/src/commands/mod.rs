//! CLI command modules

pub mod config;
pub mod history;
pub mod recommend;
pub mod summary;
pub mod train;
