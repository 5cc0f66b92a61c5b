pub mod app;
pub mod codes;
pub mod config;
pub mod detox;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod extract;
pub mod format;
pub mod link;
pub mod output;
pub mod rows;
pub mod store;
pub mod units;
