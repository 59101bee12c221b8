pub mod auth;
pub mod browser;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod identity;
pub mod session;
pub mod storage;
pub mod utils;
