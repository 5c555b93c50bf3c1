// src/lib.rs
pub mod config;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod models;
pub mod rcon;
pub mod storage;
pub mod upstream;
pub mod utils;
