// src/storage/mod.rs
pub mod cache;
pub mod latch;
pub mod refresh;
