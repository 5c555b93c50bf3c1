// src/handlers/mod.rs
pub mod api;
pub mod health;
pub mod index;
pub mod servers;
