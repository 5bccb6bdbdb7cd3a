// src/handlers/mod.rs

pub mod auth;
pub mod feedback;
pub mod quiz;
pub mod reports;
