// src/handlers/mod.rs

pub mod exam;
pub mod result;
pub mod session;
