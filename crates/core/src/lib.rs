pub mod action;
pub mod cognition;
pub mod config;
pub mod error;
pub mod io;
pub mod memory;
pub mod runtime;
pub mod types;
