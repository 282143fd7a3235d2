// Main library entry point for Callweave.

pub mod api;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod ports;

pub use error::{CallweaveError, Result};
