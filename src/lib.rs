// Library crate exposing modules for the binary and integration tests

pub mod analytics;
pub mod collector;
pub mod config;
pub mod error;
pub mod model;
pub mod repository;
pub mod snapshot;
pub mod util;
