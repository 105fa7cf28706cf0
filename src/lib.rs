//! Attention Engine Service Library

pub mod config;
pub mod engine;
pub mod service;
pub mod api;

pub use config::Config;
