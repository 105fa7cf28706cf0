//! API module - REST handlers and response types

pub mod rest;
pub mod dto;

pub use rest::create_rest_router;
