//! Service layer module

pub mod attention;
pub mod scoring;
pub mod types;

pub use attention::AttentionService;
pub use types::*;
