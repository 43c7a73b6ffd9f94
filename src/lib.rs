pub mod config;
pub mod error;
pub mod greedy;
pub mod model;
pub mod neighborhood;
pub mod render;
pub mod search;
pub mod types;

pub use error::{BoxingError, Result};
