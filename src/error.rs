use thiserror::Error;

use crate::types::ItemId;

/// Errors surfaced by the packing engine.
#[derive(Debug, Error)]
pub enum BoxingError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("item {item} ({width}x{height}) does not fit in a {box_size}x{box_size} box")]
    ConstraintViolation {
        item: ItemId,
        width: u32,
        height: u32,
        box_size: u32,
    },

    #[error("invariant broken: {0}")]
    InvariantBroken(String),
}

pub type Result<T> = std::result::Result<T, BoxingError>;
