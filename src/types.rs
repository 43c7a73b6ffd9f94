use serde::{Deserialize, Serialize};

/// Index of an item in the model's item list.
pub type ItemId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    /// Whether the rectangle fits an empty square box in either orientation.
    pub fn fits_in_square(&self, side: u32) -> bool {
        self.w.max(self.h) <= side
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// An item positioned inside a box.
///
/// `rect` always holds the item's own (untransposed) dimensions; the
/// footprint is derived through [`Placement::width`] and [`Placement::height`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub item: ItemId,
    pub rect: Rect,
    pub x: u32,
    pub y: u32,
    pub transposed: bool,
}

impl Placement {
    pub fn new(item: ItemId, rect: Rect, x: u32, y: u32, transposed: bool) -> Self {
        Self {
            item,
            rect,
            x,
            y,
            transposed,
        }
    }

    pub fn width(&self) -> u32 {
        if self.transposed { self.rect.h } else { self.rect.w }
    }

    pub fn height(&self) -> u32 {
        if self.transposed { self.rect.w } else { self.rect.h }
    }

    pub fn x_end(&self) -> u32 {
        self.x + self.width()
    }

    pub fn y_end(&self) -> u32 {
        self.y + self.height()
    }

    pub fn area(&self) -> u64 {
        self.rect.area()
    }

    /// The same item at another position, orientation unchanged.
    pub fn moved_to(&self, x: u32, y: u32) -> Self {
        Self { x, y, ..*self }
    }

    /// The same item at the same origin with the orientation flipped.
    pub fn flipped(&self) -> Self {
        Self {
            transposed: !self.transposed,
            ..*self
        }
    }
}

/// One square packing container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    pub placements: Vec<Placement>,
}

impl Bin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }
}
