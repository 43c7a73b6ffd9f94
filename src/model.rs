//! Packing domain model: items, occupancy bitmaps, fit tests and scoring.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{BoxingError, Result};
use crate::types::{Bin, ItemId, Placement, Rect};

/// Row-major `size × size` grid of occupied cells for one box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyBitmap {
    size: u32,
    cells: Vec<bool>,
}

impl OccupancyBitmap {
    pub fn new(size: u32) -> Self {
        let side = size as usize;
        Self {
            size,
            cells: vec![false; side * side],
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        self.size as usize * y as usize + x as usize
    }

    fn fill(&mut self, placement: &Placement, value: bool) {
        for y in placement.y..placement.y_end() {
            let row = self.index(placement.x, y);
            self.cells[row..row + placement.width() as usize].fill(value);
        }
    }

    /// Marks the placement's footprint as occupied. The placement must lie
    /// inside the box.
    pub fn add(&mut self, placement: &Placement) {
        self.fill(placement, true);
    }

    /// Clears the placement's footprint. The placement must lie inside the box.
    pub fn remove(&mut self, placement: &Placement) {
        self.fill(placement, false);
    }

    pub fn add_all(&mut self, bin: &Bin) {
        for placement in &bin.placements {
            self.add(placement);
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(false);
    }

    pub fn is_set(&self, x: u32, y: u32) -> bool {
        self.cells[self.index(x, y)]
    }

    /// True when no cell under the placement is occupied. The placement must
    /// lie inside the box.
    pub fn is_free(&self, placement: &Placement) -> bool {
        (placement.y..placement.y_end()).all(|y| {
            let row = self.index(placement.x, y);
            !self.cells[row..row + placement.width() as usize]
                .iter()
                .any(|&c| c)
        })
    }

    pub fn occupied_cells(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }
}

/// A box under construction together with its occupancy bitmap.
#[derive(Debug, Clone)]
pub struct OpenBin {
    pub bin: Bin,
    pub image: OccupancyBitmap,
}

/// The problem instance: box size plus the items to pack.
#[derive(Debug, Clone)]
pub struct PackingModel {
    box_size: u32,
    items: Vec<Rect>,
}

impl PackingModel {
    /// Builds a model with explicit items.
    pub fn from_items(box_size: u32, items: Vec<Rect>) -> Result<Self> {
        if box_size == 0 {
            return Err(BoxingError::InvalidConfiguration(
                "box size must be non-zero".to_string(),
            ));
        }
        if let Some((i, r)) = items.iter().enumerate().find(|(_, r)| r.w == 0 || r.h == 0) {
            return Err(BoxingError::InvalidConfiguration(format!(
                "item {} has a zero dimension ({})",
                i, r
            )));
        }
        Ok(Self { box_size, items })
    }

    /// Builds a model whose item sides are drawn uniformly from
    /// `[size_min, size_max]` with a generator seeded by `seed`.
    pub fn generate(
        box_size: u32,
        item_count: usize,
        size_min: u32,
        size_max: u32,
        seed: u64,
    ) -> Result<Self> {
        if size_min == 0 {
            return Err(BoxingError::InvalidConfiguration(
                "minimum item size must be non-zero".to_string(),
            ));
        }
        if size_min > size_max {
            return Err(BoxingError::InvalidConfiguration(format!(
                "minimum item size {} exceeds maximum {}",
                size_min, size_max
            )));
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let items = (0..item_count)
            .map(|_| {
                let w = rng.gen_range(size_min..=size_max);
                let h = rng.gen_range(size_min..=size_max);
                Rect::new(w, h)
            })
            .collect();
        Self::from_items(box_size, items)
    }

    pub fn box_size(&self) -> u32 {
        self.box_size
    }

    pub fn box_area(&self) -> u64 {
        self.box_size as u64 * self.box_size as u64
    }

    pub fn items(&self) -> &[Rect] {
        &self.items
    }

    pub fn item(&self, id: ItemId) -> Rect {
        self.items[id]
    }

    pub fn placement(&self, id: ItemId, x: u32, y: u32, transposed: bool) -> Placement {
        Placement::new(id, self.items[id], x, y, transposed)
    }

    /// Fails with a constraint violation for the first item that fits no
    /// empty box.
    pub fn ensure_items_fit(&self) -> Result<()> {
        match self
            .items
            .iter()
            .position(|r| !r.fits_in_square(self.box_size))
        {
            Some(id) => Err(self.violation(id)),
            None => Ok(()),
        }
    }

    fn violation(&self, id: ItemId) -> BoxingError {
        let rect = self.items[id];
        BoxingError::ConstraintViolation {
            item: id,
            width: rect.w,
            height: rect.h,
            box_size: self.box_size,
        }
    }

    pub fn create_image(&self) -> OccupancyBitmap {
        OccupancyBitmap::new(self.box_size)
    }

    pub fn image_of(&self, bin: &Bin) -> OccupancyBitmap {
        let mut image = self.create_image();
        image.add_all(bin);
        image
    }

    /// Border check only.
    pub fn can_place(&self, placement: &Placement) -> bool {
        placement.x_end() <= self.box_size && placement.y_end() <= self.box_size
    }

    /// Border check plus a free footprint in `image`.
    pub fn can_place_on(&self, placement: &Placement, image: &OccupancyBitmap) -> bool {
        self.can_place(placement) && image.is_free(placement)
    }

    /// Rotates the placement by 90° about its center. Returns `None` when the
    /// rotated origin would fall left of or above the box.
    pub fn transpose_center(&self, placement: &Placement) -> Option<Placement> {
        let (w, h) = (placement.width(), placement.height());
        if placement.x + w / 2 < h / 2 || placement.y + h / 2 < w / 2 {
            return None;
        }
        Some(Placement {
            x: placement.x + w / 2 - h / 2,
            y: placement.y + h / 2 - w / 2,
            transposed: !placement.transposed,
            ..*placement
        })
    }

    /// First free position for the item: untransposed before transposed,
    /// smallest `y` first, then smallest `x`.
    pub fn find_placement(&self, id: ItemId, image: &OccupancyBitmap) -> Option<Placement> {
        let rect = self.items[id];
        for transposed in [false, true] {
            if transposed && rect.w == rect.h {
                break;
            }
            let probe = self.placement(id, 0, 0, transposed);
            if !self.can_place(&probe) {
                continue;
            }
            for y in 0..=self.box_size - probe.height() {
                for x in 0..=self.box_size - probe.width() {
                    let candidate = probe.moved_to(x, y);
                    if image.is_free(&candidate) {
                        return Some(candidate);
                    }
                }
            }
        }
        None
    }

    /// First-fit insertion. Returns the index of the box that received the
    /// item, opening a new box when none of the existing ones has room.
    pub fn insert_into_any_box(&self, id: ItemId, bins: &mut Vec<OpenBin>) -> Result<usize> {
        if !self.items[id].fits_in_square(self.box_size) {
            return Err(self.violation(id));
        }
        Ok(self.place_first_fit(id, bins))
    }

    /// Same as [`Self::insert_into_any_box`] for items already known to fit an
    /// empty box.
    pub(crate) fn place_first_fit(&self, id: ItemId, bins: &mut Vec<OpenBin>) -> usize {
        for (i, open) in bins.iter_mut().enumerate() {
            if let Some(placement) = self.find_placement(id, &open.image) {
                open.image.add(&placement);
                open.bin.placements.push(placement);
                return i;
            }
        }

        let rect = self.items[id];
        let placement = self.placement(id, 0, 0, rect.h > rect.w);
        let mut open = OpenBin {
            bin: Bin::new(),
            image: self.create_image(),
        };
        open.image.add(&placement);
        open.bin.placements.push(placement);
        bins.push(open);
        bins.len() - 1
    }

    /// First-fit packing of items in the given order.
    pub(crate) fn pack_in_order(&self, order: &[ItemId]) -> Vec<OpenBin> {
        let mut bins = Vec::new();
        for &id in order {
            self.place_first_fit(id, &mut bins);
        }
        bins
    }

    pub fn occupied_area(&self, bin: &Bin) -> u64 {
        bin.placements.iter().map(|p| p.area()).sum()
    }

    pub fn total_occupied_area(&self, bins: &[Bin]) -> u64 {
        bins.iter().map(|b| self.occupied_area(b)).sum()
    }

    pub fn least_occupied_area(&self, bins: &[Bin]) -> u64 {
        bins.iter()
            .map(|b| self.occupied_area(b))
            .min()
            .unwrap_or(0)
    }

    /// Fraction of the box area covered by the bin's items.
    pub fn occupation(&self, bin: &Bin) -> f64 {
        self.occupied_area(bin) as f64 / self.box_area() as f64
    }

    /// Percentage of the total box area covered by items.
    pub fn occupation_percent(&self, bins: &[Bin]) -> f64 {
        if bins.is_empty() {
            return 0.0;
        }
        let total = self.box_area() * bins.len() as u64;
        self.total_occupied_area(bins) as f64 / total as f64 * 100.0
    }

    /// Number of items living in boxes whose occupation is at most
    /// `max_occupation` (a fraction of the box area).
    pub fn rectangle_count(&self, bins: &[Bin], max_occupation: f64) -> usize {
        bins.iter()
            .filter(|b| self.occupation(b) <= max_occupation)
            .map(|b| b.len())
            .sum()
    }

    pub fn overlap_area(a: &Placement, b: &Placement) -> u64 {
        let begin_x = a.x.max(b.x);
        let begin_y = a.y.max(b.y);
        let end_x = a.x_end().min(b.x_end());
        let end_y = a.y_end().min(b.y_end());
        if begin_x >= end_x || begin_y >= end_y {
            0
        } else {
            (end_x - begin_x) as u64 * (end_y - begin_y) as u64
        }
    }

    /// Sum of pairwise overlap areas within each box.
    pub fn total_overlap_area(&self, bins: &[Bin]) -> u64 {
        bins.iter()
            .map(|bin| {
                let ps = &bin.placements;
                (0..ps.len())
                    .flat_map(|i| (i + 1..ps.len()).map(move |j| (i, j)))
                    .map(|(i, j)| Self::overlap_area(&ps[i], &ps[j]))
                    .sum::<u64>()
            })
            .sum()
    }

    /// True if any placement crosses the border or collides with another
    /// placement of the same box.
    pub fn has_overlaps(&self, bins: &[Bin]) -> bool {
        let mut image = self.create_image();
        for bin in bins {
            image.clear();
            for placement in &bin.placements {
                if !self.can_place_on(placement, &image) {
                    return true;
                }
                image.add(placement);
            }
        }
        false
    }

    /// Layered potential used by the local search. Box `b` sits at height
    /// `b * box_size`; inside a box each item adds its area times a
    /// positional term whose direction rotates with `b mod cycle`.
    pub fn energy(&self, bins: &[Bin], cycle: usize) -> f64 {
        let cycle = cycle.max(1);
        let side = self.box_size as f64;
        bins.iter()
            .enumerate()
            .map(|(b, bin)| {
                let base = b as f64 * side;
                let phase = (b % cycle) % 4;
                bin.placements
                    .iter()
                    .map(|p| {
                        let x_center = p.x as f64 + p.width() as f64 / 2.0;
                        let y_center = p.y as f64 + p.height() as f64 / 2.0;
                        let term = match phase {
                            0 => y_center,
                            1 => x_center,
                            2 => side - y_center,
                            _ => side - x_center,
                        };
                        p.area() as f64 * (base + term)
                    })
                    .sum::<f64>()
            })
            .sum()
    }
}
