use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Neighborhood, Worker, check_energy_cycle, relocate};
use crate::error::Result;
use crate::model::{OccupancyBitmap, PackingModel};
use crate::types::{Bin, Placement};

/// Bitmaps of the boxes `center - radius ..= center + radius`, kept in step
/// with a scan over the boxes so each box is rasterized once per pass.
#[derive(Debug, Clone)]
pub struct BitmapWindow {
    center: usize,
    radius: usize,
    slots: Vec<Option<OccupancyBitmap>>,
}

impl BitmapWindow {
    pub fn new(model: &PackingModel, bins: &[Bin], center: usize, radius: usize) -> Self {
        let slots = (0..=2 * radius)
            .map(|k| {
                (center + k)
                    .checked_sub(radius)
                    .and_then(|b| bins.get(b))
                    .map(|bin| model.image_of(bin))
            })
            .collect();
        Self {
            center,
            radius,
            slots,
        }
    }

    pub fn center(&self) -> usize {
        self.center
    }

    /// Bitmap of box `index`, if it is inside the window and exists.
    pub fn get(&self, index: usize) -> Option<&OccupancyBitmap> {
        let k = (index + self.radius).checked_sub(self.center)?;
        self.slots.get(k)?.as_ref()
    }

    pub fn center_mut(&mut self) -> Option<&mut OccupancyBitmap> {
        self.slots[self.radius].as_mut()
    }

    /// Moves the window one box forward, recycling the bitmap that drops
    /// out of it for the box that enters.
    pub fn advance(&mut self, model: &PackingModel, bins: &[Bin]) {
        self.slots.rotate_left(1);
        self.center += 1;
        let entering = bins.get(self.center + self.radius);
        let last = self.slots.len() - 1;
        self.slots[last] = match (self.slots[last].take(), entering) {
            (Some(mut image), Some(bin)) => {
                image.clear();
                image.add_all(bin);
                Some(image)
            }
            (None, Some(bin)) => Some(model.image_of(bin)),
            (_, None) => None,
        };
    }
}

/// Every placement within `window` cells of `placement`, first in its
/// current orientation and then rotated about its center. Includes
/// `placement` itself. Square items are never rotated.
pub(crate) fn window_moves(model: &PackingModel, placement: &Placement, window: u32) -> Vec<Placement> {
    let square = placement.rect.w == placement.rect.h;
    let mut moves = Vec::new();
    for y in placement.y.saturating_sub(window)..=placement.y.saturating_add(window) {
        for x in placement.x.saturating_sub(window)..=placement.x.saturating_add(window) {
            let moved = placement.moved_to(x, y);
            moves.push(moved);
            if square {
                continue;
            }
            if let Some(rotated) = model.transpose_center(&moved) {
                moves.push(rotated);
            }
        }
    }
    moves
}

/// Limits the move windows to what can be reached: no move leaves a box
/// wider than `box_size`, and there are never more boxes than items.
pub(crate) fn clamp_windows(model: &PackingModel, window: u32, box_window: usize) -> (u32, usize) {
    (
        window.min(model.box_size()),
        box_window.min(model.items().len()),
    )
}

/// Moves single items to nearby positions in nearby boxes, keeping every
/// state overlap-free.
pub struct GeometryNeighborhood {
    model: PackingModel,
    window: u32,
    box_window: usize,
    energy_cycle: usize,
}

impl GeometryNeighborhood {
    pub fn new(
        model: PackingModel,
        window: u32,
        box_window: usize,
        energy_cycle: usize,
    ) -> Result<Self> {
        model.ensure_items_fit()?;
        check_energy_cycle(energy_cycle)?;
        let (window, box_window) = clamp_windows(&model, window, box_window);
        Ok(Self {
            model,
            window,
            box_window,
            energy_cycle,
        })
    }

    pub fn model(&self) -> &PackingModel {
        &self.model
    }
}

impl Neighborhood for GeometryNeighborhood {
    type Solution = Vec<Bin>;

    fn initial(&self, seed: u64) -> Vec<Bin> {
        let model = &self.model;
        let side = model.box_size();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut bins: Vec<Bin> = Vec::new();
        let mut image = model.create_image();

        for (id, rect) in model.items().iter().enumerate() {
            let x = rng.gen_range(0..=side - rect.w);
            let y = rng.gen_range(0..=side - rect.h);
            let placement = model.placement(id, x, y, false);

            let fits = !bins.is_empty() && model.can_place_on(&placement, &image);
            if !fits {
                bins.push(Bin::new());
                image.clear();
            }
            image.add(&placement);
            if let Some(last) = bins.last_mut() {
                last.placements.push(placement);
            }
        }
        bins
    }

    fn neighbors(&self, solution: &Vec<Bin>, worker: Worker, _rng: &mut StdRng) -> Vec<Vec<Bin>> {
        let model = &self.model;
        let boxes = worker.range(solution.len());
        let mut neighborhood = Vec::new();
        if boxes.is_empty() {
            return neighborhood;
        }

        let mut window = BitmapWindow::new(model, solution, boxes.start, self.box_window);
        for box_i in boxes {
            for (rect_i, placement) in solution[box_i].placements.iter().enumerate() {
                if let Some(image) = window.center_mut() {
                    image.remove(placement);
                }

                let moves = window_moves(model, placement, self.window);
                let first = box_i.saturating_sub(self.box_window);
                let last = box_i.saturating_add(self.box_window).min(solution.len() - 1);
                for box_j in first..=last {
                    let Some(image) = window.get(box_j) else {
                        continue;
                    };
                    for candidate in &moves {
                        if box_j == box_i && candidate == placement {
                            continue;
                        }
                        if model.can_place_on(candidate, image) {
                            neighborhood.push(relocate(solution, box_i, rect_i, box_j, *candidate));
                        }
                    }
                }

                if let Some(image) = window.center_mut() {
                    image.add(placement);
                }
            }
            window.advance(model, solution);
        }
        neighborhood
    }

    fn heuristic(&self, solution: &Vec<Bin>, _iteration: u64) -> f64 {
        self.model.energy(solution, self.energy_cycle)
    }

    fn good(&self, _solution: &Vec<Bin>) -> bool {
        true
    }

    fn get_boxes(&self, solution: &Vec<Bin>) -> Vec<Bin> {
        solution.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{SearchConfig, SearchStatus, run_local_search};
    use crate::types::{ItemId, Rect};

    fn strategy(items: usize, seed: u64, window: u32, box_window: usize) -> GeometryNeighborhood {
        let model = PackingModel::generate(8, items, 1, 4, seed).unwrap();
        GeometryNeighborhood::new(model, window, box_window, 1).unwrap()
    }

    fn assert_feasible(model: &PackingModel, bins: &[Bin]) {
        let mut seen: Vec<ItemId> = bins
            .iter()
            .flat_map(|b| b.placements.iter().map(|p| p.item))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..model.items().len()).collect::<Vec<_>>());
        assert!(bins.iter().all(|b| !b.is_empty()), "empty box left behind");
        assert!(!model.has_overlaps(bins));
    }

    #[test]
    fn test_initial_is_feasible_and_seeded() {
        let s = strategy(40, 1, 1, 1);
        let a = s.initial(5);
        assert_feasible(s.model(), &a);
        assert_eq!(a, s.initial(5));
        assert!(a.iter().flat_map(|b| &b.placements).all(|p| !p.transposed));
    }

    #[test]
    fn test_neighbors_are_feasible() {
        let s = strategy(25, 2, 1, 1);
        let solution = s.initial(0);
        let mut rng = StdRng::seed_from_u64(0);
        let neighbors = s.neighbors(&solution, Worker::single(), &mut rng);
        assert!(!neighbors.is_empty());
        for n in &neighbors {
            assert_feasible(s.model(), n);
            assert_ne!(n, &solution);
        }
    }

    #[test]
    fn test_workers_split_the_same_neighborhood() {
        let s = strategy(30, 3, 1, 1);
        let solution = s.initial(1);
        let mut rng = StdRng::seed_from_u64(0);
        let all = s.neighbors(&solution, Worker::single(), &mut rng);
        for count in 2..5 {
            let split: Vec<Vec<Bin>> = (0..count)
                .flat_map(|id| s.neighbors(&solution, Worker { id, count }, &mut rng))
                .collect();
            assert_eq!(split, all);
        }
    }

    #[test]
    fn test_moving_last_item_out_removes_box() {
        let model = PackingModel::from_items(4, vec![Rect::new(2, 2), Rect::new(2, 2)]).unwrap();
        let s = GeometryNeighborhood::new(model, 0, 1, 1).unwrap();
        let solution = vec![
            Bin {
                placements: vec![s.model().placement(0, 0, 0, false)],
            },
            Bin {
                placements: vec![s.model().placement(1, 0, 0, false)],
            },
        ];
        let mut rng = StdRng::seed_from_u64(0);
        let neighbors = s.neighbors(&solution, Worker::single(), &mut rng);
        // Window 0 leaves only box changes, and the other box is taken at the
        // same spot.
        assert!(neighbors.is_empty());

        let s = GeometryNeighborhood::new(s.model().clone(), 2, 1, 1).unwrap();
        let neighbors = s.neighbors(&solution, Worker::single(), &mut rng);
        assert!(neighbors.iter().any(|n| n.len() == 1));
        for n in &neighbors {
            assert_feasible(s.model(), n);
        }
    }

    #[test]
    fn test_bitmap_window_tracks_boxes() {
        let s = strategy(60, 4, 1, 2);
        let bins = s.initial(3);
        assert!(bins.len() > 3);
        let mut window = BitmapWindow::new(s.model(), &bins, 0, 2);
        for center in 0..bins.len() {
            assert_eq!(window.center(), center);
            for b in 0..bins.len() {
                let expected = (b + 2 >= center && b <= center + 2).then(|| s.model().image_of(&bins[b]));
                assert_eq!(window.get(b), expected.as_ref(), "box {b} around {center}");
            }
            window.advance(s.model(), &bins);
        }
    }

    #[test]
    fn test_window_moves_include_rotations() {
        let model = PackingModel::from_items(10, vec![Rect::new(4, 2)]).unwrap();
        let p = model.placement(0, 3, 3, false);
        let moves = window_moves(&model, &p, 1);
        assert_eq!(moves.iter().filter(|m| !m.transposed).count(), 9);
        assert_eq!(moves.iter().filter(|m| m.transposed).count(), 9);
        assert!(moves.contains(&p));
        assert!(moves.contains(&model.placement(0, 4, 2, true)));
    }

    #[test]
    fn test_oversized_windows_are_clamped() {
        let model = PackingModel::from_items(4, vec![Rect::new(2, 2), Rect::new(1, 3)]).unwrap();
        assert_eq!(clamp_windows(&model, u32::MAX, usize::MAX), (4, 2));
        assert_eq!(clamp_windows(&model, 1, 1), (1, 1));

        let s = GeometryNeighborhood::new(model, u32::MAX, usize::MAX, 1).unwrap();
        let solution = s.initial(0);
        let mut rng = StdRng::seed_from_u64(0);
        let neighbors = s.neighbors(&solution, Worker::single(), &mut rng);
        assert!(!neighbors.is_empty());
        for n in &neighbors {
            assert_feasible(s.model(), n);
        }

        let p = s.model().placement(0, u32::MAX - 1, 0, false);
        let moves = window_moves(s.model(), &p, 2);
        assert!(moves.iter().all(|m| m.x >= u32::MAX - 3));
    }

    #[test]
    fn test_local_search_improves_and_stays_feasible() {
        let s = strategy(30, 5, 1, 1);
        let config = SearchConfig {
            iter_max: Some(60),
            threads: 2,
            seed: 9,
            record_log: true,
            ..SearchConfig::default()
        };
        let outcome = run_local_search(&s, &config);
        assert_feasible(s.model(), &outcome.solution);
        assert!(matches!(
            outcome.status,
            SearchStatus::Converged | SearchStatus::IterationLimitReached
        ));
        assert_eq!(outcome.log[0], s.initial(9));
        for pair in outcome.log.windows(2) {
            assert!(s.heuristic(&pair[1], 0) < s.heuristic(&pair[0], 0));
            assert_feasible(s.model(), &pair[1]);
        }
        assert!(outcome.solution.len() <= outcome.log[0].len());
    }
}
