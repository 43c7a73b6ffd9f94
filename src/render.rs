use crate::types::Bin;

const MAX_WIDTH: f64 = 80.0;
const MAX_HEIGHT: f64 = 40.0;

/// ASCII drawing of one box. Terminal cells are about twice as tall as they
/// are wide, so columns are scaled twice as much as rows.
pub fn render_box(box_size: u32, bin: &Bin) -> String {
    if box_size == 0 {
        return String::new();
    }
    let scale_y = f64::min(MAX_WIDTH / (2.0 * box_size as f64), MAX_HEIGHT / box_size as f64);
    let scale_x = 2.0 * scale_y;
    let grid_w = (box_size as f64 * scale_x).round() as usize;
    let grid_h = (box_size as f64 * scale_y).round() as usize;

    if grid_w == 0 || grid_h == 0 {
        return String::new();
    }

    let mut grid = vec![vec![' '; grid_w + 1]; grid_h + 1];
    draw_rect(&mut grid, 0, 0, grid_w, grid_h);

    for p in &bin.placements {
        let sx = (p.x as f64 * scale_x).round() as usize;
        let sy = (p.y as f64 * scale_y).round() as usize;
        let sw = (p.width() as f64 * scale_x).round() as usize;
        let sh = (p.height() as f64 * scale_y).round() as usize;

        if sw == 0 || sh == 0 {
            continue;
        }

        draw_rect(&mut grid, sx, sy, sw, sh);

        let label: Vec<char> = format!("{}x{}", p.width(), p.height()).chars().collect();
        if sw > 2 && sh > 1 {
            let cx = sx + sw / 2;
            let cy = sy + sh / 2;
            let start_x = cx.saturating_sub(label.len() / 2);
            for (i, &ch) in label.iter().enumerate() {
                let x = start_x + i;
                if x > sx && x < sx + sw {
                    grid[cy][x] = ch;
                }
            }
        }
    }

    let mut result = String::new();
    for row in &grid {
        let line: String = row.iter().collect();
        result.push_str(line.trim_end());
        result.push('\n');
    }
    result
}

fn edge(current: char, line: char) -> char {
    match (current, line) {
        ('|' | '+', '-') | ('-' | '+', '|') => '+',
        _ => line,
    }
}

fn draw_rect(grid: &mut [Vec<char>], x: usize, y: usize, w: usize, h: usize) {
    let rows = grid.len();
    let cols = grid.first().map_or(0, |r| r.len());

    for i in x..=(x + w).min(cols.saturating_sub(1)) {
        for j in [y, y + h] {
            if j < rows {
                grid[j][i] = edge(grid[j][i], '-');
            }
        }
    }
    for j in y..=(y + h).min(rows.saturating_sub(1)) {
        for i in [x, x + w] {
            if i < cols {
                grid[j][i] = edge(grid[j][i], '|');
            }
        }
    }
    for cx in [x, x + w] {
        for cy in [y, y + h] {
            if cy < rows && cx < cols {
                grid[cy][cx] = '+';
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Placement, Rect};

    #[test]
    fn test_render_single_item() {
        let bin = Bin {
            placements: vec![Placement::new(0, Rect::new(6, 4), 0, 0, false)],
        };
        let output = render_box(10, &bin);
        assert!(output.contains('+'));
        assert!(output.contains('-'));
        assert!(output.contains('|'));
        assert!(output.contains("6x4"));
        assert_eq!(output.lines().count(), 41);
    }

    #[test]
    fn test_render_labels_use_placed_orientation() {
        let bin = Bin {
            placements: vec![
                Placement::new(0, Rect::new(5, 2), 0, 0, true),
                Placement::new(1, Rect::new(5, 10), 5, 0, false),
            ],
        };
        let output = render_box(10, &bin);
        assert!(output.contains("2x5"));
        assert!(output.contains("5x10"));
    }

    #[test]
    fn test_render_empty_box() {
        let output = render_box(8, &Bin::new());
        let lines: Vec<&str> = output.lines().collect();
        assert!(lines[0].starts_with('+') && lines[0].ends_with('+'));
        assert!(lines[1].starts_with('|'));
    }
}
