//! The agent's view of the course.
//!
//! [`sensor_grid`] samples a square window of tiles around the center of the
//! agent's body, top row first. [`render_grid`] draws such a window as text,
//! two characters per cell:
//!
//! | value | cell |
//! |-------|------|
//! | `0`   | `  ` |
//! | `1`   | `$$` |
//! | `-1`  | `@@` |
//! | agent | `XX` |

use crate::{TILE_SIZE, course::Course};

/// Number of sensor values for `radius`.
#[must_use]
pub const fn input_width(radius: usize) -> usize {
    (2 * radius + 1) * (2 * radius + 1)
}

/// Samples the tiles around the agent whose top-left corner is at `(x, y)`.
#[must_use]
pub fn sensor_grid(course: &Course, x: f64, y: f64, radius: usize) -> Vec<f64> {
    let center_col = tile_index(x + TILE_SIZE / 2.0);
    let center_row = tile_index(y + TILE_SIZE / 2.0);
    let radius = i64::try_from(radius).unwrap_or(i64::MAX);

    let mut grid = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            grid.push(
                course
                    .tile_at(center_col + dx, center_row + dy)
                    .sensor_value(),
            );
        }
    }
    grid
}

/// Index of the tile containing pixel coordinate `pixel`.
#[expect(clippy::cast_possible_truncation)]
pub(crate) fn tile_index(pixel: f64) -> i64 {
    (pixel / TILE_SIZE).floor() as i64
}

/// Draws a sensor window with the agent marked in the middle.
#[must_use]
pub fn render_grid(grid: &[f64], radius: usize) -> String {
    let side = 2 * radius + 1;
    let mut out = String::new();
    for (row, cells) in grid.chunks(side).enumerate() {
        for (col, &value) in cells.iter().enumerate() {
            let cell = if row == radius && col == radius {
                "XX"
            } else if value > 0.0 {
                "$$"
            } else if value < 0.0 {
                "@@"
            } else {
                "  "
            };
            out.push_str(cell);
        }
        out.push_str("|\n");
    }
    out.push_str(&"_".repeat(2 * side));
    out.push_str("|\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_grid(rows: &[&str], radius: usize) -> Vec<f64> {
        let course = Course::from_rows(rows).unwrap();
        let (col, row) = course.start();
        #[expect(clippy::cast_precision_loss)]
        let (x, y) = (col as f64 * TILE_SIZE, row as f64 * TILE_SIZE);
        sensor_grid(&course, x, y, radius)
    }

    #[test]
    fn test_floor_below_agent() {
        let grid = start_grid(&["...", ".S.", "###"], 1);
        assert_eq!(grid, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_hazards_are_negative() {
        let grid = start_grid(&["...", ".S^", "###"], 1);
        assert_eq!(grid[5], -1.0);
    }

    #[test]
    fn test_coins_and_goal_are_invisible() {
        let grid = start_grid(&["oG.", ".S.", "###"], 1);
        assert_eq!(&grid[..3], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_left_edge_is_solid() {
        let grid = start_grid(&["..", "S.", "##"], 1);
        assert_eq!(grid, vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_default_radius_width() {
        assert_eq!(input_width(crate::SENSOR_RADIUS), 169);
        let grid = start_grid(&["S.", "##"], crate::SENSOR_RADIUS);
        assert_eq!(grid.len(), 169);
    }

    #[test]
    fn test_render() {
        let grid = [0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        assert_eq!(
            render_grid(&grid, 1),
            "  @@  |\n  XX  |\n$$$$$$|\n______|\n"
        );
    }
}
