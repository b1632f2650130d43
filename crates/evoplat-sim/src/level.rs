use serde::{Deserialize, Serialize};

use crate::course::{Course, Tile};

const HEIGHT: usize = 14;
/// First ground row; the agent walks on top of it.
const SURFACE: usize = 12;
const START: (usize, usize) = (2, SURFACE - 1);

/// Built-in courses.
#[derive(
    Default,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::FromStr,
)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// Flat ground with low blocks and coins.
    #[default]
    #[display("plains")]
    Plains,
    /// Gaps in the ground and hazards to jump over.
    #[display("pits")]
    Pits,
    /// Steps up and down with a gap at the top.
    #[display("staircase")]
    Staircase,
}

impl Level {
    pub const ALL: [Self; 3] = [Self::Plains, Self::Pits, Self::Staircase];

    #[must_use]
    pub fn course(self) -> Course {
        match self {
            Self::Plains => plains(),
            Self::Pits => pits(),
            Self::Staircase => staircase(),
        }
    }
}

fn base(width: usize) -> Course {
    let mut course = Course::new(width, HEIGHT, START);
    course
        .fill(0..width, SURFACE..HEIGHT, Tile::Ground)
        .fill(width - 10..width - 9, 0..SURFACE, Tile::Goal);
    course
}

fn coins(course: &mut Course, cols: std::ops::Range<usize>, row: usize) {
    course.fill(cols, row..row + 1, Tile::Coin);
}

fn plains() -> Course {
    let mut course = base(180);
    course
        .fill(30..31, SURFACE - 1..SURFACE, Tile::Ground)
        .fill(55..56, SURFACE - 2..SURFACE, Tile::Ground)
        .fill(80..82, SURFACE - 1..SURFACE, Tile::Ground)
        .fill(120..121, SURFACE - 2..SURFACE, Tile::Ground);
    for start in [20, 60, 100, 140] {
        coins(&mut course, start..start + 4, SURFACE - 3);
    }
    course
}

fn pits() -> Course {
    let mut course = base(200);
    for (start, width) in [(40, 2), (75, 3), (120, 2), (150, 3)] {
        course.fill(start..start + width, SURFACE..HEIGHT, Tile::Empty);
        coins(&mut course, start..start + width, SURFACE - 3);
    }
    for col in [60, 95, 135] {
        course.set(col, SURFACE - 1, Tile::Hazard);
    }
    course
}

fn staircase() -> Course {
    let mut course = base(200);
    for step in 0..2 {
        let left = 40 + step * 4;
        let top = SURFACE - 1 - step;
        course.fill(left..88 - step * 4, top..SURFACE, Tile::Ground);
    }
    // Gap on the upper plateau.
    course.fill(62..64, SURFACE - 2..HEIGHT, Tile::Empty);
    coins(&mut course, 58..68, SURFACE - 5);
    course.set(110, SURFACE - 1, Tile::Hazard);
    course
}
