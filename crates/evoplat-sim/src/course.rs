use std::ops::Range;

/// A single cell of a course.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Tile {
    #[default]
    Empty,
    /// Solid ground; blocks movement.
    Ground,
    /// Collected on contact.
    Coin,
    /// Kills on contact.
    Hazard,
    /// Finishes the level on contact.
    Goal,
}

impl Tile {
    /// Parses a map character: `.` empty, `#` ground, `o` coin, `^` hazard,
    /// `G` goal.
    #[must_use]
    pub fn from_char(ch: char) -> Option<Self> {
        match ch {
            '.' => Some(Self::Empty),
            '#' => Some(Self::Ground),
            'o' => Some(Self::Coin),
            '^' => Some(Self::Hazard),
            'G' => Some(Self::Goal),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_solid(self) -> bool {
        self == Self::Ground
    }

    /// Value seen by the agent's sensors.
    #[must_use]
    pub fn sensor_value(self) -> f64 {
        match self {
            Self::Ground => 1.0,
            Self::Hazard => -1.0,
            Self::Empty | Self::Coin | Self::Goal => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum CourseError {
    #[display("course has no rows")]
    Empty,
    #[display("row {row} has {actual} tiles, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[display("unknown tile {ch:?} at row {row}, column {col}")]
    UnknownTile { ch: char, row: usize, col: usize },
    #[display("course has no start position `S`")]
    MissingStart,
    #[display("course has more than one start position")]
    MultipleStarts,
}

/// Tile map of a level.
///
/// Everything left of column 0 is solid, so the agent cannot leave the level
/// to the left. Everything else outside the map is empty; falling below the
/// bottom row is fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    width: usize,
    height: usize,
    tiles: Vec<Tile>,
    start: (usize, usize),
}

impl Course {
    /// Creates an empty course with the agent starting at `start` (column, row).
    #[must_use]
    pub fn new(width: usize, height: usize, start: (usize, usize)) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::Empty; width * height],
            start,
        }
    }

    /// Parses a course drawn as text, one string per row from the top.
    ///
    /// Uses the characters of [`Tile::from_char`] plus exactly one `S`, the
    /// start position (an empty tile).
    ///
    /// # Examples
    ///
    /// ```
    /// use evoplat_sim::{Course, Tile};
    ///
    /// let course = Course::from_rows(&["S.oG", "####"]).unwrap();
    /// assert_eq!(course.start(), (0, 0));
    /// assert_eq!(course.tile(2, 0), Tile::Coin);
    /// ```
    pub fn from_rows<S>(rows: &[S]) -> Result<Self, CourseError>
    where
        S: AsRef<str>,
    {
        let width = rows
            .first()
            .map(|row| row.as_ref().chars().count())
            .filter(|&width| width > 0)
            .ok_or(CourseError::Empty)?;

        let mut tiles = Vec::with_capacity(width * rows.len());
        let mut start = None;
        for (row, line) in rows.iter().enumerate() {
            let line = line.as_ref();
            let actual = line.chars().count();
            if actual != width {
                return Err(CourseError::Ragged {
                    row,
                    expected: width,
                    actual,
                });
            }
            for (col, ch) in line.chars().enumerate() {
                let tile = if ch == 'S' {
                    if start.replace((col, row)).is_some() {
                        return Err(CourseError::MultipleStarts);
                    }
                    Tile::Empty
                } else {
                    Tile::from_char(ch).ok_or(CourseError::UnknownTile { ch, row, col })?
                };
                tiles.push(tile);
            }
        }

        Ok(Self {
            width,
            height: rows.len(),
            tiles,
            start: start.ok_or(CourseError::MissingStart)?,
        })
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Start tile as `(column, row)`.
    #[must_use]
    pub fn start(&self) -> (usize, usize) {
        self.start
    }

    /// Tile inside the map.
    ///
    /// # Panics
    ///
    /// Panics if the position is outside the map.
    #[must_use]
    pub fn tile(&self, col: usize, row: usize) -> Tile {
        assert!(col < self.width && row < self.height);
        self.tiles[row * self.width + col]
    }

    /// Tile at any position, including outside the map.
    #[must_use]
    pub fn tile_at(&self, col: i64, row: i64) -> Tile {
        if col < 0 {
            return Tile::Ground;
        }
        match (usize::try_from(col), usize::try_from(row)) {
            (Ok(col), Ok(row)) if col < self.width && row < self.height => self.tile(col, row),
            _ => Tile::Empty,
        }
    }

    pub fn set(&mut self, col: usize, row: usize, tile: Tile) {
        if col < self.width && row < self.height {
            self.tiles[row * self.width + col] = tile;
        }
    }

    /// Sets every tile in the rectangle, clipped to the map.
    pub fn fill(&mut self, cols: Range<usize>, rows: Range<usize>, tile: Tile) -> &mut Self {
        for row in rows {
            for col in cols.clone() {
                self.set(col, row, tile);
            }
        }
        self
    }

    /// Leftmost column containing a goal tile.
    #[must_use]
    pub fn goal_column(&self) -> Option<usize> {
        (0..self.width).find(|&col| (0..self.height).any(|row| self.tile(col, row) == Tile::Goal))
    }
}
