use evoplat_training::episode::{
    Environment, EnvironmentError, EnvironmentFactory, Observation,
};

use crate::{
    SENSOR_RADIUS, TILE_SIZE,
    action::Action,
    course::{Course, Tile},
    level::Level,
    sensors::{self, tile_index},
};

/// Reward for collecting a coin.
pub const COIN_REWARD: f64 = 50.0;
/// Reward for touching the goal.
pub const GOAL_REWARD: f64 = 1000.0;
/// Frames of the end-of-level animation.
pub const END_ANIMATION_FRAMES: u32 = 64;

const GRAVITY: f64 = 0.5;
const JUMP_SPEED: f64 = 6.0;
const MAX_FALL_SPEED: f64 = 6.0;
/// Keeps a body flush against a tile edge from overlapping the next tile.
const EDGE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Playing,
    Dead,
    /// Goal reached; the animation has this many frames left.
    Finished(u32),
}

/// A running episode on a [`Course`].
#[derive(Debug, Clone)]
pub struct SimEnvironment {
    course: Course,
    tiles: Course,
    radius: usize,
    x: f64,
    y: f64,
    vy: f64,
    phase: Phase,
}

impl SimEnvironment {
    #[must_use]
    pub fn new(course: Course, radius: usize) -> Self {
        let mut env = Self {
            tiles: course.clone(),
            course,
            radius,
            x: 0.0,
            y: 0.0,
            vy: 0.0,
            phase: Phase::Playing,
        };
        env.restart();
        env
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.phase == Phase::Dead
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished(_))
    }

    fn restart(&mut self) {
        let (col, row) = self.course.start();
        self.tiles = self.course.clone();
        self.x = to_pixels(col);
        self.y = to_pixels(row);
        self.vy = 0.0;
        self.phase = Phase::Playing;
    }

    /// Advances one frame and returns the reward earned in it.
    fn tick(&mut self, action: Action) -> f64 {
        match self.phase {
            Phase::Dead => return 0.0,
            Phase::Finished(frames) => {
                self.phase = Phase::Finished(frames.saturating_sub(1));
                return 0.0;
            }
            Phase::Playing => {}
        }

        if action.jumps() && self.on_ground() {
            self.vy = -JUMP_SPEED;
        }
        self.move_horizontally(action.speed());
        self.vy = (self.vy + GRAVITY).min(MAX_FALL_SPEED);
        self.move_vertically(self.vy);

        self.touch()
    }

    fn on_ground(&self) -> bool {
        self.overlaps_solid(self.x, self.y + 1.0)
    }

    fn move_horizontally(&mut self, dx: f64) {
        let x = self.x + dx;
        if !self.overlaps_solid(x, self.y) {
            self.x = x;
        } else if dx > 0.0 {
            self.x = tile_left(x + TILE_SIZE - EDGE) - TILE_SIZE;
        } else {
            self.x = tile_left(x) + TILE_SIZE;
        }
    }

    fn move_vertically(&mut self, dy: f64) {
        let y = self.y + dy;
        if !self.overlaps_solid(self.x, y) {
            self.y = y;
            return;
        }
        if dy > 0.0 {
            self.y = tile_left(y + TILE_SIZE - EDGE) - TILE_SIZE;
        } else {
            self.y = tile_left(y) + TILE_SIZE;
        }
        self.vy = 0.0;
    }

    /// Applies whatever the body touches and returns the reward.
    fn touch(&mut self) -> f64 {
        #[expect(clippy::cast_precision_loss)]
        let bottom = self.course.height() as f64 * TILE_SIZE;
        if self.y > bottom {
            self.phase = Phase::Dead;
            tracing::trace!(x = self.x, "fell into a pit");
            return 0.0;
        }

        let mut reward = 0.0;
        for (col, row) in covered_tiles(self.x, self.y) {
            match self.tiles.tile_at(col, row) {
                Tile::Coin => {
                    if let (Ok(col), Ok(row)) = (usize::try_from(col), usize::try_from(row)) {
                        self.tiles.set(col, row, Tile::Empty);
                    }
                    reward += COIN_REWARD;
                }
                Tile::Hazard => {
                    self.phase = Phase::Dead;
                    tracing::trace!(x = self.x, "hit a hazard");
                    return reward;
                }
                Tile::Goal => {
                    self.phase = Phase::Finished(END_ANIMATION_FRAMES);
                    tracing::trace!(x = self.x, "reached the goal");
                    return reward + GOAL_REWARD;
                }
                Tile::Empty | Tile::Ground => {}
            }
        }
        reward
    }

    fn overlaps_solid(&self, x: f64, y: f64) -> bool {
        covered_tiles(x, y).any(|(col, row)| self.tiles.tile_at(col, row).is_solid())
    }
}

impl Environment for SimEnvironment {
    fn reset(&mut self) -> Result<(), EnvironmentError> {
        self.restart();
        Ok(())
    }

    fn observe(&self) -> Observation {
        Observation {
            sensors: sensors::sensor_grid(&self.tiles, self.x, self.y, self.radius),
            x: self.x,
            y: self.y,
            ended: self.phase != Phase::Playing,
            animating: matches!(self.phase, Phase::Finished(frames) if frames > 0),
        }
    }

    fn step(&mut self, action: usize) -> Result<f64, EnvironmentError> {
        let action = Action::from_index(action)
            .ok_or_else(|| EnvironmentError::new(format!("unknown action index {action}")))?;
        Ok((0..action.hold_frames()).map(|_| self.tick(action)).sum())
    }
}

/// Builds a [`SimEnvironment`] for each episode from a built-in [`Level`].
#[derive(Debug, Clone, Copy)]
pub struct SimFactory {
    radius: usize,
}

impl Default for SimFactory {
    fn default() -> Self {
        Self::new(SENSOR_RADIUS)
    }
}

impl SimFactory {
    #[must_use]
    pub fn new(radius: usize) -> Self {
        Self { radius }
    }

    /// Number of sensor values produced per observation.
    #[must_use]
    pub fn input_width(&self) -> usize {
        sensors::input_width(self.radius)
    }
}

impl EnvironmentFactory for SimFactory {
    fn create(&self, level: &str) -> Result<Box<dyn Environment>, EnvironmentError> {
        let level = level
            .parse::<Level>()
            .map_err(|_| EnvironmentError::new(format!("unknown level `{level}`")))?;
        Ok(Box::new(SimEnvironment::new(level.course(), self.radius)))
    }
}

#[expect(clippy::cast_precision_loss)]
fn to_pixels(tile: usize) -> f64 {
    tile as f64 * TILE_SIZE
}

/// Left (or top) pixel edge of the tile containing `pixel`.
#[expect(clippy::cast_precision_loss)]
fn tile_left(pixel: f64) -> f64 {
    tile_index(pixel) as f64 * TILE_SIZE
}

/// Tiles overlapped by a one-tile body with its top-left corner at `(x, y)`.
fn covered_tiles(x: f64, y: f64) -> impl Iterator<Item = (i64, i64)> {
    let cols = tile_index(x)..=tile_index(x + TILE_SIZE - EDGE);
    let rows = tile_index(y)..=tile_index(y + TILE_SIZE - EDGE);
    rows.flat_map(move |row| cols.clone().map(move |col| (col, row)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUN_LEFT: usize = 0;
    const RIGHT: usize = 1;
    const RUN_RIGHT: usize = 2;
    const RUN_JUMP_RIGHT: usize = 3;

    fn env(rows: &[&str]) -> SimEnvironment {
        SimEnvironment::new(Course::from_rows(rows).unwrap(), 1)
    }

    fn run_until_ended(env: &mut SimEnvironment, action: usize, max_steps: usize) -> f64 {
        let mut points = 0.0;
        for _ in 0..max_steps {
            if env.observe().ended {
                break;
            }
            points += env.step(action).unwrap();
        }
        points
    }

    #[test]
    fn test_running_and_walking() {
        let mut env = env(&["..........", "S.........", "##########"]);
        assert_eq!(env.step(RUN_RIGHT).unwrap(), 0.0);
        let observation = env.observe();
        assert_eq!((observation.x, observation.y), (12.0, 16.0));
        assert!(!observation.ended);

        env.step(RIGHT).unwrap();
        assert_eq!(env.observe().x, 18.0);

        env.step(RUN_LEFT).unwrap();
        assert_eq!(env.observe().x, 6.0);
    }

    #[test]
    fn test_left_edge_blocks() {
        let mut env = env(&["S...", "####"]);
        env.step(RUN_LEFT).unwrap();
        env.step(RUN_LEFT).unwrap();
        assert_eq!(env.observe().x, 0.0);
    }

    #[test]
    fn test_jump_leaves_the_ground() {
        let mut env = env(&["..........", "S.........", "##########"]);
        env.step(RUN_JUMP_RIGHT).unwrap();
        let observation = env.observe();
        assert_eq!(observation.x, 24.0);
        assert!(observation.y < 16.0);

        // Lands again on the floor.
        for _ in 0..10 {
            env.step(RIGHT).unwrap();
        }
        assert_eq!(env.observe().y, 16.0);
    }

    #[test]
    fn test_wall_stops_the_agent() {
        let mut env = env(&["....#", "S...#", "#####"]);
        for _ in 0..10 {
            env.step(RUN_RIGHT).unwrap();
        }
        assert_eq!(env.observe().x, 48.0);
        assert!(!env.observe().ended);
    }

    #[test]
    fn test_jump_clears_a_low_block() {
        let mut env = env(&["..........", "S...#.....", "##########"]);
        env.step(RUN_RIGHT).unwrap();
        env.step(RUN_JUMP_RIGHT).unwrap();
        env.step(RUN_JUMP_RIGHT).unwrap();
        for _ in 0..4 {
            env.step(RUN_RIGHT).unwrap();
        }
        assert!(env.observe().x > 80.0);
    }

    #[test]
    fn test_pit_kills() {
        let mut env = env(&["S.....", "##..##"]);
        let points = run_until_ended(&mut env, RUN_RIGHT, 30);
        let observation = env.observe();
        assert!(env.is_dead());
        assert!(observation.ended);
        assert!(!observation.animating);
        assert_eq!(points, 0.0);

        // Nothing happens after death.
        assert_eq!(env.step(RUN_RIGHT).unwrap(), 0.0);
        assert_eq!(env.observe().x, observation.x);
    }

    #[test]
    fn test_hazard_kills() {
        let mut env = env(&["S.^.", "####"]);
        run_until_ended(&mut env, RUN_RIGHT, 10);
        assert!(env.is_dead());
        assert!(env.observe().x < 32.0);
    }

    #[test]
    fn test_goal_plays_end_animation() {
        let mut env = env(&["S..G", "####"]);
        let points = run_until_ended(&mut env, RUN_RIGHT, 10);
        assert!(env.is_finished());
        assert_eq!(points, GOAL_REWARD);

        let observation = env.observe();
        assert!(observation.ended);
        assert!(observation.animating);

        let mut steps = 0;
        while env.observe().animating {
            assert_eq!(env.step(RUN_RIGHT).unwrap(), 0.0);
            steps += 1;
            assert!(steps <= END_ANIMATION_FRAMES / 4);
        }
        assert!(env.observe().ended);
        assert_eq!(env.observe().x, observation.x);
    }

    #[test]
    fn test_coins_are_collected_once_per_episode() {
        let mut env = env(&[".o..", "So..", "####"]);
        assert_eq!(env.step(RUN_RIGHT).unwrap(), COIN_REWARD);
        assert_eq!(env.step(RUN_RIGHT).unwrap(), 0.0);

        env.reset().unwrap();
        assert_eq!(env.observe().x, 0.0);
        assert_eq!(env.step(RUN_RIGHT).unwrap(), COIN_REWARD);
    }

    #[test]
    fn test_unknown_action() {
        let mut env = env(&["S.", "##"]);
        assert!(env.step(4).is_err());
    }

    #[test]
    fn test_factory() {
        let factory = SimFactory::default();
        let env = factory.create("pits").unwrap();
        let observation = env.observe();
        assert_eq!(observation.sensors.len(), factory.input_width());
        assert_eq!((observation.x, observation.y), (32.0, 176.0));
        assert!(factory.create("castle").is_err());
    }
}
