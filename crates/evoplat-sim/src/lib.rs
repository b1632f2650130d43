//! A small side-scrolling platformer for training and replaying agents.
//!
//! The simulator stands in for a console emulator. It is deterministic: the
//! same course and the same action sequence always produce the same episode,
//! so an agent's score depends on its network alone.
//!
//! - [`Course`] - Tile map of a level ([`Tile`] cells, start position)
//! - [`Level`] - Built-in courses, selected by name
//! - [`Action`] - The four moves available to an agent
//! - [`SimEnvironment`] - Physics and scoring; implements
//!   [`Environment`](evoplat_training::episode::Environment)
//! - [`SimFactory`] - Creates environments by level name
//!
//! # Coordinates
//!
//! Positions are in pixels with tiles of [`TILE_SIZE`] pixels. `x` grows to
//! the right and `y` grows downwards; the agent's position is the top-left
//! corner of its one-tile body.
//!
//! # Sensors
//!
//! An observation is a `(2r + 1) x (2r + 1)` window of tiles centered on the
//! agent, flattened row by row: `1` for solid ground, `-1` for hazards and `0`
//! for anything else. See [`sensors`].

pub use self::{action::*, course::*, level::*, world::*};

mod action;
mod course;
mod level;
pub mod sensors;
mod world;

/// Edge length of a tile in pixels.
pub const TILE_SIZE: f64 = 16.0;

/// Default sensor radius; gives `13 x 13 = 169` inputs.
pub const SENSOR_RADIUS: usize = 6;
