//! Persistence of a single [`Agent`].
//!
//! # Record Format
//!
//! An agent is stored as one little-endian binary record so that any language
//! can read it back:
//!
//! ```text
//! magic            4 bytes  "EVPA"
//! version          u16      1
//! activation       u8       0 = sigmoid, 1 = tanh
//! layer count      u32      n
//! layer widths     u32 × n
//! weights          f64 × Σ (w[i] + 1) · w[i+1], matrix by matrix, row-major
//! generation       u32
//! fitness          f64
//! points           f64
//! score            f64
//! current x, y     f64 × 2
//! previous x, y    f64 × 2
//! max progress     f64
//! stalled counter  i32
//! stalled          u8       0 or 1
//! ```
//!
//! Trailing bytes after the last field make a record invalid.
//!
//! # Storage
//!
//! [`AgentStore`] keeps the best agent of a training run in one file. Saving
//! writes a sibling temporary file and renames it over the target, so an
//! interrupted save leaves the previous record intact. Loading never fails:
//! a missing or unreadable record is reported as `None`.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use evoplat_network::{Activation, Network, NetworkError};
use ndarray::Array2;

use crate::agent::{Agent, Position};

const MAGIC: [u8; 4] = *b"EVPA";
const VERSION: u16 = 1;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum RecordError {
    #[display("not an agent record")]
    BadMagic,
    #[display("unsupported record version {version}")]
    UnsupportedVersion { version: u16 },
    #[display("record ends before field `{field}`")]
    Truncated { field: &'static str },
    #[display("unknown activation code {code}")]
    UnknownActivation { code: u8 },
    #[display("invalid stalled flag {value}")]
    InvalidFlag { value: u8 },
    #[display("record has {count} unexpected trailing bytes")]
    TrailingBytes { count: usize },
    #[display("record holds an invalid network")]
    Network { source: NetworkError },
}

impl From<NetworkError> for RecordError {
    fn from(source: NetworkError) -> Self {
        Self::Network { source }
    }
}

/// Serializes an agent into a record.
#[must_use]
pub fn encode(agent: &Agent) -> Vec<u8> {
    let network = agent.network();
    let mut buf = Vec::with_capacity(64 + network.weight_count() * 8);

    buf.extend_from_slice(&MAGIC);
    buf.extend_from_slice(&VERSION.to_le_bytes());
    buf.push(activation_code(network.activation()));
    put_u32(&mut buf, network.shape().len());
    for &width in network.shape() {
        put_u32(&mut buf, width);
    }
    for w in network.weights() {
        for value in w {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }

    buf.extend_from_slice(&agent.generation.to_le_bytes());
    for value in [
        agent.fitness,
        agent.points,
        agent.score,
        agent.current_position.x,
        agent.current_position.y,
        agent.previous_position.x,
        agent.previous_position.y,
        agent.max_progress,
    ] {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf.extend_from_slice(&agent.stalled_counter.to_le_bytes());
    buf.push(u8::from(agent.stalled));
    buf
}

/// Deserializes a record produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<Agent, RecordError> {
    let mut reader = Reader { bytes };

    if reader.take("magic", MAGIC.len())? != MAGIC {
        return Err(RecordError::BadMagic);
    }
    let version = reader.u16("version")?;
    if version != VERSION {
        return Err(RecordError::UnsupportedVersion { version });
    }
    let code = reader.u8("activation")?;
    let activation = *Activation::ALL
        .get(usize::from(code))
        .ok_or(RecordError::UnknownActivation { code })?;

    let layer_count = reader.len("layer count", 4)?;
    let shape = (0..layer_count)
        .map(|_| reader.u32("layer width").map(|w| w as usize))
        .collect::<Result<Vec<_>, _>>()?;

    let mut matrices = Vec::with_capacity(shape.len().saturating_sub(1));
    for pair in shape.windows(2) {
        let rows = pair[0].saturating_add(1);
        let cols = pair[1];
        let count = rows.checked_mul(cols).ok_or(RecordError::Truncated { field: "weights" })?;
        if count.saturating_mul(8) > reader.bytes.len() {
            return Err(RecordError::Truncated { field: "weights" });
        }
        let values = (0..count)
            .map(|_| reader.f64("weights"))
            .collect::<Result<Vec<_>, _>>()?;
        let matrix = Array2::from_shape_vec((rows, cols), values)
            .map_err(|_| RecordError::Truncated { field: "weights" })?;
        matrices.push(matrix);
    }
    let network = Network::from_weights(activation, shape, matrices)?;

    let generation = reader.u32("generation")?;
    let fitness = reader.f64("fitness")?;
    let points = reader.f64("points")?;
    let score = reader.f64("score")?;
    let current_position = Position::new(reader.f64("current x")?, reader.f64("current y")?);
    let previous_position = Position::new(reader.f64("previous x")?, reader.f64("previous y")?);
    let max_progress = reader.f64("max progress")?;
    let stalled_counter = reader.i32("stalled counter")?;
    let stalled = match reader.u8("stalled")? {
        0 => false,
        1 => true,
        value => return Err(RecordError::InvalidFlag { value }),
    };
    if !reader.bytes.is_empty() {
        return Err(RecordError::TrailingBytes {
            count: reader.bytes.len(),
        });
    }

    Ok(Agent {
        network,
        generation,
        fitness,
        points,
        score,
        current_position,
        previous_position,
        max_progress,
        stalled_counter,
        stalled,
    })
}

/// Index of `activation` in [`Activation::ALL`].
fn activation_code(activation: Activation) -> u8 {
    Activation::ALL
        .iter()
        .position(|&kind| kind == activation)
        .and_then(|index| u8::try_from(index).ok())
        .unwrap_or(u8::MAX)
}

fn put_u32(buf: &mut Vec<u8>, value: usize) {
    // Layer widths and counts beyond u32 cannot be allocated anyway.
    let value = u32::try_from(value).unwrap_or(u32::MAX);
    buf.extend_from_slice(&value.to_le_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, field: &'static str, n: usize) -> Result<&'a [u8], RecordError> {
        if self.bytes.len() < n {
            return Err(RecordError::Truncated { field });
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], RecordError> {
        let mut out = [0; N];
        out.copy_from_slice(self.take(field, N)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, RecordError> {
        Ok(self.array::<1>(field)?[0])
    }

    fn u16(&mut self, field: &'static str) -> Result<u16, RecordError> {
        self.array(field).map(u16::from_le_bytes)
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, RecordError> {
        self.array(field).map(u32::from_le_bytes)
    }

    fn i32(&mut self, field: &'static str) -> Result<i32, RecordError> {
        self.array(field).map(i32::from_le_bytes)
    }

    fn f64(&mut self, field: &'static str) -> Result<f64, RecordError> {
        self.array(field).map(f64::from_le_bytes)
    }

    /// Reads a count and checks that `count * item_size` bytes remain.
    fn len(&mut self, field: &'static str, item_size: usize) -> Result<usize, RecordError> {
        let count = self.u32(field)? as usize;
        if count.saturating_mul(item_size) > self.bytes.len() {
            return Err(RecordError::Truncated { field });
        }
        Ok(count)
    }
}

/// File-backed storage for the best agent of a training run.
#[derive(Debug, Clone)]
pub struct AgentStore {
    path: PathBuf,
}

impl AgentStore {
    pub fn new<P>(path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replaces the stored record with `agent`.
    pub fn save(&self, agent: &Agent) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = temp_path(&self.path);
        fs::write(&tmp, encode(agent))?;
        fs::rename(&tmp, &self.path)
    }

    /// Loads the stored agent, or `None` if there is no usable record.
    #[must_use]
    pub fn load(&self) -> Option<Agent> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no stored agent");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read stored agent");
                return None;
            }
        };
        match decode(&bytes) {
            Ok(agent) => Some(agent),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt agent record");
                None
            }
        }
    }
}

/// Sibling of `path` with `.tmp` appended to the full file name.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
