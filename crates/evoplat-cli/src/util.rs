use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use evoplat_training::{Agent, config::TrainingConfig, record};

/// Destination of a JSON report: a file, or stdout when no path is given.
pub enum Output {
    Stdout,
    File(PathBuf),
}

impl Output {
    /// Writes `value` as pretty-printed JSON followed by a newline.
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let output = output_path.map_or(Output::Stdout, Output::File);
        match &output {
            Output::Stdout => output.write_json(&mut io::stdout().lock(), value),
            Output::File(path) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create output file: {}", path.display()))?;
                output.write_json(&mut BufWriter::new(file), value)
            }
        }
    }

    fn write_json<W, T>(&self, writer: &mut W, value: &T) -> anyhow::Result<()>
    where
        W: Write,
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut *writer, value)
            .and_then(|()| writeln!(writer).map_err(serde_json::Error::io))
            .with_context(|| format!("Failed to write JSON to {self}"))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush output to {self}"))
    }
}

impl std::fmt::Display for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Output::Stdout => f.write_str("stdout"),
            Output::File(path) => write!(f, "{}", path.display()),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {file_kind} file: {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {file_kind} JSON file: {}", path.display()))
}

/// Reads a training configuration, or the defaults when no file is given.
pub fn read_config_file(path: Option<&Path>) -> anyhow::Result<TrainingConfig> {
    match path {
        Some(path) => read_json_file("training config", path),
        None => Ok(TrainingConfig::default()),
    }
}

/// Reads an agent record, failing if it is missing or corrupt.
pub fn read_agent_file<P>(path: P) -> anyhow::Result<Agent>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let bytes = fs::read(path)
        .with_context(|| format!("Failed to read agent file: {}", path.display()))?;
    record::decode(&bytes)
        .with_context(|| format!("Failed to decode agent file: {}", path.display()))
}
