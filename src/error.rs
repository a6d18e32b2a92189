use std::io;
use std::path::PathBuf;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("command {name} failed: {source}")]
    Spawn { name: String, source: io::Error },

    #[error("command {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("could not read output of command {name}: {source}")]
    Output { name: String, source: io::Error },

    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("unexpected value {value:?} in {path}")]
    Parse { path: PathBuf, value: String },

    #[error("bad pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("error setting Ctrl-C handler: {0}")]
    Signal(#[from] ctrlc::Error),
}
