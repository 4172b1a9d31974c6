use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config Error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[cfg(feature = "opencv")]
    #[error("OpenCv Error: {0}")]
    OpenCv(#[from] opencv::Error),

    #[error("Malformed detections line {line}: {reason}")]
    Format { line: usize, reason: String },
}
