use thiserror::Error;

#[derive(Error, Debug)]
pub enum DuplexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Batch of {requested} tasks exceeds the maximum of {max}")]
    BatchTooLarge { requested: usize, max: usize },

    #[error("Total batch duration overflows: {0}")]
    DurationOverflow(String),

    #[error("Failed to spawn task thread: {0}")]
    Spawn(String),

    #[error("Task thread panicked: {0}")]
    TaskPanicked(String),
}

pub type Result<T> = std::result::Result<T, DuplexError>;
