use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("no baseline snapshot available for incremental/differential backup")]
    NoBaseline,

    #[error("snapshot metadata corrupt: {0}")]
    MetadataCorrupt(String),

    #[error("chunk missing from store: {0}")]
    ChunkMissing(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("size mismatch: expected {expected} bytes, got {got}")]
    SizeMismatch { expected: u64, got: u64 },

    #[error("integrity mismatch restoring {path}")]
    IntegrityMismatch { path: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
