mod error;
pub mod utils;

pub use error::{EngineResult, ErrorState, FileError, FileErrorKind};

pub type Result<T> = std::result::Result<T, anyhow::Error>;
