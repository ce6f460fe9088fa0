//! An in-memory filesystem that plugs into the engine resolver as a custom backend.

mod engine;
mod memory_fs;
mod node;

pub use engine::{MemoryEngine, MemoryHandler, MemoryIterator};
pub use memory_fs::MemoryFs;
pub use node::{Node, NodeType};
