//! Task store implementations
//!
//! - `InMemoryTaskStore`: process-local, for tests and embedding
//! - `FileTaskStore`: one directory per task, survives restarts

pub mod file;
pub mod memory;

pub use file::FileTaskStore;
pub use memory::InMemoryTaskStore;
