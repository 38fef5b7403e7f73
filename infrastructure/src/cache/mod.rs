//! Collaboration result cache backends

mod memory;

pub use memory::MemoryCache;
