pub mod memory;

pub use memory::InMemorySectionStore;
