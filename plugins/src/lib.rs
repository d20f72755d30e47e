pub mod executor;
pub mod factory;
pub mod generation;
pub mod store;
pub mod trace_out;
