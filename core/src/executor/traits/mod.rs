pub mod strategy;

pub use strategy::*;
