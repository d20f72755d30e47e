//! quill-cli library, exposed so command handlers can be unit tested.

pub mod commands;
pub mod error;
pub mod graph_file;
