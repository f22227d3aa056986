//! UTM link management client library
//!
//! This library generates UTM-tagged marketing links, keeps them in a remote
//! history, manages reusable templates, and renders searchable, sortable
//! views of both collections in the terminal.

mod cli;
mod config;
mod controller;
mod csv_codec;
mod dates;
mod errors;
mod filter;
mod gateway;
mod generator;
mod helper;
mod preferences;
mod record;
mod render;
mod shortener;
mod tags;
pub mod transfer;
mod types;
mod view_state;

// Re-export key components
pub use cli::*;
pub use config::*;
pub use controller::*;
pub use csv_codec::*;
pub use dates::*;
pub use errors::*;
pub use filter::*;
pub use gateway::*;
pub use generator::*;
pub use helper::*;
pub use preferences::*;
pub use record::*;
pub use render::*;
pub use shortener::*;
pub use tags::*;
pub use transfer::{Collection, ExportOutcome, EXAMPLE_FILES};
pub use types::*;
pub use view_state::*;
