pub mod channel;
pub mod config;
pub mod conflation;
pub mod cross_section;
pub mod error;
pub mod geometry;
pub mod hydro;
pub mod io;
pub mod mesh;
pub mod network;
pub mod pipeline;
pub mod scenario;

pub use error::{Result, ScenarioError};
