pub mod artifact;
pub mod collaborator;
pub mod config;
pub mod error;
mod finite;
pub mod io;
pub mod measure;
pub mod mining;
pub mod paths;
pub mod probe;
pub mod router;
pub mod session;
pub mod workflow;

pub use error::{Result, SeedError};
