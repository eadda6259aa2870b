pub mod annotate;
pub mod batch;
pub mod cli;
pub mod config;
pub mod errors;
pub mod model;
pub mod types;
pub mod util;
