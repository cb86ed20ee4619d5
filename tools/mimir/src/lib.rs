pub mod cli;
pub mod error;
pub mod ground_truth;

pub use error::{Error, Result};
