pub mod code;
pub mod error;
pub mod token;

pub use error::{Error, Result};
