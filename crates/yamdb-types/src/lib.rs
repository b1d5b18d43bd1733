pub mod claim;
pub mod config;
pub mod error;
pub mod general;
pub mod policy;

pub use error::ValidationError;
