mod macros;
mod paging;

pub mod category;
pub mod comment;
pub mod genre;
pub mod review;
pub mod title;

pub use paging::{Page, Paging, SearchQuery};
