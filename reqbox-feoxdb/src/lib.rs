#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod backend;
mod error;

pub use backend::{FeOxDbCache, FeOxDbCacheBuilder};
pub use error::FeOxDbError;
