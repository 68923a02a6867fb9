#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

mod backend;
mod builder;

pub use backend::MokaCache;
pub use builder::MokaCacheBuilder;
pub use moka::policy::EvictionPolicy;
