#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod chunking;
mod store;

pub use chunking::{CHARS_PER_TOKEN, estimate_tokens, split_chunks};
pub use store::ContentStore;

#[cfg(test)]
use async_trait as _;
