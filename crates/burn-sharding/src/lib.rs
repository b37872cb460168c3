#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Burn sharding propagation schemas.
//!
//! Describes, for an operator running over a device mesh, which placements of its inputs
//! and outputs are valid, and gives each call a hashable identity so sharding decisions
//! can be reused across structurally identical calls.

extern crate alloc;

mod cache;
mod error;
mod tensor;

pub mod schema;
pub mod sharding;
pub mod strategy;

pub use cache::*;
pub use error::*;
pub use tensor::*;
