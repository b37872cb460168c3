//! Device meshes and tensor placements.

mod mesh;
mod spec;

pub use mesh::*;
pub use spec::*;
