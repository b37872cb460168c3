use alloc::{string::String, sync::Arc, vec::Vec};
use core::{
    fmt,
    hash::{Hash, Hasher},
};

use super::DeviceMesh;
use crate::tensor::TensorMeta;

/// Reduction pending on a partial placement.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum ReduceOp {
    /// Element-wise sum across the mesh dimension.
    #[default]
    Sum,
    /// Element-wise average across the mesh dimension.
    Avg,
    /// Element-wise maximum across the mesh dimension.
    Max,
    /// Element-wise minimum across the mesh dimension.
    Min,
}

/// Specifies how a tensor is distributed along a single mesh dimension.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Placement {
    /// The tensor dimension at this index is split across the mesh dimension.
    Shard(usize),
    /// Every device of the mesh dimension holds the full tensor.
    Replicate,
    /// Every device holds a partial value, pending a reduction.
    Partial(ReduceOp),
}

impl Placement {
    /// Whether this placement shards a tensor dimension.
    pub fn is_shard(&self) -> bool {
        matches!(self, Placement::Shard(_))
    }

    /// The sharded tensor dimension, if any.
    pub fn shard_dim(&self) -> Option<usize> {
        match self {
            Placement::Shard(dim) => Some(*dim),
            _ => None,
        }
    }

    /// Whether this placement carries a pending reduction.
    pub fn is_partial(&self) -> bool {
        matches!(self, Placement::Partial(_))
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::Shard(dim) => write!(f, "S({dim})"),
            Placement::Replicate => f.write_str("R"),
            Placement::Partial(_) => f.write_str("P"),
        }
    }
}

/// Describes how a tensor is distributed across the devices of a mesh.
///
/// A spec holds one [`Placement`] per mesh dimension and, once known, the global tensor
/// metadata. Two specs are equal when mesh, placements and metadata are all equal. The
/// mesh is shared, so cloning a spec is cheap and specs on the same shared mesh compare
/// without walking its devices.
#[derive(Clone, Debug)]
pub struct PlacementSpec<T> {
    /// Mesh the tensor is distributed over.
    mesh: Arc<DeviceMesh<T>>,
    /// Placement for each mesh dimension.
    placements: Vec<Placement>,
    /// Global shape, stride and dtype of the tensor.
    tensor_meta: Option<TensorMeta>,
}

impl<T: PartialEq> PartialEq for PlacementSpec<T> {
    fn eq(&self, other: &Self) -> bool {
        self.placements == other.placements
            && self.tensor_meta == other.tensor_meta
            && (Arc::ptr_eq(&self.mesh, &other.mesh) || self.mesh == other.mesh)
    }
}

impl<T: Eq> Eq for PlacementSpec<T> {}

impl<T> Hash for PlacementSpec<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mesh.hash(state);
        self.placements.hash(state);
        self.tensor_meta.hash(state);
    }
}

impl<T> PlacementSpec<T> {
    /// Creates a new spec without tensor metadata.
    ///
    /// # Panics
    ///
    /// If the number of placements differs from the number of mesh dimensions.
    pub fn new<P: Into<Vec<Placement>>>(mesh: Arc<DeviceMesh<T>>, placements: P) -> Self {
        let placements = placements.into();
        assert_eq!(
            placements.len(),
            mesh.ndim(),
            "Expected one placement per mesh dimension"
        );

        Self {
            mesh,
            placements,
            tensor_meta: None,
        }
    }

    /// Creates a spec where every mesh dimension replicates the tensor.
    pub fn replicated(mesh: Arc<DeviceMesh<T>>) -> Self {
        let placements = alloc::vec![Placement::Replicate; mesh.ndim()];
        Self::new(mesh, placements)
    }

    /// Attaches the global tensor metadata.
    pub fn with_tensor_meta(mut self, tensor_meta: TensorMeta) -> Self {
        self.tensor_meta = Some(tensor_meta);
        self
    }

    /// Mesh the tensor is distributed over.
    pub fn mesh(&self) -> &Arc<DeviceMesh<T>> {
        &self.mesh
    }

    /// Placement for each mesh dimension.
    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Global tensor metadata, if known.
    pub fn tensor_meta(&self) -> Option<&TensorMeta> {
        self.tensor_meta.as_ref()
    }

    /// Global tensor shape, if the metadata is known.
    pub fn shape(&self) -> Option<&[usize]> {
        self.tensor_meta.as_ref().map(|meta| meta.shape.as_slice())
    }

    /// Global tensor rank, if the metadata is known.
    pub fn ndim(&self) -> Option<usize> {
        self.tensor_meta.as_ref().map(TensorMeta::ndim)
    }

    /// Number of shards the tensor is split into.
    ///
    /// This is the product of the sizes of every mesh dimension with a [`Placement::Shard`].
    pub fn num_shards(&self) -> usize {
        self.placements
            .iter()
            .enumerate()
            .filter(|(_, placement)| placement.is_shard())
            .map(|(mesh_dim, _)| self.mesh.size_of(mesh_dim))
            .product()
    }

    /// Whether every mesh dimension replicates the tensor.
    pub fn is_replicated(&self) -> bool {
        self.placements.iter().all(|p| *p == Placement::Replicate)
    }

    /// Whether at least one mesh dimension shards the tensor.
    pub fn is_sharded(&self) -> bool {
        self.placements.iter().any(Placement::is_shard)
    }

    /// Mesh dimensions sharding each tensor dimension, `None` for unsharded ones.
    ///
    /// Returns `None` when the tensor metadata is unknown, or when a placement shards a
    /// dimension the tensor does not have.
    pub fn dim_map(&self) -> Option<Vec<Option<usize>>> {
        let ndim = self.ndim()?;
        let mut map = alloc::vec![None; ndim];
        for (mesh_dim, placement) in self.placements.iter().enumerate() {
            if let Some(dim) = placement.shard_dim() {
                *map.get_mut(dim)? = Some(mesh_dim);
            }
        }
        Some(map)
    }
}

/// Renders placements as a compact string, such as `S(0)R`.
pub fn pretty_print_placements(placements: &[Placement]) -> String {
    use core::fmt::Write;

    let mut out = String::new();
    for placement in placements {
        // Writing to a `String` cannot fail.
        let _ = write!(out, "{placement}");
    }
    out
}

impl<T> fmt::Display for PlacementSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Spec({}", pretty_print_placements(&self.placements))?;
        if let Some(shape) = self.shape() {
            write!(f, " on {shape:?}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharding::{DeviceMeshBuilder, MeshDim};
    use alloc::vec;
    use burn_tensor::DType;

    fn mesh_2x4() -> Arc<DeviceMesh<usize>> {
        Arc::new(
            DeviceMeshBuilder::new((0..8).collect(), [2, 4])
                .with_dim(0, MeshDim::new("dp"))
                .with_dim(1, MeshDim::new("tp"))
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn num_shards_multiplies_sharded_mesh_dims() {
        let mesh = mesh_2x4();

        let both = PlacementSpec::new(mesh.clone(), [Placement::Shard(0), Placement::Shard(1)]);
        let tp = PlacementSpec::new(mesh.clone(), [Placement::Replicate, Placement::Shard(0)]);
        let partial = PlacementSpec::new(
            mesh.clone(),
            [Placement::Partial(ReduceOp::Sum), Placement::Replicate],
        );

        assert_eq!(both.num_shards(), 8);
        assert_eq!(tp.num_shards(), 4);
        assert_eq!(partial.num_shards(), 1);
        assert_eq!(PlacementSpec::replicated(mesh).num_shards(), 1);
    }

    #[test]
    fn shape_comes_from_tensor_meta() {
        let spec = PlacementSpec::replicated(mesh_2x4());
        assert_eq!(spec.shape(), None);
        assert_eq!(spec.ndim(), None);

        let spec = spec.with_tensor_meta(TensorMeta::contiguous([4, 8], DType::F32));
        assert_eq!(spec.shape(), Some(&[4, 8][..]));
        assert_eq!(spec.ndim(), Some(2));
    }

    #[test]
    fn dim_map_points_tensor_dims_to_mesh_dims() {
        let spec = PlacementSpec::new(mesh_2x4(), [Placement::Replicate, Placement::Shard(1)])
            .with_tensor_meta(TensorMeta::contiguous([4, 8, 2], DType::F32));

        assert_eq!(spec.dim_map(), Some(vec![None, Some(1), None]));
    }

    #[test]
    fn dim_map_rejects_out_of_range_shard_dims() {
        let spec = PlacementSpec::new(mesh_2x4(), [Placement::Shard(2), Placement::Replicate])
            .with_tensor_meta(TensorMeta::contiguous([4, 8], DType::F32));

        assert_eq!(spec.dim_map(), None);
        assert_eq!(PlacementSpec::replicated(mesh_2x4()).dim_map(), None);
    }

    #[test]
    fn specs_on_separately_built_meshes_match() {
        use core::hash::BuildHasher;

        let hasher = hashbrown::DefaultHashBuilder::default();
        let a = PlacementSpec::new(mesh_2x4(), [Placement::Shard(0), Placement::Replicate]);
        let b = PlacementSpec::new(mesh_2x4(), [Placement::Shard(0), Placement::Replicate]);

        assert!(!Arc::ptr_eq(a.mesh(), b.mesh()));
        assert_eq!(a, b);
        assert_eq!(hasher.hash_one(&a), hasher.hash_one(&b));
    }

    #[test]
    fn specs_compare_every_field() {
        let mesh = mesh_2x4();
        let meta = TensorMeta::contiguous([4, 8], DType::F32);
        let spec = PlacementSpec::new(mesh.clone(), [Placement::Shard(0), Placement::Replicate])
            .with_tensor_meta(meta.clone());

        assert_eq!(spec, spec.clone());
        assert_ne!(
            spec,
            PlacementSpec::new(mesh.clone(), [Placement::Shard(1), Placement::Replicate])
                .with_tensor_meta(meta)
        );
        assert_ne!(
            spec,
            PlacementSpec::new(mesh, [Placement::Shard(0), Placement::Replicate])
        );
    }

    #[test]
    fn placements_render_short_symbols() {
        let placements = [
            Placement::Shard(0),
            Placement::Replicate,
            Placement::Partial(ReduceOp::Max),
        ];

        assert_eq!(pretty_print_placements(&placements), "S(0)RP");
    }

    #[test]
    #[should_panic = "Expected one placement per mesh dimension"]
    fn placements_should_match_mesh_rank() {
        let _spec = PlacementSpec::new(mesh_2x4(), [Placement::Replicate]);
    }
}
