use alloc::{format, string::String, vec::Vec};
use core::hash::{Hash, Hasher};
use hashbrown::{HashMap, HashSet};

/// Represents a logical mesh dimension, identified by a unique name.
///
/// Mesh dimensions are used to define the logical structure of a device mesh.
/// They help organize and partition parallel computation workloads, such as data,
/// tensor, or pipeline parallelism, across the mesh. Each dimension is named
/// to provide unambiguous mapping during sharding operations.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct MeshDim {
    /// A name that uniquely identifies the mesh dimension.
    name: String,
}

impl MeshDim {
    /// Constructs a new [`MeshDim`] with the given name.
    pub fn new<S: Into<String>>(name: S) -> Self {
        MeshDim { name: name.into() }
    }

    /// The name of the mesh dimension.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Represents a logical arrangement of devices used for parallel computation.
///
/// A `DeviceMesh` defines a structured, N-dimensional topology over a set of physical devices,
/// where each dimension is given a unique name (e.g., `"dp"`, `"tp"`). Placements refer to
/// mesh dimensions by index, so the mesh keeps its dimension names in index order.
///
/// For example, a 2D mesh with shape `[2, 4]` and dimensions `["dp", "tp"]` represents
/// a logical grid of devices for 2-way data parallelism and 4-way tensor parallelism.
///
/// Two meshes are equal when they hold the same devices in the same arrangement with
/// the same dimension names, which makes the mesh usable as part of a sharding cache key.
/// Hashing only covers the layout, so hashing a large mesh does not walk its devices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceMesh<T> {
    /// Physical devices in an n-dimensional logical arrangement (row-major).
    devices: Vec<T>,
    /// Shape of the logical mesh.
    shape: Vec<usize>,
    /// Dimension names, indexed by mesh dimension.
    dims: Vec<MeshDim>,
}

impl<T> DeviceMesh<T> {
    /// Shape of the logical mesh.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of mesh dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of devices in the mesh.
    pub fn size(&self) -> usize {
        self.devices.len()
    }

    /// Number of devices along the given mesh dimension.
    ///
    /// # Panics
    ///
    /// If `mesh_dim` is not a valid mesh dimension index.
    pub fn size_of(&self, mesh_dim: usize) -> usize {
        self.shape[mesh_dim]
    }

    /// Devices of the mesh, in row-major order.
    pub fn devices(&self) -> &[T] {
        &self.devices
    }

    /// Dimension names, in mesh dimension order.
    pub fn dim_names(&self) -> &[MeshDim] {
        &self.dims
    }

    /// Index of the given named dimension, if it is part of this mesh.
    pub fn dim_index(&self, dim: &MeshDim) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }
}

// Equal meshes have equal layouts, so leaving the devices out keeps `Hash` consistent with `Eq`.
impl<T> Hash for DeviceMesh<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shape.hash(state);
        self.dims.hash(state);
    }
}

/// Represents errors that can occur when constructing a `DeviceMesh`.
///
/// These errors are typically related to invalid dimension mappings or mismatches
/// between the device count and the mesh shape.
#[derive(Debug, thiserror::Error)]
pub enum DeviceMeshError {
    /// An invalid dimension was specified.
    #[error("invalid mesh dimension: {0}")]
    InvalidDimension(String),
    /// The mesh configuration is invalid.
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
}

/// A builder for constructing a [`DeviceMesh`].
///
/// This builder allows you to define a logical mesh structure with a shape and
/// specific dimension mappings. Once all dimensions are mapped, the builder can
/// be used to construct the [`DeviceMesh`] instance.
#[derive(Clone, Debug)]
pub struct DeviceMeshBuilder<T> {
    /// Physical devices in an n-dimensional logical arrangement.
    devices: Vec<T>,
    /// Shape of the logical mesh.
    shape: Vec<usize>,
    /// Maps dimension names to their indices in the mesh.
    dims: HashMap<MeshDim, usize>,
}

impl<T> DeviceMeshBuilder<T> {
    /// Creates a new [`DeviceMeshBuilder`] with the given devices and shape.
    ///
    /// # Arguments
    /// * `devices` - A vector of devices to be arranged in the mesh.
    /// * `shape` - A vector representing the shape (dimensions) of the mesh.
    pub fn new<S: Into<Vec<usize>>>(devices: Vec<T>, shape: S) -> Self {
        Self {
            devices,
            shape: shape.into(),
            dims: HashMap::new(),
        }
    }

    /// Adds a dimension to the logical mesh, associating it with a specific index.
    ///
    /// Each dimension represents a logical axis of parallelism and must correspond to a
    /// unique index in the shape of the mesh. Validation happens in [`build`](Self::build).
    ///
    /// # Example
    ///
    /// ```rust
    /// use burn_sharding::sharding::{DeviceMeshBuilder, MeshDim};
    ///
    /// let mesh = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [2, 2])
    ///     .with_dim(0, MeshDim::new("dp"))
    ///     .with_dim(1, MeshDim::new("tp"))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(mesh.dim_index(&MeshDim::new("tp")), Some(1));
    /// ```
    pub fn with_dim(mut self, idx: usize, dim: MeshDim) -> Self {
        self.dims.insert(dim, idx);
        self
    }

    /// Builds a [`DeviceMesh`] from the current configuration.
    ///
    /// This method performs validation to ensure that all dimensions are correctly
    /// mapped and that the number of devices matches the expected shape.
    pub fn build(self) -> Result<DeviceMesh<T>, DeviceMeshError> {
        let ndim = self.shape.len();
        let mut seen_indices = HashSet::new();

        for &idx in self.dims.values() {
            if idx >= ndim {
                return Err(DeviceMeshError::InvalidDimension(format!(
                    "Index {} exceeds mesh shape {:?}",
                    idx, self.shape
                )));
            }
            if !seen_indices.insert(idx) {
                return Err(DeviceMeshError::InvalidDimension(format!(
                    "Dimension {} already mapped",
                    idx
                )));
            }
        }

        if seen_indices.len() != ndim {
            return Err(DeviceMeshError::InvalidMesh(format!(
                "Not all mesh dimensions are mapped. Got {}, expected {}",
                seen_indices.len(),
                ndim
            )));
        }

        let expected_devices = self.shape.iter().product::<usize>();
        if self.devices.len() != expected_devices {
            return Err(DeviceMeshError::InvalidMesh(format!(
                "Device count ({}) doesn't match mesh shape {:?}",
                self.devices.len(),
                self.shape,
            )));
        }

        let mut dims: Vec<(usize, MeshDim)> =
            self.dims.into_iter().map(|(dim, idx)| (idx, dim)).collect();
        dims.sort_by_key(|(idx, _)| *idx);

        Ok(DeviceMesh {
            devices: self.devices,
            shape: self.shape,
            dims: dims.into_iter().map(|(_, dim)| dim).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use core::hash::BuildHasher;
    use hashbrown::DefaultHashBuilder;

    fn mesh_2x2() -> DeviceMesh<usize> {
        DeviceMeshBuilder::new(vec![0, 1, 2, 3], [2, 2])
            .with_dim(1, MeshDim::new("y"))
            .with_dim(0, MeshDim::new("x"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_device_mesh_2x2() {
        let mesh = mesh_2x2();

        assert_eq!(mesh.shape(), &[2, 2]);
        assert_eq!(mesh.ndim(), 2);
        assert_eq!(mesh.size(), 4);
        assert_eq!(mesh.size_of(1), 2);
    }

    #[test]
    fn test_device_mesh_dims_are_index_ordered() {
        let mesh = mesh_2x2();

        assert_eq!(mesh.dim_names(), &[MeshDim::new("x"), MeshDim::new("y")]);
        assert_eq!(mesh.dim_index(&MeshDim::new("y")), Some(1));
        assert_eq!(mesh.dim_index(&MeshDim::new("z")), None);
    }

    #[test]
    fn test_device_mesh_equality_ignores_builder_order() {
        let other = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [2, 2])
            .with_dim(0, MeshDim::new("x"))
            .with_dim(1, MeshDim::new("y"))
            .build()
            .unwrap();

        assert_eq!(mesh_2x2(), other);
    }

    #[test]
    fn test_device_mesh_hash_follows_layout() {
        let hasher = DefaultHashBuilder::default();
        let reversed = DeviceMeshBuilder::new(vec![3, 2, 1, 0], [2, 2])
            .with_dim(0, MeshDim::new("x"))
            .with_dim(1, MeshDim::new("y"))
            .build()
            .unwrap();

        assert_eq!(hasher.hash_one(mesh_2x2()), hasher.hash_one(mesh_2x2()));
        assert_eq!(hasher.hash_one(mesh_2x2()), hasher.hash_one(&reversed));
        assert_ne!(mesh_2x2(), reversed);
    }

    #[test]
    #[should_panic = "InvalidDimension(\"Index 2 exceeds mesh shape [2, 2]\")"]
    fn test_device_mesh_dim_should_be_in_bound() {
        let _mesh = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [2, 2])
            .with_dim(0, MeshDim::new("x"))
            .with_dim(2, MeshDim::new("y")) // out of bounds
            .build()
            .unwrap();
    }

    #[test]
    #[should_panic = "InvalidDimension(\"Dimension 0 already mapped\")"]
    fn test_device_mesh_dim_should_be_unique() {
        let _mesh = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [2, 2])
            .with_dim(0, MeshDim::new("x"))
            .with_dim(0, MeshDim::new("y")) // already mapped
            .build()
            .unwrap();
    }

    #[test]
    #[should_panic = "InvalidMesh(\"Not all mesh dimensions are mapped."]
    fn test_device_mesh_dim_name_should_be_unique() {
        let _mesh = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [2, 2])
            .with_dim(0, MeshDim::new("x"))
            .with_dim(1, MeshDim::new("x")) // same name is invalid
            .build()
            .unwrap();
    }

    #[test]
    #[should_panic = "InvalidMesh(\"Device count (4) doesn't match mesh shape [3, 2]"]
    fn test_device_mesh_devices_should_match_shape() {
        let _mesh = DeviceMeshBuilder::new(vec![0, 1, 2, 3], [3, 2])
            .with_dim(0, MeshDim::new("x"))
            .with_dim(1, MeshDim::new("y"))
            .build()
            .unwrap();
    }
}
