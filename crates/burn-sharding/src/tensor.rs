use alloc::vec::Vec;
use core::hash::{Hash, Hasher};

use burn_tensor::{DType, Shape};

/// Global shape, stride and data type of a distributed tensor.
///
/// The metadata describes the logical (unsharded) tensor, not any local shard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorMeta {
    /// Size of each tensor dimension.
    pub shape: Vec<usize>,
    /// Number of elements to skip to advance one step along each dimension.
    pub stride: Vec<usize>,
    /// Element data type.
    pub dtype: DType,
}

impl TensorMeta {
    /// Creates tensor metadata from explicit shape and stride.
    pub fn new<S: Into<Vec<usize>>, R: Into<Vec<usize>>>(shape: S, stride: R, dtype: DType) -> Self {
        Self {
            shape: shape.into(),
            stride: stride.into(),
            dtype,
        }
    }

    /// Creates metadata for a row-major contiguous tensor of the given shape.
    pub fn contiguous<S: Into<Vec<usize>>>(shape: S, dtype: DType) -> Self {
        let shape = shape.into();
        let stride = contiguous_stride(&shape);

        Self {
            shape,
            stride,
            dtype,
        }
    }

    /// Number of tensor dimensions.
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

// `DType` only promises equality, so its variant stands in for it in the hash.
impl Hash for TensorMeta {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shape.hash(state);
        self.stride.hash(state);
        core::mem::discriminant(&self.dtype).hash(state);
    }
}

fn contiguous_stride(shape: &[usize]) -> Vec<usize> {
    let mut stride = alloc::vec![1; shape.len()];
    for i in (0..shape.len().saturating_sub(1)).rev() {
        stride[i] = stride[i + 1] * shape[i + 1].max(1);
    }
    stride
}

/// An uninitialized tensor value that only carries metadata.
///
/// Fake tensors stand in for the real inputs of an operator when a propagation rule needs
/// to discover how the local operator shapes its output, without materializing any data.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FakeTensor {
    meta: TensorMeta,
}

impl FakeTensor {
    /// Creates an empty strided tensor matching the given metadata exactly.
    pub fn empty_strided(meta: &TensorMeta) -> Self {
        Self { meta: meta.clone() }
    }

    /// The tensor metadata.
    pub fn meta(&self) -> &TensorMeta {
        &self.meta
    }

    /// Size of each dimension.
    pub fn dims(&self) -> &[usize] {
        &self.meta.shape
    }

    /// Stride of each dimension.
    pub fn stride(&self) -> &[usize] {
        &self.meta.stride
    }

    /// Element data type.
    pub fn dtype(&self) -> DType {
        self.meta.dtype
    }

    /// The shape as a Burn [`Shape`].
    pub fn to_shape(&self) -> Shape {
        Shape::from(self.meta.shape.clone())
    }

    /// Number of logical elements.
    pub fn numel(&self) -> usize {
        self.meta.shape.iter().product()
    }

    /// Number of storage elements spanned by the strided view.
    ///
    /// Overlapping (zero-stride) views span fewer elements than [`numel`](Self::numel).
    pub fn storage_span(&self) -> usize {
        if self.meta.shape.contains(&0) {
            return 0;
        }

        self.meta
            .shape
            .iter()
            .zip(self.meta.stride.iter())
            .map(|(size, stride)| (size - 1) * stride)
            .sum::<usize>()
            + 1
    }

    /// Whether the strides describe a row-major contiguous layout.
    pub fn is_contiguous(&self) -> bool {
        self.meta.stride == contiguous_stride(&self.meta.shape)
    }
}
