use alloc::vec::Vec;
use core::fmt;

use crate::sharding::{PlacementSpec, pretty_print_placements};

/// An acceptable placement of the output and tensor arguments of an operation.
///
/// When `input_specs` is present it holds one spec per tensor argument, each a layout the
/// operation can consume to produce `output_spec` without further redistribution.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlacementStrategy<T> {
    output_spec: PlacementSpec<T>,
    input_specs: Option<Vec<PlacementSpec<T>>>,
}

impl<T> PlacementStrategy<T> {
    /// Creates a strategy that only constrains the output.
    pub fn new(output_spec: PlacementSpec<T>) -> Self {
        Self {
            output_spec,
            input_specs: None,
        }
    }

    /// Creates a strategy constraining the output and every tensor argument.
    pub fn with_inputs(output_spec: PlacementSpec<T>, input_specs: Vec<PlacementSpec<T>>) -> Self {
        Self {
            output_spec,
            input_specs: Some(input_specs),
        }
    }

    /// Placement of the output.
    pub fn output_spec(&self) -> &PlacementSpec<T> {
        &self.output_spec
    }

    /// Placement of each tensor argument, if constrained.
    pub fn input_specs(&self) -> Option<&[PlacementSpec<T>]> {
        self.input_specs.as_deref()
    }

    /// Placement of the tensor argument at `index`, if constrained.
    pub fn input_spec(&self, index: usize) -> Option<&PlacementSpec<T>> {
        self.input_specs.as_ref().and_then(|specs| specs.get(index))
    }
}

impl<T> fmt::Display for PlacementStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        if let Some(inputs) = &self.input_specs {
            for (i, spec) in inputs.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(&pretty_print_placements(spec.placements()))?;
            }
        }
        write!(
            f,
            ") -> ({}) @ mesh layout: ",
            pretty_print_placements(self.output_spec.placements())
        )?;
        write_mesh_layout(f, self.output_spec.mesh().shape())
    }
}

/// Writes a mesh shape as a tuple, such as `(2, 2)` or `(4,)`.
fn write_mesh_layout(f: &mut fmt::Formatter<'_>, shape: &[usize]) -> fmt::Result {
    f.write_str("(")?;
    for (i, size) in shape.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{size}")?;
    }
    if shape.len() == 1 {
        f.write_str(",")?;
    }
    f.write_str(")")
}

/// Every acceptable placement strategy of a single-output operation.
///
/// All strategies are expected to agree on the output shape; this is not checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpStrategy<T> {
    strategies: Vec<PlacementStrategy<T>>,
}

impl<T> OpStrategy<T> {
    /// Creates an op strategy from a list of placement strategies.
    ///
    /// # Panics
    ///
    /// If `strategies` is empty.
    pub fn new(strategies: Vec<PlacementStrategy<T>>) -> Self {
        assert!(
            !strategies.is_empty(),
            "An op strategy needs at least one placement strategy"
        );
        Self { strategies }
    }

    /// The placement strategies, in the order they were produced.
    pub fn strategies(&self) -> &[PlacementStrategy<T>] {
        &self.strategies
    }

    /// Number of placement strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether there are no strategies.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// The largest number of output shards across all placement strategies.
    pub fn max_num_shards(&self) -> usize {
        self.strategies
            .iter()
            .map(|strategy| strategy.output_spec.num_shards())
            .fold(1, usize::max)
    }

    /// Output shape, read from the first strategy.
    pub fn output_shape(&self) -> Option<&[usize]> {
        self.strategies
            .first()
            .and_then(|strategy| strategy.output_spec.shape())
    }

    /// Output rank, read from the first strategy.
    pub fn output_ndim(&self) -> Option<usize> {
        self.strategies
            .first()
            .and_then(|strategy| strategy.output_spec.ndim())
    }
}

impl<T> fmt::Display for OpStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OpStrategy: [")?;
        for (i, strategy) in self.strategies.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{strategy}")?;
        }
        f.write_str("]")
    }
}

/// Strategies of an operation whose output is a tuple of independently sharded tensors.
///
/// Operations returning a list of tensors are described by an [`OpStrategy`] instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TupleStrategy<T> {
    children: Vec<Strategy<T>>,
}

impl<T> TupleStrategy<T> {
    /// Creates a tuple strategy with one child per output.
    pub fn new(children: Vec<Strategy<T>>) -> Self {
        Self { children }
    }

    /// Strategy of each output, in tuple order.
    pub fn children(&self) -> &[Strategy<T>] {
        &self.children
    }

    /// Strategy of the output at `index`.
    pub fn child(&self, index: usize) -> Option<&Strategy<T>> {
        self.children.get(index)
    }

    /// Number of outputs.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the tuple has no outputs.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl<T> fmt::Display for TupleStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TupleStrategy:")?;
        for (idx, child) in self.children.iter().enumerate() {
            write!(f, "\n tuple idx: {idx}, strategy: {child}")?;
        }
        Ok(())
    }
}

/// The acceptable placements of an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Strategy<T> {
    /// Strategies of a single output.
    Op(OpStrategy<T>),
    /// Strategies of each output of a tuple.
    Tuple(TupleStrategy<T>),
}

impl<T> Strategy<T> {
    /// The op strategy, if this is one.
    pub fn as_op(&self) -> Option<&OpStrategy<T>> {
        match self {
            Strategy::Op(strategy) => Some(strategy),
            Strategy::Tuple(_) => None,
        }
    }

    /// The tuple strategy, if this is one.
    pub fn as_tuple(&self) -> Option<&TupleStrategy<T>> {
        match self {
            Strategy::Op(_) => None,
            Strategy::Tuple(strategy) => Some(strategy),
        }
    }
}

impl<T> From<OpStrategy<T>> for Strategy<T> {
    fn from(strategy: OpStrategy<T>) -> Self {
        Strategy::Op(strategy)
    }
}

impl<T> From<TupleStrategy<T>> for Strategy<T> {
    fn from(strategy: TupleStrategy<T>) -> Self {
        Strategy::Tuple(strategy)
    }
}

impl<T> fmt::Display for Strategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Op(strategy) => fmt::Display::fmt(strategy, f),
            Strategy::Tuple(strategy) => fmt::Display::fmt(strategy, f),
        }
    }
}
