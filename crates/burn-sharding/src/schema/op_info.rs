use alloc::{collections::BTreeMap, string::String, sync::Arc, vec::Vec};

use super::{Arg, ArgSchema, OpSchema, OutputSharding, TreeSpec, flatten_args, flatten_kwargs};
use crate::{SchemaError, sharding::DeviceMesh};

/// Everything needed to run one distributed operator call.
///
/// The flattened schema and local arguments are parallel: the leaf at an index of
/// `flat_local_args` is the local value of the leaf at the same index of
/// `flat_args_schema`. The tree specs re-nest either of them into the original call shape.
#[derive(Debug)]
pub struct OpInfo<T, L> {
    /// Mesh the call runs on.
    pub mesh: Arc<DeviceMesh<T>>,
    /// Schema of the call.
    pub schema: OpSchema<T>,
    /// Flattened positional arguments of the schema.
    pub flat_args_schema: Vec<ArgSchema<T>>,
    /// Flattened keyword arguments of the schema.
    pub flat_kwargs_schema: Vec<ArgSchema<T>>,
    /// Flattened positional arguments, with local tensor shards.
    pub flat_local_args: Vec<Arg<L>>,
    /// Flattened keyword arguments, with local tensor shards.
    pub flat_local_kwargs: Vec<Arg<L>>,
    /// Nesting of the positional arguments.
    pub args_tree_spec: TreeSpec,
    /// Nesting of the keyword arguments.
    pub kwargs_tree_spec: TreeSpec,
    /// Result of sharding propagation, once known.
    pub output_sharding: Option<OutputSharding<T>>,
}

impl<T: Clone, L> OpInfo<T, L> {
    /// Packs a call, flattening its schema and local arguments.
    ///
    /// Local arguments must be nested exactly like the schema arguments, with a local
    /// tensor wherever the schema holds a placement spec.
    pub fn new(
        mesh: Arc<DeviceMesh<T>>,
        schema: OpSchema<T>,
        local_args: Vec<Arg<L>>,
        local_kwargs: BTreeMap<String, Arg<L>>,
    ) -> Result<Self, SchemaError> {
        let (flat_args_schema, args_tree_spec) = flatten_args(schema.args_schema().to_vec());
        let (flat_kwargs_schema, kwargs_tree_spec) =
            flatten_kwargs(schema.kwargs_schema().clone());
        let (flat_local_args, local_args_tree_spec) = flatten_args(local_args);
        let (flat_local_kwargs, local_kwargs_tree_spec) = flatten_kwargs(local_kwargs);

        if args_tree_spec != local_args_tree_spec
            || kwargs_tree_spec != local_kwargs_tree_spec
            || !same_leaf_kinds(&flat_args_schema, &flat_local_args)
            || !same_leaf_kinds(&flat_kwargs_schema, &flat_local_kwargs)
        {
            return Err(SchemaError::StructureMismatch);
        }

        Ok(Self {
            mesh,
            schema,
            flat_args_schema,
            flat_kwargs_schema,
            flat_local_args,
            flat_local_kwargs,
            args_tree_spec,
            kwargs_tree_spec,
            output_sharding: None,
        })
    }
}

/// Whether every schema leaf is a tensor exactly where its local leaf is one.
fn same_leaf_kinds<T, L>(schema: &[ArgSchema<T>], local: &[Arg<L>]) -> bool {
    schema
        .iter()
        .zip(local)
        .all(|(schema, local)| schema.is_tensor() == local.is_tensor())
}

impl<T, L> OpInfo<T, L> {
    /// Attaches the result of sharding propagation.
    pub fn set_output_sharding(&mut self, output_sharding: OutputSharding<T>) {
        match &output_sharding.failed_reason {
            Some(reason) if output_sharding.schema_suggestions.is_none() => {
                log::warn!(
                    "Sharding propagation failed for {} without suggestions: {reason}",
                    self.schema.op()
                );
            }
            Some(reason) => {
                log::debug!("Sharding propagation failed for {}: {reason}", self.schema.op());
            }
            None => {
                log::debug!("Attached output sharding to {}", self.schema.op());
            }
        }
        self.output_sharding = Some(output_sharding);
    }

    /// Whether the inputs must be redistributed before the local call.
    pub fn needs_redistribute(&self) -> bool {
        self.output_sharding
            .as_ref()
            .is_some_and(|sharding| sharding.needs_redistribute)
    }

    /// Re-nests the local positional arguments into the original call shape.
    pub fn unflatten_local_args(&mut self) -> Result<Vec<Arg<L>>, SchemaError> {
        let leaves = core::mem::take(&mut self.flat_local_args);
        self.args_tree_spec.unflatten_args(leaves)
    }

    /// Re-nests the local keyword arguments into the original call shape.
    pub fn unflatten_local_kwargs(&mut self) -> Result<BTreeMap<String, Arg<L>>, SchemaError> {
        let leaves = core::mem::take(&mut self.flat_local_kwargs);
        self.kwargs_tree_spec.unflatten_kwargs(leaves)
    }
}
