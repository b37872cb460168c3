use alloc::{collections::BTreeMap, string::String, vec::Vec};
use core::fmt;

use super::{Arg, OpOverload, RuntimeSchemaInfo, Scalar};
use crate::{
    SchemaError,
    sharding::PlacementSpec,
    tensor::FakeTensor,
};

/// An operator argument where distributed tensors are replaced by their placement spec.
pub type ArgSchema<T> = Arg<PlacementSpec<T>>;

/// An operator argument where distributed tensors are replaced by fake tensors.
pub type FakeArg = Arg<FakeTensor>;

/// Describes the inputs of an operator call for sharding propagation.
///
/// Positional and keyword arguments keep their order and nesting, with every distributed
/// tensor replaced by its [`PlacementSpec`]. Schemas are cached by their
/// [identity key](OpSchema::identity_key), so they are never mutated once built.
#[derive(Clone, Debug)]
pub struct OpSchema<T> {
    op: OpOverload,
    args_schema: Vec<ArgSchema<T>>,
    kwargs_schema: BTreeMap<String, ArgSchema<T>>,
    schema_info: Option<RuntimeSchemaInfo>,
}

impl<T> OpSchema<T> {
    /// Creates the schema of a call without runtime schema info.
    pub fn new(
        op: OpOverload,
        args_schema: Vec<ArgSchema<T>>,
        kwargs_schema: BTreeMap<String, ArgSchema<T>>,
    ) -> Self {
        Self {
            op,
            args_schema,
            kwargs_schema,
            schema_info: None,
        }
    }

    /// Attaches the runtime schema info of the operator.
    pub fn with_schema_info(mut self, schema_info: RuntimeSchemaInfo) -> Self {
        self.schema_info = Some(schema_info);
        self
    }

    /// The operator being called.
    pub fn op(&self) -> &OpOverload {
        &self.op
    }

    /// Positional arguments.
    pub fn args_schema(&self) -> &[ArgSchema<T>] {
        &self.args_schema
    }

    /// Keyword arguments.
    pub fn kwargs_schema(&self) -> &BTreeMap<String, ArgSchema<T>> {
        &self.kwargs_schema
    }

    /// Runtime schema info of the operator, if registered.
    pub fn schema_info(&self) -> Option<&RuntimeSchemaInfo> {
        self.schema_info.as_ref()
    }

    /// Placement specs of the positional tensor arguments, in order.
    ///
    /// Non-tensor arguments (including lists of tensors) are left out. This is the view
    /// most propagation rules work with.
    pub fn args_spec(&self) -> Vec<&PlacementSpec<T>> {
        self.args_schema.iter().filter_map(Arg::as_tensor).collect()
    }

    /// Whether the positional argument at `index` is a tensor or a list of tensors.
    ///
    /// Lists may hold `None` entries in place of optional tensors.
    pub fn arg_type_tensor_or_tensor_list_like(&self, index: usize) -> bool {
        self.args_schema
            .get(index)
            .is_some_and(Arg::is_tensor_or_tensor_list_like)
    }

    /// Whether the operator returns a tuple of tensors.
    pub fn return_type_tuple_tensors(&self) -> bool {
        self.op.returns_tuple_of_tensors()
    }

    /// Positional arguments where every placement spec is replaced by a fake tensor.
    ///
    /// Propagation rules run the local operator on these to learn its output shape,
    /// stride and dtype without touching real data.
    pub fn gen_fake_args(&self) -> Result<Vec<FakeArg>, SchemaError> {
        self.args_schema
            .iter()
            .map(|arg| arg.try_map_tensors(&mut fake_tensor))
            .collect()
    }

    /// Keyword arguments where every placement spec is replaced by a fake tensor.
    pub fn gen_fake_kwargs(&self) -> Result<BTreeMap<String, FakeArg>, SchemaError> {
        self.kwargs_schema
            .iter()
            .map(|(key, arg)| Ok((key.clone(), arg.try_map_tensors(&mut fake_tensor)?)))
            .collect()
    }
}

fn fake_tensor<T>(spec: &PlacementSpec<T>) -> Result<FakeTensor, SchemaError> {
    spec.tensor_meta()
        .map(FakeTensor::empty_strided)
        .ok_or(SchemaError::MissingTensorMeta)
}

impl<T: Clone> OpSchema<T> {
    /// The cache identity of this call.
    ///
    /// See [`SchemaKey::new`] for which arguments take part.
    pub fn identity_key(&self) -> SchemaKey<T> {
        SchemaKey::new(self, self.schema_info.as_ref())
    }

    /// Whether a sharding decision made for `other` is valid for this call too.
    pub fn same_identity(&self, other: &Self) -> bool
    where
        T: PartialEq,
    {
        self.identity_key() == other.identity_key()
    }

    /// Completes a schema suggestion with the non-tensor arguments of the original call.
    ///
    /// `self` is a suggestion whose positional tensor arguments carry new placements. The
    /// returned schema keeps those specs, in order, at the tensor positions of `origin`;
    /// every other positional argument and all keyword arguments come from `origin`.
    pub fn rewrap_schema_suggestion(&self, origin: &OpSchema<T>) -> Result<OpSchema<T>, SchemaError> {
        let suggested = self.args_spec();
        let expected = origin.args_schema.iter().filter(|arg| arg.is_tensor()).count();
        if suggested.len() != expected {
            return Err(SchemaError::SuggestionArity {
                expected,
                found: suggested.len(),
            });
        }

        // Counts match, so every tensor position of `origin` gets exactly one suggested spec.
        let mut suggested = suggested.into_iter();
        let args_schema = origin
            .args_schema
            .iter()
            .map(|arg| match arg {
                Arg::Tensor(_) => suggested
                    .next()
                    .map_or_else(|| arg.clone(), |spec| Arg::Tensor(spec.clone())),
                other => other.clone(),
            })
            .collect();

        log::debug!("Rewrapped schema suggestion for {}", self.op);

        Ok(OpSchema {
            op: self.op.clone(),
            args_schema,
            kwargs_schema: origin.kwargs_schema.clone(),
            schema_info: self.schema_info.clone(),
        })
    }
}

impl<T> fmt::Display for OpSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpSchema(op={}, args_schema=[", self.op)?;
        for (i, arg) in self.args_schema.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str("], kwargs_schema={")?;
        for (i, (key, arg)) in self.kwargs_schema.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}: {arg}")?;
        }
        f.write_str("})")
    }
}

/// The part of an [`OpSchema`] that decides its sharding, used as a cache key.
///
/// Two calls with equal keys get the same sharding decision. Equal keys always hash the
/// same since equality and hashing are derived from the same fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SchemaKey<T> {
    op: OpOverload,
    num_args: usize,
    args: Vec<(usize, ArgSchema<T>)>,
    kwargs: Option<Vec<ArgSchema<T>>>,
}

impl<T: Clone> SchemaKey<T> {
    /// Selects the arguments of `schema` that affect its sharding.
    ///
    /// Without schema info, only tensor and tensor-list arguments take part and keyword
    /// arguments are ignored. Otherwise:
    ///
    /// - tensors and lists of tensors are always selected;
    /// - positional arguments at `static_argnum` or after are selected whatever their type;
    /// - other positional arguments are never selected, since the operator declared that
    ///   they do not affect sharding;
    /// - keyword arguments named in `static_kwargkey` are selected in that order, with a
    ///   missing argument standing as `None`.
    pub fn new(schema: &OpSchema<T>, schema_info: Option<&RuntimeSchemaInfo>) -> Self {
        let (static_argnum, static_kwargkey) = match schema_info {
            Some(info) => (info.static_argnum, info.static_kwargkey.as_deref()),
            None => (schema.args_schema.len(), None),
        };

        let args = schema
            .args_schema
            .iter()
            .enumerate()
            .filter(|(index, arg)| arg.is_tensor_or_tensor_list_like() || *index >= static_argnum)
            .map(|(index, arg)| (index, arg.clone()))
            .collect();

        let kwargs = static_kwargkey.map(|keys| {
            keys.iter()
                .map(|key| {
                    schema
                        .kwargs_schema
                        .get(key)
                        .cloned()
                        .unwrap_or(Arg::Scalar(Scalar::None))
                })
                .collect()
        });

        Self {
            op: schema.op.clone(),
            num_args: schema.args_schema.len(),
            args,
            kwargs,
        }
    }
}

impl<T> SchemaKey<T> {
    /// The operator of the call.
    pub fn op(&self) -> &OpOverload {
        &self.op
    }

    /// Indices of the positional arguments taking part in the identity.
    pub fn arg_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.args.iter().map(|(index, _)| *index)
    }
}
