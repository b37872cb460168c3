use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    vec::Vec,
};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use super::{ArgSchema, OpOverload, OpSchema};
use crate::SchemaError;

/// Default positional index from which non-tensor arguments join the cache identity.
///
/// Large enough that, for all practical operators, no non-tensor argument is included.
pub const DEFAULT_STATIC_ARGNUM: usize = 100;

/// Per-operator information deciding which non-tensor arguments affect sharding.
///
/// Most operators shard the same way regardless of their scalar arguments. The few that
/// do not (`transpose`, `view`, reductions over a dimension, ...) declare the positional
/// index from which arguments matter, and the keyword arguments that matter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSchemaInfo {
    /// Every positional argument at this index or after is part of the cache identity.
    pub static_argnum: usize,
    /// Keyword arguments that are part of the cache identity.
    pub static_kwargkey: Option<Vec<String>>,
    /// Whether the arguments may be nested and need flattening.
    pub needs_pytree: bool,
}

impl Default for RuntimeSchemaInfo {
    fn default() -> Self {
        Self {
            static_argnum: DEFAULT_STATIC_ARGNUM,
            static_kwargkey: None,
            needs_pytree: true,
        }
    }
}

impl RuntimeSchemaInfo {
    /// Creates schema info where arguments from `static_argnum` on affect sharding.
    pub fn new(static_argnum: usize) -> Self {
        Self {
            static_argnum,
            ..Default::default()
        }
    }

    /// Declares the keyword arguments that affect sharding.
    pub fn with_static_kwargkey<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.static_kwargkey = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    /// Sets whether the arguments need flattening.
    pub fn with_needs_pytree(mut self, needs_pytree: bool) -> Self {
        self.needs_pytree = needs_pytree;
        self
    }
}

/// Registry of [`RuntimeSchemaInfo`] by qualified operator name.
///
/// Operators without an entry get no schema info, in which case only their tensor and
/// tensor-list arguments are part of their cache identity.
#[derive(Clone, Debug, Default)]
pub struct RuntimeSchemaRegistry {
    infos: HashMap<String, RuntimeSchemaInfo>,
}

impl RuntimeSchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a registry from a JSON object mapping operator names to schema info.
    ///
    /// ```rust
    /// use burn_sharding::schema::RuntimeSchemaRegistry;
    ///
    /// let registry = RuntimeSchemaRegistry::from_json(
    ///     r#"{ "aten::transpose.int": { "static_argnum": 1 } }"#,
    /// )
    /// .unwrap();
    ///
    /// let info = registry.get("aten::transpose.int").unwrap();
    /// assert_eq!(info.static_argnum, 1);
    /// assert!(info.needs_pytree);
    /// ```
    pub fn from_json(config: &str) -> Result<Self, SchemaError> {
        let entries: BTreeMap<String, RuntimeSchemaInfo> = serde_json::from_str(config)
            .map_err(|err| SchemaError::InvalidConfig(err.to_string()))?;

        log::debug!("Loaded runtime schema info for {} operator(s)", entries.len());

        Ok(Self {
            infos: entries.into_iter().collect(),
        })
    }

    /// Registers the schema info of an operator, replacing any previous entry.
    pub fn register(&mut self, op: &OpOverload, info: RuntimeSchemaInfo) -> &mut Self {
        let name = op.to_string();
        if self.infos.insert(name, info).is_some() {
            log::debug!("Replaced runtime schema info of {op}");
        }
        self
    }

    /// Schema info registered under the qualified operator name.
    pub fn get(&self, qualified_name: &str) -> Option<&RuntimeSchemaInfo> {
        self.infos.get(qualified_name)
    }

    /// Schema info registered for the operator.
    pub fn get_op(&self, op: &OpOverload) -> Option<&RuntimeSchemaInfo> {
        self.get(&op.to_string())
    }

    /// Number of registered operators.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether no operator is registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Builds the schema of a call, attaching the operator's registered schema info.
    pub fn build_schema<T>(
        &self,
        op: OpOverload,
        args_schema: Vec<ArgSchema<T>>,
        kwargs_schema: BTreeMap<String, ArgSchema<T>>,
    ) -> OpSchema<T> {
        let info = self.get_op(&op).cloned();
        let schema = OpSchema::new(op, args_schema, kwargs_schema);

        match info {
            Some(info) => schema.with_schema_info(info),
            None => schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn default_info_includes_no_scalar_args() {
        let info = RuntimeSchemaInfo::default();

        assert_eq!(info.static_argnum, DEFAULT_STATIC_ARGNUM);
        assert_eq!(info.static_kwargkey, None);
        assert!(info.needs_pytree);
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let registry = RuntimeSchemaRegistry::from_json(
            r#"{
                "aten::var.correction": { "static_argnum": 1, "static_kwargkey": ["keepdim"] },
                "aten::split.Tensor": { "needs_pytree": false }
            }"#,
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("aten::var.correction"),
            Some(&RuntimeSchemaInfo::new(1).with_static_kwargkey(["keepdim"]))
        );
        assert_eq!(
            registry.get("aten::split.Tensor"),
            Some(&RuntimeSchemaInfo::default().with_needs_pytree(false))
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let result = RuntimeSchemaRegistry::from_json(r#"{ "aten::mm": { "static_argnum": -1 } }"#);

        assert!(matches!(result, Err(SchemaError::InvalidConfig(_))));
    }

    #[test]
    fn build_schema_attaches_registered_info() {
        let transpose = OpOverload::new("aten::transpose", "int");
        let mut registry = RuntimeSchemaRegistry::new();
        registry.register(&transpose, RuntimeSchemaInfo::new(1));

        let schema = registry.build_schema::<usize>(
            transpose,
            vec![0i64.into(), 1i64.into()],
            BTreeMap::new(),
        );
        let unregistered = registry.build_schema::<usize>(
            OpOverload::new("aten::mm", ""),
            vec![],
            BTreeMap::new(),
        );

        assert_eq!(schema.schema_info(), Some(&RuntimeSchemaInfo::new(1)));
        assert_eq!(unregistered.schema_info(), None);
    }
}
