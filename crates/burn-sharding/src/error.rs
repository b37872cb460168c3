use alloc::string::String;

/// Errors raised when a propagation rule or dispatcher breaks a schema contract.
///
/// These signal a bug in the caller rather than a legitimate runtime condition. Sharding
/// propagation failures are reported through
/// [`OutputSharding::failed_reason`](crate::schema::OutputSharding) instead.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// A placement spec has no tensor metadata to build a fake tensor from.
    #[error("placement spec does not contain tensor metadata")]
    MissingTensorMeta,
    /// A schema suggestion does not hold one spec per tensor argument of the original schema.
    #[error(
        "schema suggestion has {found} tensor argument(s), but the original schema has {expected}"
    )]
    SuggestionArity {
        /// Tensor arguments of the original schema.
        expected: usize,
        /// Tensor arguments of the suggestion.
        found: usize,
    },
    /// Flattened values do not fit the structure they should be re-nested into.
    #[error("tree structure mismatch: expected {expected} leaves, found {found}")]
    TreeMismatch {
        /// Leaves required by the tree structure.
        expected: usize,
        /// Leaves provided.
        found: usize,
    },
    /// Schema and local arguments are not nested the same way.
    #[error("schema and local argument trees have different structures")]
    StructureMismatch,
    /// A schema registry configuration could not be parsed.
    #[error("invalid runtime schema configuration: {0}")]
    InvalidConfig(String),
}
