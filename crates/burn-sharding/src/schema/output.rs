use alloc::{string::String, vec::Vec};

use super::OpSchema;
use crate::sharding::PlacementSpec;

/// Placement of an operator's output.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OutputSpec<T> {
    /// A single tensor output.
    Single(PlacementSpec<T>),
    /// A tuple or list output, with `None` for non-tensor entries.
    Multiple(Vec<Option<PlacementSpec<T>>>),
}

/// Result of sharding propagation for one operator call.
///
/// A successful propagation sets `output_spec`. A failed one leaves it empty, explains why
/// in `failed_reason` and may suggest schemas the caller can redistribute its inputs to
/// before retrying. Each suggestion matches the original schema except for its placements.
#[derive(Clone, Debug)]
pub struct OutputSharding<T> {
    /// Placement of the output, once resolved.
    pub output_spec: Option<OutputSpec<T>>,
    /// Schemas the inputs could be redistributed to, in order of preference.
    pub schema_suggestions: Option<Vec<OpSchema<T>>>,
    /// Why propagation failed.
    pub failed_reason: Option<String>,
    /// Whether the inputs must be redistributed before running the operator.
    pub needs_redistribute: bool,
}

impl<T> OutputSharding<T> {
    /// A successful propagation.
    pub fn new(output_spec: impl Into<Option<OutputSpec<T>>>) -> Self {
        Self {
            output_spec: output_spec.into(),
            schema_suggestions: None,
            failed_reason: None,
            needs_redistribute: false,
        }
    }

    /// A failed propagation.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            output_spec: None,
            schema_suggestions: None,
            failed_reason: Some(reason.into()),
            needs_redistribute: false,
        }
    }

    /// Sets the schemas the caller may retry with.
    pub fn with_suggestions(mut self, suggestions: Vec<OpSchema<T>>) -> Self {
        self.schema_suggestions = Some(suggestions);
        self
    }

    /// Sets whether the inputs must be redistributed.
    pub fn with_redistribute(mut self, needs_redistribute: bool) -> Self {
        self.needs_redistribute = needs_redistribute;
        self
    }

    /// Whether propagation resolved an output placement.
    pub fn is_success(&self) -> bool {
        self.failed_reason.is_none() && self.output_spec.is_some()
    }

    /// The first suggested schema, if any.
    pub fn first_suggestion(&self) -> Option<&OpSchema<T>> {
        self.schema_suggestions
            .as_ref()
            .and_then(|suggestions| suggestions.first())
    }
}

impl<T> From<PlacementSpec<T>> for OutputSpec<T> {
    fn from(spec: PlacementSpec<T>) -> Self {
        OutputSpec::Single(spec)
    }
}

impl<T> From<Vec<Option<PlacementSpec<T>>>> for OutputSpec<T> {
    fn from(specs: Vec<Option<PlacementSpec<T>>>) -> Self {
        OutputSpec::Multiple(specs)
    }
}
