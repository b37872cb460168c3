use alloc::{borrow::Cow, vec::Vec};
use core::{
    fmt,
    hash::{Hash, Hasher},
};

/// Kind of value an operator returns.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum ReturnKind {
    /// A single tensor.
    Tensor,
    /// A list of tensors.
    TensorList,
    /// A non-tensor value.
    Scalar,
}

/// Identity of an operator overload, such as `aten::add.Tensor`.
///
/// Equality and hashing only consider the qualified name; the return kinds are metadata
/// describing the overload.
#[derive(Clone, Debug)]
pub struct OpOverload {
    name: Cow<'static, str>,
    overload_name: Cow<'static, str>,
    returns: Vec<ReturnKind>,
}

impl OpOverload {
    /// Creates an operator overload returning a single tensor.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        overload_name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            name: name.into(),
            overload_name: overload_name.into(),
            returns: alloc::vec![ReturnKind::Tensor],
        }
    }

    /// Sets the kinds of the values the operator returns.
    pub fn with_returns(mut self, returns: Vec<ReturnKind>) -> Self {
        self.returns = returns;
        self
    }

    /// Operator name, such as `aten::add_`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overload name, such as `Tensor` or `out`. Empty for the default overload.
    pub fn overload_name(&self) -> &str {
        &self.overload_name
    }

    /// Kinds of the returned values.
    pub fn returns(&self) -> &[ReturnKind] {
        &self.returns
    }

    /// Whether the operator mutates its first argument in place.
    ///
    /// Based on naming only: in-place variants end with an underscore.
    pub fn is_inplace(&self) -> bool {
        self.name.ends_with('_')
    }

    /// Whether the operator writes into an `out` argument.
    ///
    /// Based on naming only: out variants carry `out` in their overload name.
    pub fn is_out_variant(&self) -> bool {
        self.overload_name.contains("out")
    }

    /// Whether the operator returns a tuple of tensors.
    pub fn returns_tuple_of_tensors(&self) -> bool {
        self.returns.len() > 1 && self.returns[0] == ReturnKind::Tensor
    }
}

impl PartialEq for OpOverload {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.overload_name == other.overload_name
    }
}

impl Eq for OpOverload {}

impl Hash for OpOverload {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.overload_name.hash(state);
    }
}

impl fmt::Display for OpOverload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.overload_name.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}.{}", self.name, self.overload_name)
        }
    }
}
