use alloc::{collections::BTreeMap, string::String, vec::Vec};
use core::{
    fmt,
    hash::{Hash, Hasher},
};

use burn_tensor::DType;

use crate::SchemaError;

/// A non-tensor argument value.
///
/// Floats compare and hash by bit pattern, so `0.0` and `-0.0` are distinct and a `NaN`
/// equals itself. This keeps equality and hashing consistent for cache keys.
#[derive(Clone, Debug)]
pub enum Scalar {
    /// An absent optional value.
    None,
    /// A boolean.
    Bool(bool),
    /// An integer, such as a dimension index.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string, such as a reduction mode.
    Str(String),
    /// A data type.
    DType(DType),
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::None, Scalar::None) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a.to_bits() == b.to_bits(),
            (Scalar::Str(a), Scalar::Str(b)) => a == b,
            (Scalar::DType(a), Scalar::DType(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl Hash for Scalar {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Scalar::None => {}
            Scalar::Bool(value) => value.hash(state),
            Scalar::Int(value) => value.hash(state),
            Scalar::Float(value) => value.to_bits().hash(state),
            Scalar::Str(value) => value.hash(state),
            Scalar::DType(value) => core::mem::discriminant(value).hash(state),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::None => f.write_str("None"),
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value:?}"),
            Scalar::Str(value) => write!(f, "{value:?}"),
            Scalar::DType(value) => write!(f, "{value:?}"),
        }
    }
}

/// An operator argument: a tensor, a scalar, or a list of arguments.
///
/// The tensor type varies with the stage of dispatch: placement specs in an
/// [`OpSchema`](super::OpSchema), fake tensors for shape discovery, local shards for
/// execution.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Arg<T> {
    /// A tensor argument.
    Tensor(T),
    /// A non-tensor argument.
    Scalar(Scalar),
    /// A list or tuple of arguments.
    List(Vec<Arg<T>>),
}

impl<T> Arg<T> {
    /// The tensor, if this argument is one.
    pub fn as_tensor(&self) -> Option<&T> {
        match self {
            Arg::Tensor(tensor) => Some(tensor),
            _ => None,
        }
    }

    /// Whether this argument is a tensor.
    pub fn is_tensor(&self) -> bool {
        matches!(self, Arg::Tensor(_))
    }

    /// Whether this argument is a tensor, or a list holding only tensors and `None`s.
    pub fn is_tensor_or_tensor_list_like(&self) -> bool {
        match self {
            Arg::Tensor(_) => true,
            Arg::List(items) => items
                .iter()
                .all(|item| matches!(item, Arg::Tensor(_) | Arg::Scalar(Scalar::None))),
            Arg::Scalar(_) => false,
        }
    }

    /// Every tensor of the argument tree, depth first.
    pub fn tensors(&self) -> Vec<&T> {
        let mut out = Vec::new();
        self.collect_tensors(&mut out);
        out
    }

    fn collect_tensors<'a>(&'a self, out: &mut Vec<&'a T>) {
        match self {
            Arg::Tensor(tensor) => out.push(tensor),
            Arg::Scalar(_) => {}
            Arg::List(items) => items.iter().for_each(|item| item.collect_tensors(out)),
        }
    }

    /// Rebuilds the argument tree with every tensor mapped through `f`.
    pub fn try_map_tensors<U, E, F>(&self, f: &mut F) -> Result<Arg<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        Ok(match self {
            Arg::Tensor(tensor) => Arg::Tensor(f(tensor)?),
            Arg::Scalar(scalar) => Arg::Scalar(scalar.clone()),
            Arg::List(items) => Arg::List(
                items
                    .iter()
                    .map(|item| item.try_map_tensors(f))
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    fn flatten_into(self, leaves: &mut Vec<Arg<T>>) -> TreeSpec {
        match self {
            Arg::List(items) => TreeSpec::List(
                items
                    .into_iter()
                    .map(|item| item.flatten_into(leaves))
                    .collect(),
            ),
            leaf => {
                leaves.push(leaf);
                TreeSpec::Leaf
            }
        }
    }
}

impl<T> From<Scalar> for Arg<T> {
    fn from(value: Scalar) -> Self {
        Arg::Scalar(value)
    }
}

impl<T> From<i64> for Arg<T> {
    fn from(value: i64) -> Self {
        Arg::Scalar(Scalar::Int(value))
    }
}

impl<T> From<f64> for Arg<T> {
    fn from(value: f64) -> Self {
        Arg::Scalar(Scalar::Float(value))
    }
}

impl<T> From<bool> for Arg<T> {
    fn from(value: bool) -> Self {
        Arg::Scalar(Scalar::Bool(value))
    }
}

impl<T: fmt::Display> fmt::Display for Arg<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Tensor(tensor) => write!(f, "{tensor}"),
            Arg::Scalar(scalar) => write!(f, "{scalar}"),
            Arg::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Nesting structure of flattened arguments.
///
/// Leaves are tensors and scalars; lists and keyword maps are the inner nodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeSpec {
    /// A single tensor or scalar.
    Leaf,
    /// A positional sequence.
    List(Vec<TreeSpec>),
    /// Named entries, in key order.
    Map(Vec<(String, TreeSpec)>),
}

impl TreeSpec {
    /// Number of leaves described by the structure.
    pub fn num_leaves(&self) -> usize {
        match self {
            TreeSpec::Leaf => 1,
            TreeSpec::List(children) => children.iter().map(TreeSpec::num_leaves).sum(),
            TreeSpec::Map(entries) => entries.iter().map(|(_, spec)| spec.num_leaves()).sum(),
        }
    }

    /// Re-nests flattened positional arguments.
    pub fn unflatten_args<T>(&self, leaves: Vec<Arg<T>>) -> Result<Vec<Arg<T>>, SchemaError> {
        let TreeSpec::List(children) = self else {
            return Err(SchemaError::StructureMismatch);
        };
        let mut leaves = self.checked_leaves(leaves)?;

        children
            .iter()
            .map(|child| child.build(&mut leaves))
            .collect()
    }

    /// Re-nests flattened keyword arguments.
    pub fn unflatten_kwargs<T>(
        &self,
        leaves: Vec<Arg<T>>,
    ) -> Result<BTreeMap<String, Arg<T>>, SchemaError> {
        let TreeSpec::Map(entries) = self else {
            return Err(SchemaError::StructureMismatch);
        };
        let mut leaves = self.checked_leaves(leaves)?;

        entries
            .iter()
            .map(|(key, child)| Ok((key.clone(), child.build(&mut leaves)?)))
            .collect()
    }

    fn checked_leaves<T>(
        &self,
        leaves: Vec<Arg<T>>,
    ) -> Result<alloc::vec::IntoIter<Arg<T>>, SchemaError> {
        let expected = self.num_leaves();
        if leaves.len() != expected {
            return Err(SchemaError::TreeMismatch {
                expected,
                found: leaves.len(),
            });
        }
        Ok(leaves.into_iter())
    }

    fn build<T, I>(&self, leaves: &mut I) -> Result<Arg<T>, SchemaError>
    where
        I: Iterator<Item = Arg<T>>,
    {
        match self {
            TreeSpec::Leaf => leaves.next().ok_or(SchemaError::TreeMismatch {
                expected: self.num_leaves(),
                found: 0,
            }),
            TreeSpec::List(children) => Ok(Arg::List(
                children
                    .iter()
                    .map(|child| child.build(leaves))
                    .collect::<Result<_, _>>()?,
            )),
            TreeSpec::Map(_) => Err(SchemaError::StructureMismatch),
        }
    }
}

/// Flattens positional arguments into their leaves and nesting structure.
pub fn flatten_args<T>(args: Vec<Arg<T>>) -> (Vec<Arg<T>>, TreeSpec) {
    let mut leaves = Vec::new();
    let children = args
        .into_iter()
        .map(|arg| arg.flatten_into(&mut leaves))
        .collect();

    (leaves, TreeSpec::List(children))
}

/// Flattens keyword arguments into their leaves and nesting structure.
pub fn flatten_kwargs<T>(kwargs: BTreeMap<String, Arg<T>>) -> (Vec<Arg<T>>, TreeSpec) {
    let mut leaves = Vec::new();
    let entries = kwargs
        .into_iter()
        .map(|(key, arg)| {
            let spec = arg.flatten_into(&mut leaves);
            (key, spec)
        })
        .collect();

    (leaves, TreeSpec::Map(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::{string::ToString, vec};
    use pretty_assertions::assert_eq;

    fn nested() -> Vec<Arg<&'static str>> {
        vec![
            Arg::Tensor("a"),
            Arg::List(vec![Arg::Tensor("b"), 2i64.into(), Arg::List(vec![Arg::Tensor("c")])]),
            Arg::Scalar(Scalar::None),
        ]
    }

    #[test]
    fn tensor_list_like_accepts_tensors_and_nones() {
        let list: Arg<u8> = Arg::List(vec![Arg::Tensor(0), Arg::Scalar(Scalar::None)]);
        let mixed: Arg<u8> = Arg::List(vec![Arg::Tensor(0), 1i64.into()]);
        let empty: Arg<u8> = Arg::List(vec![]);

        assert!(Arg::Tensor(0u8).is_tensor_or_tensor_list_like());
        assert!(list.is_tensor_or_tensor_list_like());
        assert!(empty.is_tensor_or_tensor_list_like());
        assert!(!mixed.is_tensor_or_tensor_list_like());
        assert!(!Arg::<u8>::from(1i64).is_tensor_or_tensor_list_like());
    }

    #[test]
    fn tensors_are_collected_depth_first() {
        let tensors: Vec<&str> = nested().iter().flat_map(|arg| arg.tensors()).copied().collect();

        assert_eq!(tensors, vec!["a", "b", "c"]);
    }

    #[test]
    fn map_tensors_keeps_scalars() {
        let arg: Arg<u8> = Arg::List(vec![Arg::Tensor(3), 7i64.into()]);
        let mapped = arg
            .try_map_tensors(&mut |t| Ok::<_, ()>(u32::from(*t) * 10))
            .unwrap();

        assert_eq!(mapped, Arg::List(vec![Arg::Tensor(30u32), 7i64.into()]));
    }

    #[test]
    fn map_tensors_stops_on_error() {
        let arg: Arg<u8> = Arg::List(vec![Arg::Tensor(3), Arg::Tensor(4)]);
        let result = arg.try_map_tensors(&mut |t| if *t == 4 { Err("four") } else { Ok(*t) });

        assert_eq!(result, Err("four"));
    }

    #[test]
    fn flatten_args_then_unflatten_restores_nesting() {
        let (leaves, spec) = flatten_args(nested());

        assert_eq!(leaves.len(), 5);
        assert_eq!(spec.num_leaves(), 5);
        assert_eq!(spec.unflatten_args(leaves).unwrap(), nested());
    }

    #[test]
    fn flatten_kwargs_follows_key_order() {
        let mut kwargs: BTreeMap<String, Arg<&str>> = BTreeMap::new();
        kwargs.insert("out".to_string(), Arg::Tensor("o"));
        kwargs.insert("alpha".to_string(), 2i64.into());

        let (leaves, spec) = flatten_kwargs(kwargs.clone());

        assert_eq!(leaves, vec![2i64.into(), Arg::Tensor("o")]);
        assert_eq!(spec.unflatten_kwargs(leaves).unwrap(), kwargs);
    }

    #[test]
    fn unflatten_rejects_wrong_leaf_count() {
        let (mut leaves, spec) = flatten_args(nested());
        leaves.pop();

        assert_eq!(
            spec.unflatten_args(leaves),
            Err(SchemaError::TreeMismatch {
                expected: 5,
                found: 4
            })
        );
    }

    #[test]
    fn unflatten_rejects_wrong_tree_kind() {
        let (leaves, spec) = flatten_args(nested());

        assert_eq!(
            spec.unflatten_kwargs(leaves),
            Err(SchemaError::StructureMismatch)
        );
    }

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(Scalar::Float(f64::NAN), Scalar::Float(f64::NAN));
        assert_ne!(Scalar::Float(0.0), Scalar::Float(-0.0));
        assert_ne!(Scalar::Float(1.0), Scalar::Int(1));
    }
}
