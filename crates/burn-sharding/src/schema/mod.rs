//! Operator call schemas and the results of sharding propagation.
//!
//! An [`OpSchema`] describes one operator call with its distributed tensors replaced by
//! their placement specs. Propagation rules consume it and produce an [`OutputSharding`]
//! or a [`Strategy`](crate::strategy::Strategy). Results are cached by the schema's
//! [`SchemaKey`], which only holds the arguments the operator's [`RuntimeSchemaInfo`]
//! declares relevant.

mod arg;
mod info;
mod op;
mod op_info;
mod op_schema;
mod output;

pub use arg::*;
pub use info::*;
pub use op::*;
pub use op_info::*;
pub use op_schema::*;
pub use output::*;
