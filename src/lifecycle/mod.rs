//! Resource lifecycle core
//!
//! Everything shared by the resource adapters: tri-state values, attribute
//! descriptors, the drift merge, canonical URIs, the readiness waiter, the
//! delete retry loop, and the reconciler that sequences them.

pub mod drift;
pub mod readiness;
pub mod reconciler;
pub mod retry;
pub mod schema;
pub mod scope;
pub mod translate;
pub mod uri;
pub mod value;
pub mod waiter;

pub use reconciler::{Adapter, Operation, Reconciler, ResourceHandler};
pub use value::Attr;
