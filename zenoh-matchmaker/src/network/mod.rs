//! Zenoh transport: keyexprs, request/reply helpers, queryables and clients

mod assign_queryable;
mod coordinator_client;
mod coordinator_queryable;
pub mod keyexpr;
mod rpc;
mod zenoh_dispatcher;

pub use assign_queryable::AssignQueryable;
pub use coordinator_client::{CoordinatorClient, DEFAULT_CALL_TIMEOUT};
pub use coordinator_queryable::CoordinatorQueryable;
pub use zenoh_dispatcher::ZenohDispatcher;
