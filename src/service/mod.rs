//! Service capability: explicit method tables and the name → service
//! registry consumed by the dispatcher.

mod invokable;
mod registry;

pub use invokable::{BoundMethod, BoxFuture, MethodResult, Service, ServiceBuilder};
pub use registry::{ServiceRegistry, ServiceRegistryBuilder};
