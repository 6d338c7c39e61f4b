//! Invocable services: an explicit method table built at startup.
//!
//! There is no runtime introspection. Each service declares, once, the
//! methods it exposes together with the argument shapes each accepts;
//! resolution is a table lookup over `(name, shapes)`. Overloads are
//! ordinary entries sharing a name.
//!
//! # Example
//!
//! ```
//! use wirecall::service::Service;
//! use wirecall::{Outcome, Value, ValueKind};
//!
//! let calc = Service::builder("calc")
//!     .method("multiply", &[ValueKind::I32, ValueKind::I32], |args| async move {
//!         let x = args[0].as_i32().unwrap();
//!         let y = args[1].as_i32().unwrap();
//!         Ok(Outcome::Value(Value::I32(x * y)))
//!     })
//!     .build();
//!
//! assert!(calc.resolve("multiply", &[ValueKind::I32, ValueKind::I32]).is_some());
//! assert!(calc.resolve("multiply", &[ValueKind::Str]).is_none());
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::value::{Outcome, Value, ValueKind};

/// What a method invocation produces: a value or void on success, a
/// business-level error message on failure.
pub type MethodResult = std::result::Result<Outcome, String>;

/// Boxed future returned by erased method handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Object-safe handler trait; implemented for async closures via
/// [`ServiceBuilder::method`].
trait MethodHandler: Send + Sync + 'static {
    fn invoke(&self, args: Vec<Value>) -> BoxFuture<MethodResult>;
}

struct FnHandler<F>(F);

impl<F, Fut> MethodHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = MethodResult> + Send + 'static,
{
    fn invoke(&self, args: Vec<Value>) -> BoxFuture<MethodResult> {
        Box::pin((self.0)(args))
    }
}

/// A method resolved against a service: name, accepted shapes, handler.
#[derive(Clone)]
pub struct BoundMethod {
    name: String,
    shapes: Vec<ValueKind>,
    handler: Arc<dyn MethodHandler>,
}

impl BoundMethod {
    /// The method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The argument shapes this method accepts.
    pub fn shapes(&self) -> &[ValueKind] {
        &self.shapes
    }

    /// Whether this method accepts arguments of the given shapes.
    pub fn accepts(&self, shapes: &[ValueKind]) -> bool {
        self.shapes == shapes
    }

    /// Invoke the handler. The returned future owns its arguments and may
    /// be spawned independently of the service it came from.
    pub fn invoke(&self, args: Vec<Value>) -> BoxFuture<MethodResult> {
        self.handler.invoke(args)
    }
}

impl std::fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundMethod")
            .field("name", &self.name)
            .field("shapes", &self.shapes)
            .finish()
    }
}

/// A named service with its method table. Immutable once built.
pub struct Service {
    name: String,
    methods: Vec<BoundMethod>,
}

impl Service {
    /// Start building a service with the given name.
    pub fn builder(name: impl Into<String>) -> ServiceBuilder {
        ServiceBuilder {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    /// The service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve a method by name and argument shapes.
    ///
    /// Resolution requires name equality plus exact arity and shape match.
    pub fn resolve(&self, method: &str, shapes: &[ValueKind]) -> Option<&BoundMethod> {
        self.methods
            .iter()
            .find(|m| m.name == method && m.accepts(shapes))
    }

    /// Whether any overload with this name exists, regardless of shapes.
    pub fn has_method_named(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m.name == method)
    }

    /// All registered methods.
    pub fn methods(&self) -> &[BoundMethod] {
        &self.methods
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Fluent builder for a [`Service`].
pub struct ServiceBuilder {
    name: String,
    methods: Vec<BoundMethod>,
}

impl ServiceBuilder {
    /// Register a method handler for the given name and argument shapes.
    ///
    /// Registering the same `(name, shapes)` pair twice replaces the
    /// earlier handler, so later registrations win and resolution never
    /// sees an ambiguous match.
    pub fn method<F, Fut>(mut self, name: &str, shapes: &[ValueKind], handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        self.methods
            .retain(|m| !(m.name == name && m.shapes == shapes));
        self.methods.push(BoundMethod {
            name: name.to_string(),
            shapes: shapes.to_vec(),
            handler: Arc::new(FnHandler(handler)),
        });
        self
    }

    /// Finish building.
    pub fn build(self) -> Service {
        Service {
            name: self.name,
            methods: self.methods,
        }
    }
}
