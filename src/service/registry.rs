//! Service registry: name → invocable service, built once at startup.
//!
//! The registry is constructed by external startup code via
//! [`ServiceRegistryBuilder`] and is immutable afterwards, so it can be
//! shared across every dispatch task without locking.

use std::collections::HashMap;
use std::sync::Arc;

use super::invokable::Service;

/// Immutable mapping from service name to service instance.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Arc<Service>>,
}

impl ServiceRegistry {
    /// Start building a registry.
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder {
            services: HashMap::new(),
        }
    }

    /// Look up a service by name.
    pub fn lookup(&self, name: &str) -> Option<&Arc<Service>> {
        self.services.get(name)
    }

    /// Names of all registered services, unordered.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Builder consumed into an immutable [`ServiceRegistry`].
pub struct ServiceRegistryBuilder {
    services: HashMap<String, Arc<Service>>,
}

impl ServiceRegistryBuilder {
    /// Register a service under its own name. A repeated name replaces the
    /// earlier registration.
    pub fn register(mut self, service: Service) -> Self {
        self.services
            .insert(service.name().to_string(), Arc::new(service));
        self
    }

    /// Finish building.
    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            services: self.services,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Outcome, ValueKind};

    #[test]
    fn test_lookup_hit_and_miss() {
        let registry = ServiceRegistry::builder()
            .register(Service::builder("service1").build())
            .register(
                Service::builder("service2")
                    .method("multiply", &[ValueKind::I32, ValueKind::I32], |_| async {
                        Ok(Outcome::Void)
                    })
                    .build(),
            )
            .build();

        assert_eq!(registry.len(), 2);
        assert!(registry.lookup("service1").is_some());
        assert!(registry.lookup("service2").is_some());
        assert!(registry.lookup("doesNotExist").is_none());
    }

    #[test]
    fn test_repeated_name_replaces() {
        let registry = ServiceRegistry::builder()
            .register(Service::builder("svc").build())
            .register(
                Service::builder("svc")
                    .method("ping", &[], |_| async { Ok(Outcome::Void) })
                    .build(),
            )
            .build();

        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("svc").unwrap().has_method_named("ping"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = ServiceRegistry::builder().build();
        assert!(registry.is_empty());
        assert!(registry.lookup("anything").is_none());
    }
}
