//! Service registry with async handlers
//!
//! Services are how users and automations act on integrations: the
//! entity action services (`button.press`, `select.select_option`) and
//! integration services such as `cremalink_ha.brew`.

use dashmap::DashMap;
use ha_core::{Context, ServiceCall, SupportsResponse};
use jsonschema::JSONSchema;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Result type for service calls
pub type ServiceResult = Result<Option<serde_json::Value>, ServiceError>;

/// Future type for async service handlers
pub type ServiceFuture = Pin<Box<dyn Future<Output = ServiceResult> + Send>>;

/// Service handler function type
pub type ServiceHandler = Arc<dyn Fn(ServiceCall) -> ServiceFuture + Send + Sync>;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("service call failed: {0}")]
    CallFailed(String),

    #[error("invalid service data: {0}")]
    InvalidData(String),

    #[error("invalid schema for {service}: {reason}")]
    InvalidSchema { service: String, reason: String },

    #[error("service does not support responses")]
    ResponseNotSupported,
}

/// Information about a registered service
#[derive(Debug, Clone)]
pub struct ServiceDescription {
    pub domain: String,
    pub service: String,
    pub name: Option<String>,
    pub description: Option<String>,
    /// JSON schema the service data must satisfy
    pub schema: Option<serde_json::Value>,
    pub supports_response: SupportsResponse,
}

impl ServiceDescription {
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            name: None,
            description: None,
            schema: None,
            supports_response: SupportsResponse::None,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

struct RegisteredService {
    handler: ServiceHandler,
    description: ServiceDescription,
    validator: Option<Arc<JSONSchema>>,
}

/// The service registry, keyed by `domain.service`
pub struct ServiceRegistry {
    services: DashMap<String, RegisteredService>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Register a service without a schema
    pub fn register<F, Fut>(&self, domain: impl Into<String>, service: impl Into<String>, handler: F)
    where
        F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let description = ServiceDescription::new(domain, service);
        let key = format!("{}.{}", description.domain, description.service);
        debug!(service = %key, "Registering service");

        self.services.insert(
            key,
            RegisteredService {
                handler: Arc::new(move |call| Box::pin(handler(call)) as ServiceFuture),
                description,
                validator: None,
            },
        );
    }

    /// Register a service with a full description
    ///
    /// The schema, if any, is compiled here so that a broken schema fails
    /// registration instead of every call.
    #[instrument(skip(self, handler), fields(service = %description.service))]
    pub fn register_with_description<F, Fut>(
        &self,
        description: ServiceDescription,
        handler: F,
    ) -> Result<(), ServiceError>
    where
        F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let key = format!("{}.{}", description.domain, description.service);

        let validator = match &description.schema {
            Some(schema) => Some(Arc::new(JSONSchema::compile(schema).map_err(|e| {
                ServiceError::InvalidSchema {
                    service: key.clone(),
                    reason: e.to_string(),
                }
            })?)),
            None => None,
        };

        debug!(service = %key, "Registering service with description");

        self.services.insert(
            key,
            RegisteredService {
                handler: Arc::new(move |call| Box::pin(handler(call)) as ServiceFuture),
                description,
                validator,
            },
        );
        Ok(())
    }

    /// Call a service
    ///
    /// Service data is validated against the registered schema before the
    /// handler runs.
    #[instrument(skip(self, service_data, context))]
    pub async fn call(
        &self,
        domain: &str,
        service: &str,
        service_data: serde_json::Value,
        context: Context,
        return_response: bool,
    ) -> ServiceResult {
        let key = format!("{}.{}", domain, service);

        let (handler, validator, supports_response) = {
            let registered = self.services.get(&key).ok_or_else(|| {
                warn!(domain = %domain, service = %service, "Service not found");
                ServiceError::NotFound {
                    domain: domain.to_string(),
                    service: service.to_string(),
                }
            })?;
            (
                registered.handler.clone(),
                registered.validator.clone(),
                registered.description.supports_response,
            )
        };

        if return_response && supports_response == SupportsResponse::None {
            return Err(ServiceError::ResponseNotSupported);
        }

        if let Some(validator) = validator {
            if let Err(errors) = validator.validate(&service_data) {
                let reasons: Vec<String> = errors.map(|e| e.to_string()).collect();
                return Err(ServiceError::InvalidData(reasons.join("; ")));
            }
        }

        debug!(domain = %domain, service = %service, "Calling service");

        let call = ServiceCall::new(domain, service, service_data, context);
        let result = handler(call).await?;

        if return_response {
            Ok(result)
        } else {
            Ok(None)
        }
    }

    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.services.contains_key(&format!("{}.{}", domain, service))
    }

    pub fn unregister(&self, domain: &str, service: &str) -> bool {
        let removed = self
            .services
            .remove(&format!("{}.{}", domain, service))
            .is_some();
        if removed {
            debug!(domain = %domain, service = %service, "Unregistered service");
        }
        removed
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for ServiceRegistry
pub type SharedServiceRegistry = Arc<ServiceRegistry>;
