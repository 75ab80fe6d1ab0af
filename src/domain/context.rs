//! Operation Context
//!
//! Contains metadata about the current request for logging and tracing.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use uuid::Uuid;

/// Who triggered an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Actor {
    /// Public caller (vendor self-service, registration)
    #[default]
    Public,
    /// Caller authenticated with the admin key
    Admin,
    /// Scheduled job or offline utility
    System,
}

impl Actor {
    pub fn as_str(&self) -> &'static str {
        match self {
            Actor::Public => "public",
            Actor::Admin => "admin",
            Actor::System => "system",
        }
    }
}

/// Context for an operation, used for logging and tracing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperationContext {
    /// Who is acting
    pub actor: Actor,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Client IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,
}

impl OperationContext {
    /// Create a new public context
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for scheduled jobs and offline tools
    pub fn system() -> Self {
        Self::new().with_actor(Actor::System)
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.actor == Actor::Admin
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }
}
