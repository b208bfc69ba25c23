//! Route resolution.
//!
//! An [`Asset`] lists the routes a device's messages may take. For a given
//! message, [`RouteResolver::resolve`] keeps the routes whose conditions
//! pass and works out which schema each of them needs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    condition::{self, Condition},
    config::ModelKeyStrategy,
    frame::Message,
};

/// Route type whose schemas live in the system namespace.
pub const SYSTEM_ROUTE_TYPE: &str = "system";

/// A device's provisioning record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset identifier, usually the device id with a prefix.
    #[serde(default)]
    pub id: String,
    /// Routes in provisioning order.
    #[serde(default)]
    pub routes: Vec<Route>,
}

/// One account/model assignment for an asset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Route type; [`SYSTEM_ROUTE_TYPE`] selects the system namespace.
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Account receiving the payload.
    #[serde(default)]
    pub account_id: String,
    /// Base model identifier.
    #[serde(default)]
    pub model_id: String,
    /// Conditions that must all pass for the route to apply.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Route {
    /// Build an unconditional route.
    pub fn new(account_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            kind: String::new(),
            account_id: account_id.into(),
            model_id: model_id.into(),
            conditions: Vec::new(),
        }
    }

    /// Set the route type.
    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Append a condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Whether schemas for this route live in the system namespace.
    pub fn is_system(&self) -> bool { self.kind == SYSTEM_ROUTE_TYPE }
}

/// Where to fetch the schema for an accepted route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelKey {
    /// Account id, or the system prefix for system routes.
    pub namespace: String,
    /// Concrete model identifier.
    pub model_id: String,
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.model_id)
    }
}

/// A route whose conditions passed, paired with its schema key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedRoute<'a> {
    /// The accepted route.
    pub route: &'a Route,
    /// Schema to fetch for it.
    pub model_key: ModelKey,
}

/// Selects routes and derives schema keys.
#[derive(Clone, Debug)]
pub struct RouteResolver {
    strategy: ModelKeyStrategy,
    system_prefix: String,
}

impl RouteResolver {
    /// Create a resolver using `strategy` and the given system namespace.
    pub fn new(strategy: ModelKeyStrategy, system_prefix: impl Into<String>) -> Self {
        Self {
            strategy,
            system_prefix: system_prefix.into(),
        }
    }

    /// Routes of `asset` that apply to `message`, in provisioning order.
    pub fn resolve<'a>(&self, asset: &'a Asset, message: &Message) -> Vec<ResolvedRoute<'a>> {
        asset
            .routes
            .iter()
            .filter(|route| {
                let accepted =
                    condition::evaluate(message.raw(), message.elements(), &route.conditions);
                if !accepted {
                    tracing::debug!(
                        account = %route.account_id,
                        base_model = %route.model_id,
                        "message did not meet route condition"
                    );
                }
                accepted
            })
            .map(|route| ResolvedRoute {
                route,
                model_key: self.model_key(route, message),
            })
            .collect()
    }

    /// Schema key for `route` when handling `message`.
    ///
    /// ```
    /// use trackwire::{
    ///     config::ModelKeyStrategy,
    ///     frame::Message,
    ///     route::{Route, RouteResolver},
    /// };
    ///
    /// let message = Message::parse("+RESP:GTFRI,060228,865000,1").expect("valid message");
    /// let resolver = RouteResolver::new(ModelKeyStrategy::TypeSuffixed, "system_");
    /// let key = resolver.model_key(&Route::new("acme", "gv300"), &message);
    /// assert_eq!(key.to_string(), "acme/gv300_gtfri_060228");
    /// ```
    pub fn model_key(&self, route: &Route, message: &Message) -> ModelKey {
        let namespace = if route.is_system() {
            self.system_prefix.clone()
        } else {
            route.account_id.clone()
        };
        let model_id = match self.strategy {
            ModelKeyStrategy::Conditional => route.model_id.clone(),
            ModelKeyStrategy::TypeSuffixed => format!(
                "{}_{}_{}",
                route.model_id,
                message.kind().to_lowercase(),
                message.protocol_version().to_lowercase()
            ),
        };
        ModelKey {
            namespace,
            model_id,
        }
    }
}
