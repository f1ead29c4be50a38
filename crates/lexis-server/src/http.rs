// crates/lexis-server/src/http.rs
// ============================================================================
// Module: Lexis HTTP Surface
// Description: Resource routes wrapped by the ownership middleware.
// Purpose: Map guard outcomes to HTTP responses and audit each request.
// Dependencies: axum, lexis-core, serde_json
// ============================================================================

//! ## Overview
//! [`resource_router`] mounts `GET /{type_key}/{id}` for every registered
//! type key. Each route runs [`ResourceGuard::handle`] in a route layer
//! before the show handler, which receives the already-loaded resource as an
//! [`AuthorizedResource`] extension. Unregistered paths fall through to a
//! routing 404 whose body differs from the resource-level 404.
//!
//! ## Invariants
//! - Internal error text reaches the client only when disclosure is enabled.
//! - Every guarded request records exactly one access audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Extension;
use axum::Json;
use axum::Router;
use axum::extract::ConnectInfo;
use axum::extract::Path;
use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use lexis_config::ServerConfig;
use lexis_core::AccessorError;
use lexis_core::AuthorizedResource;
use lexis_core::GuardFailure;
use lexis_core::GuardOutcome;
use lexis_core::GuardRejection;
use lexis_core::ResourceGuard;
use lexis_core::ResourceId;
use lexis_core::TypeKey;
use serde_json::Value;
use serde_json::json;

use crate::audit::AccessAuditEvent;
use crate::audit::AccessAuditEventParams;
use crate::audit::AccessOutcome;
use crate::audit::AuditSink;
use crate::auth::AuthContext;
use crate::auth::IdentityProvider;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Client-facing text for redacted internal errors.
pub const REDACTED_ERROR: &str = "internal server error";

// ============================================================================
// SECTION: Error Disclosure
// ============================================================================

/// Controls how much internal error text reaches clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDisclosure {
    /// Whether the internal message is sent at all.
    pub expose_internal: bool,
    /// Maximum characters sent when exposed.
    pub max_chars: usize,
}

impl ErrorDisclosure {
    /// Always sends [`REDACTED_ERROR`].
    #[must_use]
    pub const fn redacted() -> Self {
        Self {
            expose_internal: false,
            max_chars: 0,
        }
    }

    /// Sends internal messages truncated to `max_chars` characters.
    #[must_use]
    pub const fn exposed(max_chars: usize) -> Self {
        Self {
            expose_internal: true,
            max_chars,
        }
    }

    /// Builds the disclosure policy from `[server]` config.
    #[must_use]
    pub const fn from_config(config: &ServerConfig) -> Self {
        if config.expose_internal_errors {
            Self::exposed(config.max_error_chars)
        } else {
            Self::redacted()
        }
    }

    /// Renders an internal message for the client.
    #[must_use]
    pub fn render(&self, message: &str) -> String {
        if self.expose_internal {
            message.chars().take(self.max_chars).collect()
        } else {
            REDACTED_ERROR.to_string()
        }
    }
}

impl Default for ErrorDisclosure {
    fn default() -> Self {
        Self::redacted()
    }
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state for the resource routes.
#[derive(Clone)]
pub struct AppState {
    /// Ownership guard over the accessor registry.
    pub guard: ResourceGuard,
    /// Authentication collaborator.
    pub identity: Arc<dyn IdentityProvider>,
    /// Access audit sink.
    pub audit: Arc<dyn AuditSink>,
    /// Internal error disclosure policy.
    pub disclosure: ErrorDisclosure,
}

impl AppState {
    /// Creates state with redacted internal errors.
    #[must_use]
    pub fn new(
        guard: ResourceGuard,
        identity: Arc<dyn IdentityProvider>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            guard,
            identity,
            audit,
            disclosure: ErrorDisclosure::redacted(),
        }
    }

    /// Overrides the internal error disclosure policy.
    #[must_use]
    pub const fn with_disclosure(mut self, disclosure: ErrorDisclosure) -> Self {
        self.disclosure = disclosure;
        self
    }
}

/// Per-route state: the app state plus the route's type key.
#[derive(Clone)]
struct RouteState {
    /// Shared app state.
    app: AppState,
    /// Type key served by the route.
    type_key: TypeKey,
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the resource router for every registered type key.
#[must_use]
pub fn resource_router(state: AppState) -> Router {
    let mut router = Router::new();
    for type_key in state.guard.registry().type_keys() {
        let route_state = RouteState {
            app: state.clone(),
            type_key: type_key.clone(),
        };
        router = router.route(
            &format!("/{type_key}/{{id}}"),
            get(show_resource)
                .route_layer(middleware::from_fn_with_state(route_state, require_ownership)),
        );
    }
    router.fallback(route_not_found)
}

/// Routing-level 404 for unregistered paths.
async fn route_not_found() -> Response {
    message_response(StatusCode::NOT_FOUND, "route not found")
}

/// Show handler: returns the document loaded by the guard.
async fn show_resource(Extension(authorized): Extension<AuthorizedResource>) -> Json<Value> {
    Json(Value::Object(authorized.resource.document))
}

// ============================================================================
// SECTION: Ownership Middleware
// ============================================================================

/// Authenticates the caller and runs the ownership guard.
async fn require_ownership(
    State(route): State<RouteState>,
    Path(raw_id): Path<String>,
    mut request: Request,
    next: Next,
) -> Response {
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let mut access = AccessRecord {
        route: &route,
        resource_id: raw_id,
        peer,
        auth: None,
    };
    let auth = match route.app.identity.authenticate(request.headers()).await {
        Ok(auth) => auth,
        Err(_) => {
            access.record(AccessOutcome::Unauthenticated, None, None);
            return message_response(StatusCode::UNAUTHORIZED, "authentication required");
        }
    };
    access.auth = Some(auth.clone());
    let outcome = match ResourceId::parse(&access.resource_id) {
        Ok(id) => route.app.guard.handle(&route.type_key, &id, &auth.identity).await,
        Err(_) => GuardOutcome::Reject(GuardRejection::Internal(GuardFailure::Accessor(
            AccessorError::MalformedId(format!("{} bytes", access.resource_id.len())),
        ))),
    };
    match outcome {
        GuardOutcome::Continue(authorized) => {
            access.record(AccessOutcome::Allow, Some(authorized.decision.reason.as_str()), None);
            request.extensions_mut().insert(authorized);
            next.run(request).await
        }
        GuardOutcome::Reject(GuardRejection::NotFound) => {
            access.record(AccessOutcome::NotFound, None, None);
            message_response(StatusCode::NOT_FOUND, "resource not found")
        }
        GuardOutcome::Reject(GuardRejection::Forbidden {
            decision,
        }) => {
            access.record(AccessOutcome::Deny, Some(decision.reason.as_str()), None);
            message_response(StatusCode::FORBIDDEN, "access to this resource is forbidden")
        }
        GuardOutcome::Reject(GuardRejection::Internal(failure)) => {
            let message = failure.to_string();
            access.record(AccessOutcome::Error, None, Some(message.clone()));
            let body = json!({ "error": route.app.disclosure.render(&message) });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// Request facts collected for the access audit event.
struct AccessRecord<'a> {
    /// Route being served.
    route: &'a RouteState,
    /// Raw id from the path.
    resource_id: String,
    /// Peer address when the transport provided one.
    peer: Option<SocketAddr>,
    /// Authenticated caller once known.
    auth: Option<AuthContext>,
}

impl AccessRecord<'_> {
    /// Records one access event.
    fn record(&self, outcome: AccessOutcome, reason: Option<&'static str>, error: Option<String>) {
        let event = AccessAuditEvent::new(AccessAuditEventParams {
            type_key: self.route.type_key.to_string(),
            resource_id: self.resource_id.clone(),
            subject: self.auth.as_ref().map(|auth| auth.identity.id.to_string()),
            token_fingerprint: self.auth.as_ref().and_then(|auth| auth.token_fingerprint.clone()),
            peer: self.peer,
            outcome,
            reason,
            error,
        });
        self.route.app.audit.record_access(&event);
    }
}

/// Builds a `{"message": ...}` response.
fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_disclosure_hides_message() {
        assert_eq!(ErrorDisclosure::redacted().render("db path /var/x"), REDACTED_ERROR);
        assert_eq!(ErrorDisclosure::default(), ErrorDisclosure::redacted());
    }

    #[test]
    fn exposed_disclosure_truncates_by_chars() {
        let disclosure = ErrorDisclosure::exposed(3);
        assert_eq!(disclosure.render("ñandú"), "ñan");
        assert_eq!(disclosure.render("ok"), "ok");
    }
}
