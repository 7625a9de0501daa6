//! Session-or-credential authentication for management routes.
//!
//! [`PrincipalResolver`] turns a cookie session or an access credential into
//! an [`Identity`]; [`RoleGateLayer`] then enforces ban, disabled status and
//! the minimum role. User, admin and root routes differ only in `min_role`.
//!
//! Rejections use the legacy envelope: HTTP 200 with `success: false`,
//! except a request carrying no credential at all (401) and collaborator
//! failures (500).

use super::{with_deadline, AdmissionMetrics, BoxFuture};
use crate::domain::principal::ACCOUNT_BANNED;
use crate::domain::{authorize, GateError, Identity, Rejection, RequestContext, Role, Status};
use crate::ports::{AccountPolicy, AccountStore, SessionStore};
use axum::{
    body::Body,
    http::{header, HeaderMap, Request},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Resolves the caller of a management request.
#[derive(Clone)]
pub struct PrincipalResolver {
    sessions: Arc<dyn SessionStore>,
    accounts: Arc<dyn AccountStore>,
    cookie_name: String,
    deadline: Duration,
}

impl PrincipalResolver {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        accounts: Arc<dyn AccountStore>,
        cookie_name: impl Into<String>,
        deadline: Duration,
    ) -> Self {
        Self {
            sessions,
            accounts,
            cookie_name: cookie_name.into(),
            deadline,
        }
    }

    /// Session first; the `Authorization` header only when there is no
    /// live session.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Identity, Rejection> {
        if let Some(session_id) = session_cookie(headers, &self.cookie_name) {
            let loaded = with_deadline(self.deadline, "session store", self.sessions.load(&session_id))
                .await
                .and_then(|r| r)
                .map_err(|e| Rejection::legacy(e.into()))?;
            if let Some(principal) = loaded {
                return Ok(Identity::Session {
                    session_id,
                    principal,
                });
            }
            debug!("Session cookie present but no live session");
        }

        let access_token = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim())
            .unwrap_or_default();
        if access_token.is_empty() {
            return Err(Rejection::new(GateError::Unauthenticated(
                "not logged in and no access token provided".into(),
            )));
        }

        let resolved = with_deadline(
            self.deadline,
            "account store",
            self.accounts.resolve_access_token(access_token),
        )
        .await
        .and_then(|r| r)
        .map_err(|e| Rejection::legacy(e.into()))?;

        match resolved {
            Some(principal) => Ok(Identity::Credential(principal)),
            None => Err(Rejection::legacy(GateError::Unauthenticated(
                "access token is invalid".into(),
            ))),
        }
    }
}

/// Value of cookie `name`, if present and non-empty
fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .map(|(_, v)| v.to_string())
}

struct RoleGate {
    min_role: Role,
    resolver: PrincipalResolver,
    sessions: Arc<dyn SessionStore>,
    policy: AccountPolicy,
    deadline: Duration,
    metrics: Arc<AdmissionMetrics>,
}

impl RoleGate {
    async fn admit(&self, headers: &HeaderMap) -> Result<Identity, Rejection> {
        let identity = self.resolver.resolve(headers).await?;
        let principal = identity.principal();

        let banned = principal.status == Status::Enabled
            && with_deadline(
                self.deadline,
                "ban registry",
                self.policy.is_banned(principal.user_id),
            )
            .await
            .map_err(|e| Rejection::legacy(e.into()))?;

        if let Err(err) = authorize(principal, self.min_role, banned) {
            warn!(
                user_id = %principal.user_id,
                role = %principal.role,
                min_role = %self.min_role,
                reason = err.reason(),
                "Management request rejected"
            );
            if err.reason() == ACCOUNT_BANNED {
                self.invalidate_session(&identity).await;
            }
            return Err(Rejection::legacy(err));
        }

        Ok(identity)
    }

    /// Force re-authentication of a banned session. Failures are logged only.
    async fn invalidate_session(&self, identity: &Identity) {
        let Some(session_id) = identity.session_id() else {
            return;
        };
        let cleared = with_deadline(self.deadline, "session store", self.sessions.invalidate(session_id))
            .await
            .and_then(|r| r);
        if let Err(e) = cleared {
            warn!(error = %e, "Failed to clear session of banned account");
        }
    }
}

/// Role gate layer
#[derive(Clone)]
pub struct RoleGateLayer {
    gate: Arc<RoleGate>,
}

impl RoleGateLayer {
    pub fn new(
        min_role: Role,
        resolver: PrincipalResolver,
        policy: AccountPolicy,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        Self {
            gate: Arc::new(RoleGate {
                min_role,
                sessions: Arc::clone(&resolver.sessions),
                deadline: resolver.deadline,
                resolver,
                policy,
                metrics,
            }),
        }
    }

    pub fn min_role(&self) -> Role {
        self.gate.min_role
    }
}

impl<S> Layer<S> for RoleGateLayer {
    type Service = RoleGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RoleGateService {
            inner,
            gate: Arc::clone(&self.gate),
        }
    }
}

/// Role gate service
#[derive(Clone)]
pub struct RoleGateService<S> {
    inner: S,
    gate: Arc<RoleGate>,
}

impl<S> Service<Request<Body>> for RoleGateService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let gate = Arc::clone(&self.gate);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let identity = match gate.admit(req.headers()).await {
                Ok(identity) => identity,
                Err(rejection) => {
                    gate.metrics.record_rejection(&rejection.error);
                    return Ok(rejection.into_response());
                }
            };

            let principal = identity.principal().clone();
            debug!(
                user_id = %principal.user_id,
                role = %principal.role,
                via_session = identity.session_id().is_some(),
                "Management request admitted"
            );
            RequestContext::publish(req.extensions_mut(), |ctx| {
                ctx.user_id = Some(principal.user_id);
                ctx.username = Some(principal.username);
                ctx.role = Some(principal.role);
            });
            gate.metrics.record_admitted();

            inner.call(req).await
        })
    }
}
