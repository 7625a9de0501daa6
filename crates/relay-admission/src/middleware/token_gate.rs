//! Capability token authentication for relay routes.
//!
//! Check order: credential → key lookup → subnet → owner enabled/banned →
//! model extraction → model allowlist → channel pinning. The first failure
//! stops the request. On success the gate publishes the token's identity,
//! the requested model and any channel override, and attaches the
//! [`ResolvedToken`] for the fingerprint binder.

use super::{with_deadline, AdmissionMetrics, BoxFuture};
use crate::domain::config::RelayConfig;
use crate::domain::principal::ACCOUNT_BANNED;
use crate::domain::routes::requires_model;
use crate::domain::{
    BearerCredential, CapabilityToken, ChannelId, ClientIp, GateError, Rejection, RequestContext,
    ResolvedToken,
};
use crate::ports::{
    AccountPolicy, Collaborators, ModelExtractor, RequestSnapshot, SubnetMatcher, TokenStore,
};
use axum::{
    body::{Body, HttpBody},
    extract::ConnectInfo,
    http::{header, Request},
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, Service};
use tracing::{debug, error, warn};

/// Verdict of a passed token gate, staged until publication
struct Admitted {
    token: CapabilityToken,
    model: String,
    channel: Option<ChannelId>,
}

struct TokenGate {
    tokens: Arc<dyn TokenStore>,
    subnets: Arc<dyn SubnetMatcher>,
    policy: AccountPolicy,
    models: Arc<dyn ModelExtractor>,
    relay: RelayConfig,
    deadline: Duration,
    metrics: Arc<AdmissionMetrics>,
}

impl TokenGate {
    async fn admit(&self, req: &mut Request<Body>) -> Result<Admitted, GateError> {
        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        let credential = BearerCredential::parse(authorization)?;

        let token = with_deadline(self.deadline, "token store", self.tokens.find_by_key(&credential.key))
            .await?
            .map_err(|e| GateError::Unauthenticated(e.to_string()))?;

        if let Some(subnets) = &token.subnet_restriction {
            self.check_subnet(client_ip(req), subnets).await?;
        }

        let enabled = with_deadline(
            self.deadline,
            "user status cache",
            self.policy.is_enabled(token.owner),
        )
        .await??;
        let banned = enabled
            && with_deadline(self.deadline, "ban registry", self.policy.is_banned(token.owner)).await?;
        if !enabled || banned {
            return Err(GateError::Forbidden(ACCOUNT_BANNED.to_string()));
        }

        let model = self.extract_model(req).await?;

        if let Some(allowed) = &token.allowed_models {
            if !model.is_empty() && !allowed.contains(&model) {
                return Err(GateError::Forbidden(format!("model not permitted: {model}")));
            }
        }

        if credential.channel_selector.is_some() {
            let admin = with_deadline(self.deadline, "admin directory", self.policy.is_admin(token.owner))
                .await?;
            if !admin {
                return Err(GateError::Forbidden("channel pinning requires admin".into()));
            }
        }

        Ok(Admitted {
            token,
            model,
            channel: credential.channel_selector,
        })
    }

    async fn check_subnet(&self, ip: Option<IpAddr>, subnets: &str) -> Result<(), GateError> {
        let allowed = match ip {
            Some(ip) => {
                with_deadline(self.deadline, "subnet matcher", self.subnets.contains(ip, subnets))
                    .await?
            }
            None => false,
        };
        if allowed {
            return Ok(());
        }
        let observed = ip.map_or_else(|| "unknown".to_string(), |ip| ip.to_string());
        Err(GateError::Forbidden(format!(
            "token may only be used from subnet {subnets}, current ip: {observed}"
        )))
    }

    /// Buffer the body, hand a copy to the extractor and put it back.
    ///
    /// A body declared larger than `max_body_size` is never buffered: model
    /// routes reject it, other routes pass it through with an empty model.
    /// A body that only turns out oversized while reading is consumed, so it
    /// is rejected on every route.
    async fn extract_model(&self, req: &mut Request<Body>) -> Result<String, GateError> {
        let path = req.uri().path().to_string();
        let model_route = requires_model(&path, &self.relay.model_required_prefixes);

        if declared_length(req).is_some_and(|len| len > self.relay.max_body_size as u64) {
            let reason = format!("request body exceeds {} bytes", self.relay.max_body_size);
            return unextracted(&path, model_route, reason);
        }

        let body = std::mem::replace(req.body_mut(), Body::empty());
        let bytes = axum::body::to_bytes(body, self.relay.max_body_size)
            .await
            .map_err(|e| GateError::BadRequest(format!("failed to read request body: {e}")))?;
        *req.body_mut() = Body::from(bytes.clone());

        let snapshot = RequestSnapshot {
            method: req.method().clone(),
            path,
            headers: req.headers().clone(),
            body: bytes,
        };

        match with_deadline(self.deadline, "model extractor", self.models.extract(&snapshot)).await? {
            Ok(model) => Ok(model),
            Err(e) => unextracted(&snapshot.path, model_route, e.to_string()),
        }
    }
}

/// No model could be read: fatal on model routes, empty elsewhere
fn unextracted(path: &str, model_route: bool, reason: String) -> Result<String, GateError> {
    if model_route {
        return Err(GateError::BadRequest(reason));
    }
    debug!(path, error = %reason, "No model on optional route");
    Ok(String::new())
}

/// Body length from `Content-Length`, else an exact size hint
fn declared_length(req: &Request<Body>) -> Option<u64> {
    req.headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .or_else(|| req.body().size_hint().exact())
}

/// Resolved client address, falling back to the socket peer
fn client_ip<B>(req: &Request<B>) -> Option<IpAddr> {
    req.extensions()
        .get::<ClientIp>()
        .map(|c| c.0)
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip())
        })
}

/// Token gate layer
#[derive(Clone)]
pub struct TokenGateLayer {
    gate: Arc<TokenGate>,
}

impl TokenGateLayer {
    pub fn new(
        relay: RelayConfig,
        deadline: Duration,
        collaborators: &Collaborators,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        Self {
            gate: Arc::new(TokenGate {
                tokens: Arc::clone(&collaborators.tokens),
                subnets: Arc::clone(&collaborators.subnets),
                policy: collaborators.policy.clone(),
                models: Arc::clone(&collaborators.models),
                relay,
                deadline,
                metrics,
            }),
        }
    }
}

impl<S> Layer<S> for TokenGateLayer {
    type Service = TokenGateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TokenGateService {
            inner,
            gate: Arc::clone(&self.gate),
        }
    }
}

/// Token gate service
#[derive(Clone)]
pub struct TokenGateService<S> {
    inner: S,
    gate: Arc<TokenGate>,
}

impl<S> Service<Request<Body>> for TokenGateService<S>
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
            let admitted = match gate.admit(&mut req).await {
                Ok(admitted) => admitted,
                Err(err) => {
                    if matches!(err, GateError::Internal(_)) {
                        error!(path = %req.uri().path(), error = %err, "Token gate collaborator failed");
                    } else {
                        warn!(path = %req.uri().path(), reason = err.reason(), "Relay request rejected");
                    }
                    gate.metrics.record_rejection(&err);
                    return Ok(Rejection::new(err).into_response());
                }
            };

            let Admitted {
                token,
                model,
                channel,
            } = admitted;
            debug!(
                token_id = %token.id,
                user_id = %token.owner,
                model = %model,
                channel = ?channel,
                "Relay request admitted"
            );

            RequestContext::publish(req.extensions_mut(), |ctx| {
                ctx.user_id = Some(token.owner);
                ctx.token_id = Some(token.id);
                ctx.token_name = Some(token.name.clone());
                ctx.requested_model = Some(model);
                ctx.available_models = token.allowed_models.clone();
                ctx.channel_override = channel;
            });
            req.extensions_mut().insert(ResolvedToken(token));
            gate.metrics.record_admitted();

            inner.call(req).await
        })
    }
}
