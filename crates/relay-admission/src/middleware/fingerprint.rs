//! Device fingerprint binding.
//!
//! A token starts unbound. The first request through this layer binds it to
//! the fingerprint it presents; every later request must present the same
//! value. The unbound to bound transition is the token store's
//! compare-and-set, so concurrent first uses produce one winner and the
//! losers are judged against the winner's value.
//!
//! Every decision appends exactly one audit record. Audit writes never
//! change the verdict.

use super::{with_deadline, AdmissionMetrics, BoxFuture};
use crate::domain::audit::{
    mismatch_reason, FIRST_REGISTRATION, MISSING_FINGERPRINT, ROUTINE_REQUEST,
    UNPERSISTED_REGISTRATION,
};
use crate::domain::config::FingerprintConfig;
use crate::domain::{
    AuditRecord, BindFailurePolicy, CapabilityToken, FingerprintOutcome, GateError, Rejection,
    RequestContext, ResolvedToken,
};
use crate::ports::{AuditLog, BindOutcome, Clock, Collaborators, TokenStore};
use axum::{
    body::Body,
    http::Request,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Duration;
use tower::{Layer, Service};
use tracing::{debug, error, warn};

/// Constant-time string comparison.
///
/// Both inputs are padded to the longer length with different fill bytes,
/// so unequal lengths never compare equal and the loop length does not
/// depend on where the first difference is.
pub fn fingerprints_match(bound: &str, presented: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(bound.len(), presented.len());
    let mut a = vec![0u8; max_len];
    let mut b = vec![0xFFu8; max_len];
    a[..bound.len()].copy_from_slice(bound.as_bytes());
    b[..presented.len()].copy_from_slice(presented.as_bytes());

    let lengths_equal = bound.len().ct_eq(&presented.len());
    let contents_equal = a.ct_eq(&b);
    (lengths_equal & contents_equal).into()
}

struct Binder {
    config: FingerprintConfig,
    tokens: Arc<dyn TokenStore>,
    audit: Arc<dyn AuditLog>,
    clock: Arc<dyn Clock>,
    deadline: Duration,
    metrics: Arc<AdmissionMetrics>,
}

impl Binder {
    async fn decide(
        &self,
        ctx: &RequestContext,
        token: &CapabilityToken,
        presented: Option<String>,
    ) -> Result<(String, FingerprintOutcome), GateError> {
        let Some(presented) = presented.filter(|f| !f.is_empty()) else {
            self.audit(ctx, token, MISSING_FINGERPRINT.to_string()).await;
            return Err(GateError::BadRequest(MISSING_FINGERPRINT.to_string()));
        };

        let bound = match &token.device_fingerprint {
            Some(bound) => bound.clone(),
            None => {
                let written = with_deadline(
                    self.deadline,
                    "token store",
                    self.tokens.bind_fingerprint(token.id, &presented),
                )
                .await
                .and_then(|r| r);

                match written {
                    Ok(BindOutcome::Bound) => {
                        self.metrics.record_bound();
                        debug!(token_id = %token.id, "Token bound to device");
                        self.audit(ctx, token, FIRST_REGISTRATION.to_string()).await;
                        return Ok((presented, FingerprintOutcome::FirstRegistration));
                    }
                    // Lost the race: judge against the winner's value
                    Ok(BindOutcome::AlreadyBound(existing)) => existing,
                    Err(e) => return self.bind_failed(ctx, token, presented, e.into()).await,
                }
            }
        };

        if fingerprints_match(&bound, &presented) {
            self.audit(ctx, token, ROUTINE_REQUEST.to_string()).await;
            return Ok((presented, FingerprintOutcome::Routine));
        }

        self.metrics.record_mismatch();
        warn!(token_id = %token.id, user_id = %token.owner, "Device fingerprint mismatch");
        self.audit(ctx, token, mismatch_reason(&bound, &presented)).await;
        Err(GateError::Forbidden("device mismatch".into()))
    }

    async fn bind_failed(
        &self,
        ctx: &RequestContext,
        token: &CapabilityToken,
        presented: String,
        err: GateError,
    ) -> Result<(String, FingerprintOutcome), GateError> {
        self.metrics.record_bind_failure();
        error!(
            token_id = %token.id,
            error = %err,
            policy = ?self.config.on_bind_failure,
            "Failed to persist device binding"
        );
        self.audit(ctx, token, UNPERSISTED_REGISTRATION.to_string()).await;

        match self.config.on_bind_failure {
            BindFailurePolicy::FailOpen => Ok((presented, FingerprintOutcome::Unpersisted)),
            BindFailurePolicy::FailClosed => Err(err),
        }
    }

    /// Best-effort usage record
    async fn audit(&self, ctx: &RequestContext, token: &CapabilityToken, reason: String) {
        let record = AuditRecord {
            request_id: ctx.request_id,
            recorded_at: self.clock.now(),
            user_id: token.owner,
            channel_id: ctx.audit_channel(),
            token_id: token.id,
            token_name: token.name.clone(),
            model: ctx.requested_model.clone().unwrap_or_default(),
            prompt_tokens: 0,
            completion_tokens: 0,
            cost: 0,
            reason,
        };
        let written = with_deadline(self.deadline, "audit log", self.audit.record(record))
            .await
            .and_then(|r| r);
        if let Err(e) = written {
            self.metrics.record_audit_failure();
            warn!(token_id = %token.id, error = %e, "Failed to write audit record");
        }
    }
}

/// Fingerprint binder layer. Must run after the token gate.
#[derive(Clone)]
pub struct FingerprintLayer {
    binder: Arc<Binder>,
}

impl FingerprintLayer {
    pub fn new(
        config: FingerprintConfig,
        deadline: Duration,
        collaborators: &Collaborators,
        metrics: Arc<AdmissionMetrics>,
    ) -> Self {
        Self {
            binder: Arc::new(Binder {
                config,
                tokens: Arc::clone(&collaborators.tokens),
                audit: Arc::clone(&collaborators.audit),
                clock: Arc::clone(&collaborators.clock),
                deadline,
                metrics,
            }),
        }
    }
}

impl<S> Layer<S> for FingerprintLayer {
    type Service = FingerprintService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        FingerprintService {
            inner,
            binder: Arc::clone(&self.binder),
        }
    }
}

/// Fingerprint binder service
#[derive(Clone)]
pub struct FingerprintService<S> {
    inner: S,
    binder: Arc<Binder>,
}

impl<S> Service<Request<Body>> for FingerprintService<S>
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
        let binder = Arc::clone(&self.binder);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let ctx = req.extensions().get::<RequestContext>().cloned();
            let token = req.extensions().get::<ResolvedToken>().map(|t| t.0.clone());
            let (Some(ctx), Some(token)) = (ctx, token) else {
                error!(path = %req.uri().path(), "Device binding reached without a resolved token");
                let err = GateError::Internal("device binding requires a resolved token".into());
                binder.metrics.record_rejection(&err);
                return Ok(Rejection::new(err).into_response());
            };

            let presented = req
                .headers()
                .get(binder.config.header.as_str())
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string());

            let (fingerprint, outcome) = match binder.decide(&ctx, &token, presented).await {
                Ok(verdict) => verdict,
                Err(err) => {
                    binder.metrics.record_rejection(&err);
                    return Ok(Rejection::new(err).into_response());
                }
            };

            debug!(token_id = %token.id, outcome = %outcome, "Device check passed");
            RequestContext::publish(req.extensions_mut(), |ctx| {
                ctx.device_fingerprint = Some(fingerprint);
                ctx.fingerprint_outcome = Some(outcome);
            });

            inner.call(req).await
        })
    }
}
