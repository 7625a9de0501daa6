//! Admission service: validated configuration, collaborators and metrics,
//! handing out the gate layers and mounting them on axum routers.

use crate::domain::config::AdmissionConfig;
use crate::domain::{GatewayError, Role};
use crate::middleware::{
    AdmissionMetrics, ClientIpLayer, FingerprintLayer, PrincipalResolver, RoleGateLayer,
    TokenGateLayer,
};
use crate::ports::Collaborators;
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

/// Admission gate wiring
pub struct AdmissionService {
    config: AdmissionConfig,
    collaborators: Collaborators,
    metrics: Arc<AdmissionMetrics>,
}

impl AdmissionService {
    pub fn new(config: AdmissionConfig, collaborators: Collaborators) -> Result<Self, GatewayError> {
        config
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))?;

        info!(
            fingerprint_header = %config.fingerprint.header,
            bind_failure = ?config.fingerprint.on_bind_failure,
            deadline = ?config.timeouts.collaborator,
            "Admission service configured"
        );

        Ok(Self {
            config,
            collaborators,
            metrics: Arc::new(AdmissionMetrics::new()),
        })
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    /// Get metrics
    pub fn metrics(&self) -> Arc<AdmissionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn principal_resolver(&self) -> PrincipalResolver {
        PrincipalResolver::new(
            Arc::clone(&self.collaborators.sessions),
            Arc::clone(&self.collaborators.accounts),
            self.config.session.cookie_name.clone(),
            self.config.timeouts.collaborator,
        )
    }

    /// Management gate requiring at least `min_role`
    pub fn role_gate(&self, min_role: Role) -> RoleGateLayer {
        RoleGateLayer::new(
            min_role,
            self.principal_resolver(),
            self.collaborators.policy.clone(),
            Arc::clone(&self.metrics),
        )
    }

    pub fn user_auth(&self) -> RoleGateLayer {
        self.role_gate(Role::CommonUser)
    }

    pub fn admin_auth(&self) -> RoleGateLayer {
        self.role_gate(Role::AdminUser)
    }

    pub fn root_auth(&self) -> RoleGateLayer {
        self.role_gate(Role::RootUser)
    }

    pub fn token_auth(&self) -> TokenGateLayer {
        TokenGateLayer::new(
            self.config.relay.clone(),
            self.config.timeouts.collaborator,
            &self.collaborators,
            Arc::clone(&self.metrics),
        )
    }

    pub fn device_binding(&self) -> FingerprintLayer {
        FingerprintLayer::new(
            self.config.fingerprint.clone(),
            self.config.timeouts.collaborator,
            &self.collaborators,
            Arc::clone(&self.metrics),
        )
    }

    pub fn client_ip(&self) -> ClientIpLayer {
        ClientIpLayer::new(self.config.security.clone())
    }

    /// ClientIp → TokenGate → Fingerprint (when `bind_device`) → handlers
    pub fn protect_relay<S>(&self, router: Router<S>, bind_device: bool) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let router = if bind_device {
            router.layer(self.device_binding())
        } else {
            router
        };

        let middleware = ServiceBuilder::new()
            .layer(self.client_ip())
            .layer(self.token_auth());
        router.layer(middleware)
    }

    /// ClientIp → RoleGate(`min_role`) → handlers
    pub fn protect_management<S>(&self, router: Router<S>, min_role: Role) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let middleware = ServiceBuilder::new()
            .layer(self.client_ip())
            .layer(self.role_gate(min_role));
        router.layer(middleware)
    }
}
