//! # Integration Test Flows
//!
//! Relay requests: client IP → token gate → fingerprint binder → handler.
//! Management requests: client IP → role gate → handler.

#[cfg(test)]
mod tests {
    use crate::harness::{chat, from_peer, management, send, with_device, Harness, ADMIN_TOKEN, USER_TOKEN};
    use axum::http::StatusCode;
    use relay_admission::{AdmissionConfig, CapabilityToken, Role, Status, TokenId, UserId};

    // =============================================================================
    // RELAY: CHANNEL PINNING
    // =============================================================================

    #[tokio::test]
    async fn test_admin_token_pins_channel() {
        let h = Harness::new();
        let (status, ctx) = send(h.relay_router(false), chat("Bearer sk-abc123-5", "gpt-4")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["channel_override"], 5);
        assert_eq!(ctx["token_id"], ADMIN_TOKEN.0);
        assert_eq!(ctx["user_id"], 2);
        assert_eq!(ctx["requested_model"], "gpt-4");
    }

    #[tokio::test]
    async fn test_user_token_cannot_pin_channel() {
        let h = Harness::new();
        let (status, body) = send(h.relay_router(false), chat("Bearer sk-alicekey-5", "gpt-4")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "channel pinning requires admin");
        assert_eq!(h.handler_hits(), 0);

        let (status, ctx) = send(h.relay_router(false), chat("Bearer sk-alicekey", "gpt-4")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["token_id"], USER_TOKEN.0);
        assert!(ctx["channel_override"].is_null());
    }

    // =============================================================================
    // RELAY: DEVICE BINDING
    // =============================================================================

    #[tokio::test]
    async fn test_first_registration_then_forgery() {
        let h = Harness::new();
        h.tokens.insert(CapabilityToken::new(TokenId(300), "phone", UserId(1), "phone"));

        let req = with_device(chat("Bearer sk-phone", "gpt-4"), "device-X");
        let (status, ctx) = send(h.relay_router(true), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["fingerprint_outcome"], "first-registration");
        assert_eq!(h.audit.reasons(), vec!["first registration"]);
        assert_eq!(
            h.tokens.get(TokenId(300)).unwrap().device_fingerprint.as_deref(),
            Some("device-X")
        );

        let req = with_device(chat("Bearer sk-phone", "gpt-4"), "device-Y");
        let (status, body) = send(h.relay_router(true), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "device mismatch");

        let records = h.audit.records();
        assert_eq!(records.len(), 2);
        assert!(records[1].reason.contains("device-X"));
        assert!(records[1].reason.contains("device-Y"));
        assert_eq!(records[1].token_id, TokenId(300));
        assert_eq!(records[1].user_id, UserId(1));
        assert_eq!(records[1].model, "gpt-4");

        // the stored binding never moves
        assert_eq!(
            h.tokens.get(TokenId(300)).unwrap().device_fingerprint.as_deref(),
            Some("device-X")
        );

        let req = with_device(chat("Bearer sk-phone", "gpt-4"), "device-X");
        let (status, ctx) = send(h.relay_router(true), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["fingerprint_outcome"], "routine");
        assert_eq!(h.audit.reasons().last().map(String::as_str), Some("routine request"));
    }

    #[tokio::test]
    async fn test_binding_skipped_on_unbound_routes() {
        let h = Harness::new();
        let (status, _) = send(h.relay_router(false), chat("sk-abc123", "gpt-4")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!h.tokens.get(ADMIN_TOKEN).unwrap().is_bound());
        assert!(h.audit.records().is_empty());
    }

    #[tokio::test]
    async fn test_custom_header_and_fail_closed() {
        let config = AdmissionConfig::from_json(
            r#"{
                "fingerprint": { "header": "X-Device-Id", "on_bind_failure": "fail_closed" },
                "timeouts": { "collaborator": "250ms" }
            }"#,
        )
        .unwrap();
        let h = Harness::with_config(config);

        // default header name is not consulted any more
        let req = with_device(chat("sk-abc123", "gpt-4"), "device-X");
        let (status, _) = send(h.relay_router(true), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        h.tokens.set_fail_writes(true);
        let mut req = chat("sk-abc123", "gpt-4");
        req.headers_mut().insert("X-Device-Id", "device-X".parse().unwrap());
        let (status, body) = send(h.relay_router(true), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(h.handler_hits(), 0);
    }

    // =============================================================================
    // RELAY: SUBNET AND MODEL RESTRICTIONS
    // =============================================================================

    #[tokio::test]
    async fn test_subnet_restriction() {
        let h = Harness::new();
        h.tokens.insert(
            CapabilityToken::new(TokenId(300), "office", UserId(1), "office").with_subnet("10.0.0.0/8"),
        );

        let req = from_peer(chat("sk-office", "gpt-4"), "10.1.2.3");
        let (status, _) = send(h.relay_router(false), req).await;
        assert_eq!(status, StatusCode::OK);

        let req = from_peer(chat("sk-office", "gpt-4"), "192.168.1.1");
        let (status, body) = send(h.relay_router(false), req).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let message = body["message"].as_str().unwrap();
        assert!(message.contains("10.0.0.0/8"), "{message}");
        assert!(message.contains("192.168.1.1"), "{message}");
    }

    #[tokio::test]
    async fn test_model_allowlist() {
        let h = Harness::new();
        h.tokens.insert(
            CapabilityToken::new(TokenId(300), "scoped", UserId(1), "scoped").with_models("a,b"),
        );

        for model in ["a", "b"] {
            let (status, ctx) = send(h.relay_router(false), chat("sk-scoped", model)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(ctx["requested_model"], model);
        }

        let (status, body) = send(h.relay_router(false), chat("sk-scoped", "c")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["message"].as_str().unwrap().starts_with("model not permitted"));

        // listing models needs no model name
        let req = axum::http::Request::builder()
            .uri("/v1/models")
            .header("Authorization", "sk-scoped")
            .body(axum::body::Body::empty())
            .unwrap();
        let (status, ctx) = send(h.relay_router(false), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["available_models"], serde_json::json!(["a", "b"]));
    }

    #[tokio::test]
    async fn test_image_route_default_model() {
        let h = Harness::new();
        let req = axum::http::Request::builder()
            .method("POST")
            .uri("/v1/images/generations")
            .header("Authorization", "sk-abc123")
            .body(axum::body::Body::from(r#"{"prompt":"a cat"}"#))
            .unwrap();
        let (status, ctx) = send(h.relay_router(false), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["requested_model"], "dall-e-2");
    }

    #[tokio::test]
    async fn test_disabled_owner_rejected() {
        let h = Harness::new();
        h.accounts.set_status(UserId(1), Status::Disabled);
        let (status, body) = send(h.relay_router(false), chat("sk-alicekey", "gpt-4")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "account banned");

        let (status, body) = send(h.relay_router(false), chat("sk-unknown", "gpt-4")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthenticated");
    }

    // =============================================================================
    // MANAGEMENT: ROLE GATE
    // =============================================================================

    #[tokio::test]
    async fn test_role_tiers() {
        let h = Harness::new();

        let (status, ctx) = send(h.management_router(Role::CommonUser), management(Some("alice-session"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["username"], "alice");

        let (status, body) = send(h.management_router(Role::AdminUser), management(Some("alice-session"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "insufficient privilege");

        let (status, ctx) = send(h.management_router(Role::RootUser), management(None, Some("root-access"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["role"], "root_user");

        assert_eq!(h.handler_hits(), 2);
    }

    #[tokio::test]
    async fn test_ban_forces_reauthentication() {
        let h = Harness::new();
        h.accounts.ban(UserId(2));

        let (status, body) = send(h.management_router(Role::CommonUser), management(Some("bob-session"), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "account banned");
        assert!(!h.accounts.has_session("bob-session"));

        h.accounts.unban(UserId(2));
        let (status, _) = send(h.management_router(Role::CommonUser), management(Some("bob-session"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_metrics_snapshot() {
        let h = Harness::new();
        let _ = send(h.relay_router(false), chat("sk-abc123", "gpt-4")).await;
        let _ = send(h.relay_router(false), chat("sk-nope", "gpt-4")).await;
        let _ = send(h.management_router(Role::RootUser), management(Some("alice-session"), None)).await;

        let snapshot = h.service.metrics().to_json();
        assert_eq!(snapshot["admitted_total"], 1);
        assert_eq!(snapshot["rejected"]["unauthenticated"], 1);
        assert_eq!(snapshot["rejected"]["forbidden"], 1);
        assert_eq!(snapshot["rejected"]["total"], 2);
    }
}
