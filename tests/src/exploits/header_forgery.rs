//! # Header Forgery
//!
//! Crafted `Authorization` values, spoofed `X-Forwarded-For` and role
//! escalation attempts against management routes.

#[cfg(test)]
mod tests {
    use crate::harness::{chat, from_peer, management, send, Harness, ADMIN_TOKEN};
    use axum::http::StatusCode;
    use relay_admission::{CapabilityToken, Role, TokenId, UserId};

    fn office_token(h: &Harness) {
        h.tokens.insert(
            CapabilityToken::new(TokenId(700), "office", UserId(1), "office")
                .with_subnet("10.0.0.0/8"),
        );
    }

    #[tokio::test]
    async fn test_spoofed_forwarded_for_from_untrusted_peer() {
        let h = Harness::new();
        office_token(&h);

        let mut req = from_peer(chat("sk-office", "gpt-4"), "203.0.113.9");
        req.headers_mut()
            .insert("X-Forwarded-For", "10.1.2.3".parse().unwrap());
        let (status, body) = send(h.relay_router(false), req).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body["message"].as_str().unwrap().contains("203.0.113.9"));
    }

    #[tokio::test]
    async fn test_forwarded_for_from_trusted_proxy() {
        let h = Harness::new();
        office_token(&h);

        let mut req = from_peer(chat("sk-office", "gpt-4"), "127.0.0.1");
        req.headers_mut()
            .insert("X-Forwarded-For", "10.1.2.3".parse().unwrap());
        let (status, _) = send(h.relay_router(false), req).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_extra_segments_ignored_for_channel() {
        let h = Harness::new();
        let (status, ctx) = send(h.relay_router(false), chat("Bearer sk-abc123-5-6-7", "gpt-4")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["channel_override"], 5);
        assert_eq!(ctx["token_id"], ADMIN_TOKEN.0);

        let (status, _) = send(h.relay_router(false), chat("Bearer sk-alicekey-5-6", "gpt-4")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_malformed_selectors() {
        let h = Harness::new();
        for auth in ["sk-abc123-99999999999", "sk-abc123-", "sk-abc123-+5", "sk-abc123-0x5"] {
            let (status, body) = send(h.relay_router(false), chat(auth, "gpt-4")).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{auth}");
            assert_eq!(body["kind"], "bad_request");
        }
        assert_eq!(h.handler_hits(), 0);
    }

    #[tokio::test]
    async fn test_empty_key_forms() {
        let h = Harness::new();
        for auth in ["Bearer ", "Bearer sk-", "sk--5", "-"] {
            let (status, res) = send(h.relay_router(false), chat(auth, "gpt-4")).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{auth}");
            assert_eq!(res["message"], "missing api key");
        }
    }

    #[tokio::test]
    async fn test_relay_token_is_not_a_management_credential() {
        let h = Harness::new();
        let (status, body) = send(h.management_router(Role::CommonUser), management(None, Some("Bearer sk-abc123"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "access token is invalid");
        assert_eq!(h.handler_hits(), 0);
    }

    #[tokio::test]
    async fn test_common_user_cannot_reach_root_routes() {
        let h = Harness::new();
        for (cookie, auth) in [(Some("alice-session"), None), (None, Some("alice-access"))] {
            let (status, body) = send(h.management_router(Role::RootUser), management(cookie, auth)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["message"], "insufficient privilege");
        }
        assert_eq!(h.handler_hits(), 0);
    }

    #[tokio::test]
    async fn test_forged_session_cookie_falls_through() {
        let h = Harness::new();
        let (status, body) = send(h.management_router(Role::CommonUser), management(Some("guessed"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["kind"], "unauthenticated");
    }
}
