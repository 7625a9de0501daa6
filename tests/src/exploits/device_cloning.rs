//! # Device Cloning
//!
//! A leaked token copied to several machines. The first device to use it
//! owns it; every other device is rejected, including when all of them
//! race the very first request.

#[cfg(test)]
mod tests {
    use crate::harness::{chat, send, with_device, Harness};
    use axum::http::StatusCode;
    use relay_admission::{CapabilityToken, TokenId, UserId};
    use tower::ServiceExt;

    const LEAKED: TokenId = TokenId(900);

    fn leaked_token(h: &Harness) {
        h.tokens.insert(CapabilityToken::new(LEAKED, "leaked", UserId(1), "leaked"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_single_winner() {
        let h = Harness::new();
        leaked_token(&h);
        let router = h.relay_router(true);

        let requests = (0..32).map(|i| {
            let router = router.clone();
            tokio::spawn(async move {
                let req = with_device(chat("sk-leaked", "gpt-4"), &format!("clone-{i}"));
                router.oneshot(req).await.map(|res| res.status())
            })
        });
        let statuses: Vec<StatusCode> = futures::future::join_all(requests)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().unwrap())
            .collect();

        let admitted = statuses.iter().filter(|s| **s == StatusCode::OK).count();
        let rejected = statuses.iter().filter(|s| **s == StatusCode::FORBIDDEN).count();
        assert_eq!(admitted, 1);
        assert_eq!(rejected, 31);
        assert_eq!(h.tokens.bind_writes(), 1);

        // one registration, the rest are mismatches against the winner
        let reasons = h.audit.reasons();
        assert_eq!(reasons.len(), 32);
        assert_eq!(reasons.iter().filter(|r| *r == "first registration").count(), 1);
        let winner = h.tokens.get(LEAKED).unwrap().device_fingerprint.unwrap();
        assert!(reasons
            .iter()
            .filter(|r| r.starts_with("fingerprint mismatch"))
            .all(|r| r.contains(&winner)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_same_device_all_admitted() {
        let h = Harness::new();
        leaked_token(&h);
        let router = h.relay_router(true);

        let requests = (0..8).map(|_| {
            let router = router.clone();
            tokio::spawn(async move {
                let req = with_device(chat("sk-leaked", "gpt-4"), "owner-phone");
                router.oneshot(req).await.map(|res| res.status())
            })
        });
        for joined in futures::future::join_all(requests).await {
            assert_eq!(joined.unwrap().unwrap(), StatusCode::OK);
        }
        assert_eq!(h.tokens.bind_writes(), 1);
    }

    #[tokio::test]
    async fn test_near_miss_fingerprints_rejected() {
        let h = Harness::new();
        leaked_token(&h);

        let req = with_device(chat("sk-leaked", "gpt-4"), "device-X");
        let (status, _) = send(h.relay_router(true), req).await;
        assert_eq!(status, StatusCode::OK);

        for forged in ["device-x", "device-", "device-XX", "DEVICE-X"] {
            let req = with_device(chat("sk-leaked", "gpt-4"), forged);
            let (status, body) = send(h.relay_router(true), req).await;
            assert_eq!(status, StatusCode::FORBIDDEN, "{forged}");
            assert_eq!(body["message"], "device mismatch");
        }
    }

    #[tokio::test]
    async fn test_dropping_header_does_not_bypass() {
        let h = Harness::new();
        leaked_token(&h);

        let req = with_device(chat("sk-leaked", "gpt-4"), "device-X");
        let _ = send(h.relay_router(true), req).await;

        let (status, body) = send(h.relay_router(true), chat("sk-leaked", "gpt-4")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "missing device fingerprint");
        assert_eq!(h.handler_hits(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_token_unbound() {
        let h = Harness::new();
        leaked_token(&h);

        // fail-open: the first device gets through but nothing is stored
        h.tokens.set_fail_writes(true);
        let req = with_device(chat("sk-leaked", "gpt-4"), "device-X");
        let (status, ctx) = send(h.relay_router(true), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["fingerprint_outcome"], "unpersisted");

        // once the store recovers the next device becomes the owner
        h.tokens.set_fail_writes(false);
        let req = with_device(chat("sk-leaked", "gpt-4"), "device-Y");
        let (status, ctx) = send(h.relay_router(true), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ctx["fingerprint_outcome"], "first-registration");
        assert_eq!(h.service.metrics().to_json()["fingerprint"]["bind_failures"], 1);
    }
}
