//! Route classification for relay endpoints.

/// Path prefixes whose requests must name a model.
pub const DEFAULT_MODEL_ROUTES: &[&str] = &[
    "/v1/completions",
    "/v1/chat/completions",
    "/v1/images",
    "/v1/audio",
];

/// Whether a request to `path` is rejected when no model can be extracted.
pub fn requires_model<S: AsRef<str>>(path: &str, prefixes: &[S]) -> bool {
    prefixes.iter().any(|p| path.starts_with(p.as_ref()))
}
