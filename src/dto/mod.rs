/// Board, sign-up and notification payloads.
pub mod board;
/// Health check payloads.
pub mod health;
/// Server-sent event envelopes.
pub mod sse;
/// Validation helpers for sign-up forms.
pub mod validation;
