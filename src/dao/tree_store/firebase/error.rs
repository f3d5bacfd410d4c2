//! Error types shared by the Firebase Realtime Database backend.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`FirebaseDaoError`] failures.
pub type FirebaseResult<T> = Result<T, FirebaseDaoError>;

/// Failures that can occur while talking to the Firebase REST API.
#[derive(Debug, Error)]
pub enum FirebaseDaoError {
    /// Required environment variable is missing.
    #[error("missing Firebase environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Firebase client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent or its body could not be read.
    #[error("failed to send Firebase request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Firebase answered with an unexpected status code.
    #[error("unexpected Firebase response status {status} for `{path}`")]
    RequestStatus { path: String, status: StatusCode },
    /// An event-stream payload was not valid JSON.
    #[error("failed to decode Firebase event for `{path}`")]
    DecodeEvent {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    /// The server cancelled the live subscription (rules changed, auth revoked...).
    #[error("Firebase subscription to `{path}` cancelled: {reason}")]
    SubscriptionCancelled { path: String, reason: String },
}
