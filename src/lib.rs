//! Library crate for matchday-board, exposing modules for binaries and integration tests.

/// Runtime configuration loading.
pub mod config;
/// Persistence layer: tree store abstraction and backends.
pub mod dao;
/// Request and response payloads.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum routers.
pub mod routes;
/// Business services called by the routes.
pub mod services;
/// Shared application state and the board session.
pub mod state;
