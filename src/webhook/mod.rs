//! Event Ingestion Gateway
//!
//! Verify-then-dispatch pipeline for inbound provider webhooks:
//!
//! 1. signature verification against a candidate secret set (one secret
//!    per currency-scoped platform account, plus an optional global
//!    fallback) — first match wins, 401 only when all fail
//! 2. idempotent recording keyed by (provider, provider_ref); the store's
//!    unique constraint serializes at-least-once deliveries
//! 3. type dispatch into per-kind handlers that post ledger journals and
//!    run domain side effects

pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod signature;
pub mod store;

pub use error::WebhookError;
pub use handlers::EventProcessor;
pub use models::{EventKind, PaymentTransaction, TransactionStatus, WebhookEvent};
pub use routes::{GatewayState, router};
pub use signature::{SignatureScheme, verify_signature};
pub use store::{PgTransactionStore, TransactionStore};
