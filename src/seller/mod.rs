//! Seller Readiness Validator
//!
//! Decides whether a seller may receive money at all: subscription state,
//! bound payout account, platform eligibility gate. The gate is three-state
//! (eligible / blocked / pending_review) and only `eligible` permits
//! payment creation.

pub mod models;
pub mod store;
pub mod validation;

pub use models::{
    PayoutConfig, PayoutEligibility, PayoutProfile, PayoutStatusUpdate, SellerReadiness,
};
pub use store::{PgSellerProfileStore, ProfileStoreError, SellerProfileStore};
pub use validation::SellerValidator;
