//! Promotion Module - Artifact Lifecycle
//!
//! `candidate -> canary -> production -> backup`, with O(1) rollback to the
//! newest backup and deterministic fingerprint bucketing for canaries.

pub mod canary;
pub mod controller;
pub mod ring;
pub mod types;


pub use canary::{bucket, routes_to_canary, stable_hash64};
pub use controller::PromotionController;
pub use ring::BackupRing;
pub use types::{PromotionAction, PromotionRecord, PromotionTarget};
