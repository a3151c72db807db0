//! Logic Module - Scoring & Governance Engines
//!
//! Hot path: `features` -> `scoring` (reads `model::ModelRegistry` snapshots).
//! Out-of-band: `training` -> `store` candidates -> `promotion` -> registry slots.

pub mod clock;
pub mod config;

pub mod features;
pub mod model;
pub mod scoring;

pub mod store;
pub mod telemetry;

pub mod training;
pub mod promotion;
