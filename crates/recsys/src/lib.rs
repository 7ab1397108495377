//! # CityPulse Recsys
//!
//! The recommendation service: three candidate generators (profile text,
//! recent feedback, neighbor taste), a rescoring pass (time decay + jitter),
//! a fairness-aware blender, and the AMQP RPC surface that ties them
//! together.

pub mod blend;
pub mod candidates;
pub mod config;
pub mod rescore;
pub mod rpc;
pub mod service;

pub use blend::blend_groups;
pub use candidates::feedback::FeedbackCandidates;
pub use candidates::neighbors::NeighborCandidates;
pub use candidates::profile::ProfileCandidates;
pub use config::{RecommendConfig, RecsysConfig};
pub use rescore::rescore;
pub use service::RecommendationService;
