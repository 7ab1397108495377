//! Candidate generation
//!
//! Three independent generators feed the blender, each tagging its output
//! with the subsystem it came from:
//!
//! - [`profile::ProfileCandidates`] (`BASIC`): similarity search seeded by
//!   the user's profile text
//! - [`feedback::FeedbackCandidates`] (`DYNAMIC`): signed recommend seeded
//!   by the user's recent clicks, likes and dislikes
//! - [`neighbors::NeighborCandidates`] (`COLLABORATIVE`): similarity search
//!   seeded by the averaged taste vector of users who touched the same
//!   events
//!
//! Generators share no mutable state and run concurrently inside a request;
//! any one of them failing degrades to an empty list at the join point.

pub mod feedback;
pub mod neighbors;
pub mod profile;
