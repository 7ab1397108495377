//! Clients for the external stores the recommender collaborates with
//!
//! Each store is fronted by an async trait so services can be wired with
//! in-memory fakes in tests. The concrete clients are process-wide, created
//! once at startup, and safe for concurrent use.

pub mod behavior;
pub mod catalog;
pub mod embedding;
pub mod vector;
