//! metlink - resilient client for the Metropolitan Museum of Art collection API.
//!
//! Mediates all traffic to the MET's public, unauthenticated collection
//! endpoints behind a sliding-window request scheduler, a bounded retry
//! policy with exponential backoff, and a TTL response cache with negative
//! caching. The top-level [`client::MetClient`] exposes search, object
//! fetch, batched/progressive fetch, and import-with-persistence.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;

pub use client::{
    BatchProgress, FetchOptions, ManyResult, MetClient, ProgressiveOptions, SchedulerStatus,
};
pub use config::MetConfig;
pub use error::{MetError, MetResult};
pub use models::Artwork;
