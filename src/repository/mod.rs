//! Persistence boundary for imported artworks.
//!
//! The client only needs two operations from the surrounding application:
//! an idempotent upsert keyed by the external object id, and a lookup by
//! that id. [`MemoryArtworkRepository`] backs tests and the CLI.

mod memory;

use async_trait::async_trait;

pub use memory::MemoryArtworkRepository;

use crate::error::MetResult;
use crate::models::Artwork;

/// Store for imported artwork records, keyed by external object id.
#[async_trait]
pub trait ArtworkRepository: Send + Sync {
    /// Insert or update the record for `artwork.object_id`.
    ///
    /// Must be idempotent: repeated upserts for the same id update fields
    /// in place and never create duplicates. Returns the stored record.
    async fn upsert(&self, artwork: &Artwork) -> MetResult<Artwork>;

    /// Look up a previously imported record.
    async fn find_by_object_id(&self, object_id: u64) -> MetResult<Option<Artwork>>;
}
