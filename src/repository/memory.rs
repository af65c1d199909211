//! In-memory artwork repository.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::MetResult;
use crate::models::Artwork;

use super::ArtworkRepository;

/// HashMap-backed repository for tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryArtworkRepository {
    records: RwLock<HashMap<u64, Artwork>>,
}

impl MemoryArtworkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// All stored records, ordered by object id.
    pub async fn all(&self) -> Vec<Artwork> {
        let records = self.records.read().await;
        let mut all: Vec<Artwork> = records.values().cloned().collect();
        all.sort_by_key(|a| a.object_id);
        all
    }
}

#[async_trait]
impl ArtworkRepository for MemoryArtworkRepository {
    async fn upsert(&self, artwork: &Artwork) -> MetResult<Artwork> {
        let mut records = self.records.write().await;
        records.insert(artwork.object_id, artwork.clone());
        Ok(artwork.clone())
    }

    async fn find_by_object_id(&self, object_id: u64) -> MetResult<Option<Artwork>> {
        Ok(self.records.read().await.get(&object_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetObject;

    fn artwork(object_id: u64, title: &str) -> Artwork {
        Artwork::from_met(MetObject {
            object_id,
            title: title.to_string(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let repo = MemoryArtworkRepository::new();
        repo.upsert(&artwork(1, "first")).await.unwrap();
        repo.upsert(&artwork(1, "second")).await.unwrap();

        assert_eq!(repo.len().await, 1);
        let stored = repo.find_by_object_id(1).await.unwrap().unwrap();
        assert_eq!(stored.title, "second");
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let repo = MemoryArtworkRepository::new();
        assert!(repo.find_by_object_id(999).await.unwrap().is_none());
    }
}
