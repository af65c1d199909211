//! MET collection API client.
//!
//! Composes the request scheduler, retry policy, and response cache into
//! the operations the rest of the system consumes: search, single-object
//! fetch with in-flight deduplication, sequential and progressive batch
//! fetch, and import-with-persistence.

mod cache;
mod headers;
mod retry;
mod scheduler;
mod transport;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub use cache::{CacheStats, CacheValue, ResponseCache};
pub use headers::{resolve_provider, BrowserHeaders, HeaderProvider, StaticHeaders};
pub use retry::RetryPolicy;
pub use scheduler::{RequestScheduler, SchedulerConfig, SchedulerStatus};
pub use transport::{FetchResponse, HttpFetch, ReqwestFetch};

use crate::config::MetConfig;
use crate::error::{MetError, MetResult};
use crate::models::{Artwork, MetObject, SearchResponse};
use crate::repository::ArtworkRepository;

/// Options for batch fetch operations.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Skip records without a usable preview image.
    pub require_image: bool,
    /// Consult scheduler status every this many items (0 disables).
    pub pause_every: usize,
    /// Remaining-quota level that triggers an adaptive pause.
    pub low_quota_threshold: usize,
    /// Pause inserted when the remaining quota is low.
    pub quota_pause: Duration,
    /// Extended pause after a transient failure mid-batch.
    pub transient_pause: Duration,
    /// Cooperative cancellation flag, checked between items and batches.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            require_image: true,
            pause_every: 5,
            low_quota_threshold: 5,
            quota_pause: Duration::from_secs(2),
            transient_pause: Duration::from_secs(10),
            cancel: None,
        }
    }
}

impl FetchOptions {
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Options for [`MetClient::get_many_progressive`].
#[derive(Debug, Clone)]
pub struct ProgressiveOptions {
    /// Ids processed per batch before the progress callback fires.
    pub batch_size: usize,
    /// Pause between batches (not after the last).
    pub batch_pause: Duration,
    pub fetch: FetchOptions,
}

impl Default for ProgressiveOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_pause: Duration::from_millis(500),
            fetch: FetchOptions::default(),
        }
    }
}

/// One failed item from a batch fetch.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    pub object_id: u64,
    pub error: String,
}

/// Outcome of a batch fetch: successfully normalized records in input
/// order (skipped items omitted), plus per-item permanent failures.
#[derive(Debug, Clone, Default)]
pub struct ManyResult {
    pub records: Vec<Artwork>,
    pub failures: Vec<BatchFailure>,
}

/// Progress snapshot delivered after each progressive batch.
#[derive(Debug)]
pub struct BatchProgress<'a> {
    pub items_processed: usize,
    pub total_items: usize,
    /// Records resolved by the batch that just completed.
    pub batch_records: &'a [Artwork],
    /// 1-based batch counter.
    pub batch_number: usize,
    pub total_batches: usize,
    /// Fraction of items processed, in `0.0..=1.0`.
    pub progress: f64,
    pub is_complete: bool,
}

/// Client for the MET collection API.
///
/// Owns the only mutable shared state in this layer (scheduler tickets,
/// response cache, pending-request map). Construct once at application
/// start and share by reference; tests construct isolated instances.
pub struct MetClient {
    config: MetConfig,
    scheduler: RequestScheduler,
    retry: RetryPolicy,
    cache: ResponseCache,
    headers: Arc<dyn HeaderProvider>,
    http: Arc<dyn HttpFetch>,
    /// In-flight object fetches, so concurrent callers for the same id
    /// share one upstream call. Entries are removed unconditionally when
    /// the fetch completes.
    pending: Mutex<HashMap<u64, Arc<Mutex<()>>>>,
}

impl MetClient {
    /// Create a client with the reqwest transport.
    pub fn new(config: MetConfig) -> Self {
        let http = Arc::new(ReqwestFetch::new(config.request_timeout));
        Self::with_transport(config, http)
    }

    /// Create a client with an injected transport (used by tests).
    pub fn with_transport(config: MetConfig, http: Arc<dyn HttpFetch>) -> Self {
        let scheduler = RequestScheduler::new(SchedulerConfig {
            max_requests: config.max_requests,
            time_window: config.time_window,
            min_interval: config.min_interval,
            window_margin: config.window_margin,
        });
        let retry = RetryPolicy::new(config.max_retries, config.backoff_base, config.backoff_max);
        let headers = resolve_provider(config.user_agent.as_deref());
        Self {
            config,
            scheduler,
            retry,
            cache: ResponseCache::new(),
            headers,
            http,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Search the catalog by free-text query.
    ///
    /// Returns matching object ids; a missing or empty upstream id list is
    /// zero matches, not an error. Results are cached under the normalized
    /// query plus image flag.
    pub async fn search(&self, query: &str, has_images: bool) -> MetResult<Vec<u64>> {
        let normalized = query.trim().to_lowercase();
        let key = format!("search:{normalized}:{has_images}");
        if let Some(CacheValue::Ids(ids)) = self.cache.get(&key).await {
            debug!(query = %normalized, count = ids.len(), "search cache hit");
            return Ok(ids);
        }

        let url = format!(
            "{}/search?hasImages={}&q={}",
            self.config.base_url,
            has_images,
            urlencoding::encode(&normalized)
        );
        let ids = self.fetch_id_list(&url).await?;
        info!(query = %normalized, count = ids.len(), "catalog search completed");

        let ttl = if ids.is_empty() {
            self.config.empty_ttl
        } else {
            self.config.search_ttl
        };
        self.cache.set(&key, CacheValue::Ids(ids.clone()), ttl).await;
        self.cache.evict(self.config.cache_max_entries).await;
        Ok(ids)
    }

    /// List object ids in a department.
    pub async fn objects_in_department(&self, department_id: u32) -> MetResult<Vec<u64>> {
        let key = format!("department:{department_id}");
        if let Some(CacheValue::Ids(ids)) = self.cache.get(&key).await {
            return Ok(ids);
        }

        let url = format!(
            "{}/objects?departmentIds={}",
            self.config.base_url, department_id
        );
        let ids = self.fetch_id_list(&url).await?;

        let ttl = if ids.is_empty() {
            self.config.empty_ttl
        } else {
            self.config.search_ttl
        };
        self.cache.set(&key, CacheValue::Ids(ids.clone()), ttl).await;
        self.cache.evict(self.config.cache_max_entries).await;
        Ok(ids)
    }

    /// Fetch a single object by id.
    ///
    /// Returns `None` for the definitive-absent outcome (404, or a payload
    /// without a valid object id), which is cached with a shorter TTL.
    /// Fatal errors propagate and are never cached.
    pub async fn get_by_id(&self, object_id: u64) -> MetResult<Option<Artwork>> {
        let key = object_cache_key(object_id);
        if let Some(value) = self.cache.get(&key).await {
            return Ok(cached_artwork(value));
        }

        // Serialize concurrent fetches of the same id behind a per-id
        // guard; whoever wins populates the cache and the rest hit it on
        // the re-check below.
        let guard = {
            let mut pending = self.pending.lock().await;
            pending
                .entry(object_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let lock = guard.lock().await;

        let result = match self.cache.get(&key).await {
            Some(value) => Ok(cached_artwork(value)),
            None => self.fetch_object(object_id, &key).await,
        };

        drop(lock);
        self.pending.lock().await.remove(&object_id);
        result
    }

    /// Fetch many objects sequentially, preserving input order.
    ///
    /// Absent records, records without a usable image (when
    /// `require_image` is set), and permanently failed items are skipped;
    /// a failure never aborts the batch. Transient failures insert an
    /// extended pause before the run continues.
    pub async fn get_many(&self, object_ids: &[u64], options: &FetchOptions) -> ManyResult {
        let mut result = ManyResult::default();

        for (index, &object_id) in object_ids.iter().enumerate() {
            if options.is_cancelled() {
                info!(processed = index, total = object_ids.len(), "batch fetch cancelled");
                break;
            }

            match self.get_by_id(object_id).await {
                Ok(Some(artwork)) => {
                    if options.require_image && !artwork.has_image() {
                        debug!(object_id, "skipping record without preview image");
                    } else {
                        result.records.push(artwork);
                    }
                }
                Ok(None) => {
                    debug!(object_id, "object absent upstream, skipping");
                }
                Err(err) => {
                    warn!(object_id, error = %err, "batch item failed, continuing");
                    let transient = err.is_transient();
                    result.failures.push(BatchFailure {
                        object_id,
                        error: err.to_string(),
                    });
                    if transient {
                        debug!(
                            pause_ms = options.transient_pause.as_millis() as u64,
                            "transient failure mid-batch, extended pause"
                        );
                        sleep(options.transient_pause).await;
                    }
                }
            }

            // Periodically check the quota and back off before we run dry.
            if options.pause_every > 0 && (index + 1) % options.pause_every == 0 {
                let status = self.scheduler.status().await;
                if status.remaining <= options.low_quota_threshold {
                    debug!(
                        remaining = status.remaining,
                        "request quota running low, pausing"
                    );
                    sleep(options.quota_pause).await;
                }
            }
        }

        result
    }

    /// Fetch many objects in fixed-size batches, reporting progress after
    /// each batch.
    ///
    /// The callback runs synchronously between batches; batches never
    /// overlap. A short pause separates batches, except after the last.
    pub async fn get_many_progressive<F>(
        &self,
        object_ids: &[u64],
        mut on_progress: F,
        options: &ProgressiveOptions,
    ) -> ManyResult
    where
        F: FnMut(&BatchProgress<'_>),
    {
        let mut result = ManyResult::default();
        if object_ids.is_empty() {
            return result;
        }

        let batch_size = options.batch_size.max(1);
        let total_items = object_ids.len();
        let total_batches = total_items.div_ceil(batch_size);
        let mut items_processed = 0;

        for (batch_index, chunk) in object_ids.chunks(batch_size).enumerate() {
            if options.fetch.is_cancelled() {
                info!(
                    batches_done = batch_index,
                    total_batches, "progressive fetch cancelled"
                );
                break;
            }

            let batch = self.get_many(chunk, &options.fetch).await;
            items_processed += chunk.len();
            let is_complete = batch_index + 1 == total_batches;

            on_progress(&BatchProgress {
                items_processed,
                total_items,
                batch_records: &batch.records,
                batch_number: batch_index + 1,
                total_batches,
                progress: items_processed as f64 / total_items as f64,
                is_complete,
            });

            result.records.extend(batch.records);
            result.failures.extend(batch.failures);

            if !is_complete {
                sleep(options.batch_pause).await;
            }
        }

        result
    }

    /// Fetch an object and upsert it into the repository.
    ///
    /// Absent objects surface as [`MetError::NotFound`]. The persisted
    /// record is tagged with its origin, the importing user, and the
    /// import timestamp. Re-importing the same id updates the stored
    /// record in place.
    pub async fn import_and_persist(
        &self,
        object_id: u64,
        importer_id: &str,
        repo: &dyn ArtworkRepository,
    ) -> MetResult<Artwork> {
        let Some(mut artwork) = self.get_by_id(object_id).await? else {
            return Err(MetError::NotFound {
                url: self.object_url(object_id),
            });
        };

        artwork.imported_by = Some(importer_id.to_string());
        artwork.imported_at = Some(Utc::now());

        let stored = repo.upsert(&artwork).await?;
        info!(object_id, importer = importer_id, "artwork imported");
        Ok(stored)
    }

    /// Scheduler diagnostics.
    pub async fn rate_limit_status(&self) -> SchedulerStatus {
        self.scheduler.status().await
    }

    /// Cache diagnostics.
    pub async fn cache_status(&self) -> CacheStats {
        self.cache.stats().await
    }

    fn object_url(&self, object_id: u64) -> String {
        format!("{}/objects/{}", self.config.base_url, object_id)
    }

    /// Retry-wrapped GET returning the parsed JSON body. Headers are
    /// regenerated per attempt so rotation applies to retries too.
    async fn get_json(&self, url: &str) -> MetResult<serde_json::Value> {
        self.retry
            .execute(&self.scheduler, url, || {
                let headers = self.headers.headers();
                let http = self.http.clone();
                async move { http.get(url, &headers).await?.into_json(url) }
            })
            .await
    }

    async fn fetch_id_list(&self, url: &str) -> MetResult<Vec<u64>> {
        let json = self.get_json(url).await?;
        let response: SearchResponse =
            serde_json::from_value(json).map_err(|source| MetError::InvalidJson {
                url: url.to_string(),
                source,
            })?;
        Ok(response.into_ids())
    }

    async fn fetch_object(&self, object_id: u64, key: &str) -> MetResult<Option<Artwork>> {
        let url = self.object_url(object_id);
        match self.get_json(&url).await {
            Ok(json) => {
                let object: MetObject =
                    serde_json::from_value(json).map_err(|source| MetError::InvalidJson {
                        url: url.clone(),
                        source,
                    })?;
                if object.object_id == 0 {
                    debug!(object_id, "payload lacks a valid objectID, caching absent");
                    self.cache
                        .set(key, CacheValue::Absent, self.config.not_found_ttl)
                        .await;
                    return Ok(None);
                }

                let artwork = Artwork::from_met(object);
                self.cache
                    .set(
                        key,
                        CacheValue::Record(Box::new(artwork.clone())),
                        self.config.object_ttl,
                    )
                    .await;
                self.cache.evict(self.config.cache_max_entries).await;
                Ok(Some(artwork))
            }
            Err(err) if err.is_not_found() => {
                debug!(object_id, "object not found upstream, caching absent");
                self.cache
                    .set(key, CacheValue::Absent, self.config.not_found_ttl)
                    .await;
                Ok(None)
            }
            // Transient-exhausted and fatal errors propagate uncached.
            Err(err) => Err(err),
        }
    }
}

fn object_cache_key(object_id: u64) -> String {
    format!("object:{object_id}")
}

/// Map a cached value for an object key to the caller-facing outcome.
/// A cached `Absent` is a successful "no such record" answer.
fn cached_artwork(value: CacheValue) -> Option<Artwork> {
    match value {
        CacheValue::Record(artwork) => Some(*artwork),
        _ => None,
    }
}
