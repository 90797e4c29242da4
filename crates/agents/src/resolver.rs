//! Cache-first hero acquisition.
//!
//! Resolution order, first match wins:
//! 1. `{input}/{campaign_id}/{product_id}.png`
//! 2. `{input}/{product_id}.png`
//! 3. the hero cache
//! 4. a rate-limited generation call, written through to the cache

use std::path::{Path, PathBuf};
use std::sync::Arc;

use campaign_cache::{cache_key, CacheKey, HeroCache};
use campaign_core::{CampaignBrief, CampaignError, CampaignResult, HeroProvenance, Product};
use campaign_integrations::{ImageGenerator, RateLimiter};
use dashmap::DashMap;
use image::DynamicImage;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A resolved hero and what obtaining it cost.
#[derive(Debug, Clone)]
pub struct HeroImage {
    pub image: DynamicImage,
    pub provenance: HeroProvenance,
    pub cost: f64,
}

pub struct HeroResolver {
    input_root: PathBuf,
    cache: HeroCache,
    generator: Arc<dyn ImageGenerator>,
    limiter: Arc<RateLimiter>,
    /// One lock per cache key so concurrent misses on the same key generate once.
    key_locks: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl HeroResolver {
    pub fn new(
        input_root: impl Into<PathBuf>,
        cache: HeroCache,
        generator: Arc<dyn ImageGenerator>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            input_root: input_root.into(),
            cache,
            generator,
            limiter,
            key_locks: DashMap::new(),
        }
    }

    pub async fn resolve(&self, product: &Product, brief: &CampaignBrief) -> CampaignResult<HeroImage> {
        if let Some(image) = self.load_user_asset(brief.campaign_id(), &product.id).await? {
            info!(product_id = %product.id, "using user-provided hero");
            metrics::counter!("hero.user_provided").increment(1);
            return Ok(HeroImage {
                image,
                provenance: HeroProvenance::UserProvided,
                cost: 0.0,
            });
        }

        let key = cache_key(&product.id, brief.campaign_message(), brief.region());
        let lock = Arc::clone(self.key_locks.entry(key.clone()).or_default().value());
        let resolved = {
            let _guard = lock.lock().await;
            self.resolve_keyed(product, brief, &key).await
        };
        drop(lock);
        self.key_locks.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        resolved
    }

    /// Cache, then generation. Callers hold the lock for `key`.
    async fn resolve_keyed(&self, product: &Product, brief: &CampaignBrief, key: &CacheKey) -> CampaignResult<HeroImage> {
        if let Some(image) = self.lookup_cache(key).await? {
            info!(product_id = %product.id, key = %key, "hero cache hit");
            metrics::counter!("hero.cache_hit").increment(1);
            return Ok(HeroImage {
                image,
                provenance: HeroProvenance::CacheHit,
                cost: 0.0,
            });
        }

        self.limiter.acquire().await;
        let generated = self.generator.generate_hero(product, brief).await?;
        metrics::counter!("hero.generated").increment(1);
        info!(product_id = %product.id, key = %key, cost = generated.cost, "hero generated");

        let image = self.write_through(key.clone(), generated.image).await?;
        Ok(HeroImage {
            image,
            provenance: HeroProvenance::Generated,
            cost: generated.cost,
        })
    }

    /// Candidate user files in priority order.
    pub fn user_asset_candidates(&self, campaign_id: &str, product_id: &str) -> [PathBuf; 2] {
        let file = format!("{product_id}.png");
        [
            self.input_root.join(campaign_id).join(&file),
            self.input_root.join(file),
        ]
    }

    async fn load_user_asset(&self, campaign_id: &str, product_id: &str) -> CampaignResult<Option<DynamicImage>> {
        let candidates = self.user_asset_candidates(campaign_id, product_id);
        tokio::task::spawn_blocking(move || candidates.iter().find_map(|path| decode_user_file(path)))
            .await
            .map_err(|e| CampaignError::Imaging(format!("user asset task failed: {e}")))
    }

    async fn lookup_cache(&self, key: &CacheKey) -> CampaignResult<Option<DynamicImage>> {
        if !self.cache.is_enabled() {
            return Ok(None);
        }
        let (cache, key) = (self.cache.clone(), key.clone());
        tokio::task::spawn_blocking(move || cache.get(&key))
            .await
            .map_err(|e| CampaignError::Imaging(format!("cache lookup task failed: {e}")))
    }

    /// Store a fresh hero. A failed cache write only costs a future rerun.
    async fn write_through(&self, key: CacheKey, image: DynamicImage) -> CampaignResult<DynamicImage> {
        let cache = self.cache.clone();
        let (image, written) = tokio::task::spawn_blocking(move || {
            let written = cache.put(&key, &image).map_err(|e| (key, e));
            (image, written)
        })
        .await
        .map_err(|e| CampaignError::Imaging(format!("cache write task failed: {e}")))?;

        if let Err((key, e)) = written {
            warn!(key = %key, error = %e, "failed to cache generated hero");
        }
        Ok(image)
    }
}

fn decode_user_file(path: &Path) -> Option<DynamicImage> {
    if !path.is_file() {
        return None;
    }
    match image::open(path) {
        Ok(image) => {
            debug!(path = %path.display(), "user asset found");
            Some(image)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping undecodable user asset");
            None
        }
    }
}
