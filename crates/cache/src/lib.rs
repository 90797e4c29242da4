#![warn(clippy::unwrap_used)]

//! Image storage backends and the content-addressed hero cache.

pub mod hero_cache;
pub mod storage;

pub use hero_cache::{cache_key, clear_hero_cache, CacheKey, HeroCache};
pub use storage::{build_storage, AssetStorage, LocalStorage, StorageError};
