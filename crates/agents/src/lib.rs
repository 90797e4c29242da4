//! Campaign orchestration: the bounded task pool, the cache-first hero
//! resolver and the multi-phase [`CampaignOrchestrator`].

pub mod pipeline;
pub mod pool;
pub mod resolver;

pub use pipeline::{CampaignOrchestrator, ExternalServices, RunPhase};
pub use pool::TaskPool;
pub use resolver::{HeroImage, HeroResolver};
