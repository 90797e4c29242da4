//! Campaign orchestrator: pre-flight gate, then the three fixed phases
//! (resolve heroes, derive variants, compose and check), then the report.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use campaign_cache::{build_storage, AssetStorage, HeroCache};
use campaign_core::report::RunSummary;
use campaign_core::{
    AppConfig, AspectRatio, CampaignBrief, CampaignError, CampaignResult, ExecutionContext, ExecutionReport,
    GeneratedAsset, HeroProvenance,
};
use campaign_dco::{AspectRatioTransformer, ComplianceChecker, Compositor, PostProcessor};
use campaign_integrations::{
    build_validator, BriefValidator, ImageGenerator, LanguageModel, LlmTranslator, Localizer, RateLimiter, Translator,
};
use image::DynamicImage;
use tracing::{error, info, warn};

use crate::pool::TaskPool;
use crate::resolver::{HeroImage, HeroResolver};

/// Where a run currently is. Runs move strictly forward; a pre-flight
/// rejection ends the run from `Validating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Validating,
    ResolvingHeroes,
    DerivingVariants,
    Composing,
    Reporting,
    Done,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Validating => "validating",
            RunPhase::ResolvingHeroes => "resolving_heroes",
            RunPhase::DerivingVariants => "deriving_variants",
            RunPhase::Composing => "composing",
            RunPhase::Reporting => "reporting",
            RunPhase::Done => "done",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External collaborators the orchestrator cannot build from configuration
/// alone.
#[derive(Clone)]
pub struct ExternalServices {
    pub image_generator: Arc<dyn ImageGenerator>,
    /// Model for pre-flight brief validation. `None` disables it.
    pub validation_model: Option<Arc<dyn LanguageModel>>,
    /// Model for message translation. `None` keeps every locale on the
    /// original message.
    pub translation_model: Option<Arc<dyn LanguageModel>>,
}

struct Variant {
    product_id: String,
    aspect: AspectRatio,
    image: Arc<DynamicImage>,
}

struct ComposeOutcome {
    product_id: String,
    aspect: AspectRatio,
    locale: String,
    elapsed: Duration,
    result: CampaignResult<GeneratedAsset>,
}

pub struct CampaignOrchestrator {
    validator: Arc<dyn BriefValidator>,
    resolver: Arc<HeroResolver>,
    post_processor: Arc<PostProcessor>,
    transformer: Arc<AspectRatioTransformer>,
    compositor: Arc<Compositor>,
    checker: Arc<ComplianceChecker>,
    localizer: Arc<Localizer>,
    output: Arc<dyn AssetStorage>,
    output_base: PathBuf,
    logs_dir: PathBuf,
    aspect_ratios: Vec<AspectRatio>,
    max_workers: usize,
}

impl CampaignOrchestrator {
    /// Wire every component from configuration. Fails on settings no
    /// component can work with, including unimplemented storage backends.
    pub fn new(config: &AppConfig, services: ExternalServices) -> CampaignResult<Self> {
        let cache_storage = build_storage(config.storage.backend, &config.storage.cache_base)?;
        let output = build_storage(config.storage.backend, &config.storage.output_base)?;
        let cache = HeroCache::new(cache_storage, config.hero_image.cache_enabled);
        let limiter = Arc::new(RateLimiter::new(config.generator.rate_limit));
        let resolver = HeroResolver::new(
            config.assets.input_folder.clone(),
            cache,
            services.image_generator,
            limiter,
        );

        let translator = services
            .translation_model
            .map(|llm| Arc::new(LlmTranslator::new(llm)) as Arc<dyn Translator>);

        info!(
            max_workers = config.scalability.max_workers,
            backend = output.backend_name(),
            cache_enabled = config.hero_image.cache_enabled,
            "campaign orchestrator initialized"
        );

        Ok(Self {
            validator: build_validator(&config.governance, services.validation_model),
            resolver: Arc::new(resolver),
            post_processor: Arc::new(PostProcessor::new(&config.post_processing)),
            transformer: Arc::new(AspectRatioTransformer::new(&config.aspect_ratio_processing)?),
            compositor: Arc::new(Compositor::new(&config.text_overlay, &config.brand)?),
            checker: Arc::new(ComplianceChecker::new(&config.governance, &config.brand)),
            localizer: Arc::new(Localizer::new(&config.localization, translator)),
            output,
            output_base: config.storage.output_base.clone(),
            logs_dir: config.logs.dir.clone(),
            aspect_ratios: config.campaign.aspect_ratios.clone(),
            max_workers: config.scalability.max_workers.max(1),
        })
    }

    /// Replace the compositor, e.g. to pin a font.
    pub fn with_compositor(mut self, compositor: Compositor) -> Self {
        self.compositor = Arc::new(compositor);
        self
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run one campaign end to end and persist its report. Only a pre-flight
    /// rejection or a report that cannot be written fails the run; every
    /// per-product or per-asset failure is recorded in the report instead.
    pub async fn run(&self, brief: &CampaignBrief) -> CampaignResult<ExecutionReport> {
        let brief = Arc::new(brief.clone());
        let mut ctx = ExecutionContext::new(brief.campaign_id());
        info!(
            run_id = %ctx.run_id(),
            campaign_id = brief.campaign_id(),
            products = brief.products().len(),
            locales = ?brief.locales(),
            "campaign run started"
        );

        enter(RunPhase::Validating, &brief);
        self.preflight(&brief, &mut ctx).await?;

        enter(RunPhase::ResolvingHeroes, &brief);
        let heroes = self.resolve_heroes(&brief, &mut ctx).await;

        enter(RunPhase::DerivingVariants, &brief);
        let (variants, origins) = self.derive_variants(&brief, heroes, &mut ctx).await;

        enter(RunPhase::Composing, &brief);
        let assets = self.compose_assets(&brief, variants, &origins, &mut ctx).await;

        enter(RunPhase::Reporting, &brief);
        let output_path = self.output_base.join(brief.campaign_id());
        let report = ctx.finalize(RunSummary {
            products_count: brief.products().len(),
            worker_count: self.max_workers,
            output_path: &output_path,
            assets: &assets,
        });
        let report_path = report.save(&self.logs_dir)?;

        enter(RunPhase::Done, &brief);
        info!(
            campaign_id = %report.campaign_id,
            assets = assets.len(),
            generated = report.hero_images_generated,
            cached = report.hero_images_cached,
            total_cost = report.total_cost,
            errors = report.errors.len(),
            report = %report_path.display(),
            "campaign run complete"
        );
        Ok(report)
    }

    async fn preflight(&self, brief: &CampaignBrief, ctx: &mut ExecutionContext) -> CampaignResult<()> {
        let started = Instant::now();
        let verdict = self.validator.validate(brief).await;
        ctx.record_timing("preflight_validation", started.elapsed());

        for warning in &verdict.warnings {
            warn!(campaign_id = brief.campaign_id(), warning = %warning, "pre-flight warning");
        }
        for suggestion in &verdict.suggestions {
            info!(campaign_id = brief.campaign_id(), suggestion = %suggestion, "pre-flight suggestion");
        }

        if verdict.passed {
            return Ok(());
        }
        let errors = if verdict.errors.is_empty() {
            vec!["brief rejected without a stated reason".to_string()]
        } else {
            verdict.errors
        };
        error!(campaign_id = brief.campaign_id(), errors = ?errors, "pre-flight validation rejected the brief");
        metrics::counter!("campaign.preflight_rejected").increment(1);
        Err(CampaignError::PreflightRejected { errors })
    }

    /// Phase 1: one pooled task per product. Failed products drop out of the
    /// later phases.
    async fn resolve_heroes(&self, brief: &Arc<CampaignBrief>, ctx: &mut ExecutionContext) -> HashMap<String, HeroImage> {
        let phase_started = Instant::now();
        let mut pool = TaskPool::new(self.max_workers);
        for product in brief.products().iter().cloned() {
            let resolver = Arc::clone(&self.resolver);
            let post_processor = Arc::clone(&self.post_processor);
            let brief = Arc::clone(brief);
            pool.spawn(async move {
                let started = Instant::now();
                let result: CampaignResult<HeroImage> = async {
                    let hero = resolver.resolve(&product, &brief).await?;
                    let HeroImage { image, provenance, cost } = hero;
                    let image = tokio::task::spawn_blocking(move || post_processor.process(&image))
                        .await
                        .map_err(|e| CampaignError::Imaging(format!("post-processing task failed: {e}")))?;
                    Ok(HeroImage { image, provenance, cost })
                }
                .await;
                (product.id, started.elapsed(), result)
            });
        }

        let mut heroes = HashMap::new();
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok((product_id, elapsed, Ok(hero))) => {
                    ctx.record_timing(format!("hero_{product_id}"), elapsed);
                    ctx.record_hero(&product_id, hero.provenance, hero.cost);
                    heroes.insert(product_id, hero);
                }
                Ok((product_id, elapsed, Err(e))) => {
                    ctx.record_timing(format!("hero_{product_id}"), elapsed);
                    warn!(product_id = %product_id, error = %e, "hero resolution failed");
                    ctx.record_error(format!("{product_id}: hero resolution failed: {e}"));
                }
                Err(e) => {
                    error!(error = %e, "hero task aborted");
                    ctx.record_error(format!("hero task aborted: {e}"));
                }
            }
        }
        metrics::histogram!("campaign.phase_seconds", "phase" => "heroes")
            .record(phase_started.elapsed().as_secs_f64());
        heroes
    }

    /// Phase 2: every resolved hero to every configured aspect ratio, in
    /// brief order, on one blocking thread.
    async fn derive_variants(
        &self,
        brief: &CampaignBrief,
        mut heroes: HashMap<String, HeroImage>,
        ctx: &mut ExecutionContext,
    ) -> (Vec<Variant>, HashMap<String, HeroProvenance>) {
        let mut ordered = Vec::with_capacity(heroes.len());
        let mut origins = HashMap::with_capacity(heroes.len());
        for product in brief.products() {
            if let Some(hero) = heroes.remove(&product.id) {
                origins.insert(product.id.clone(), hero.provenance);
                ordered.push((product.id.clone(), hero.image));
            }
        }

        let transformer = Arc::clone(&self.transformer);
        let ratios = self.aspect_ratios.clone();
        let started = Instant::now();
        let derived = tokio::task::spawn_blocking(move || {
            ordered
                .into_iter()
                .flat_map(|(product_id, hero)| {
                    transformer
                        .derive_all(&hero, &ratios)
                        .into_iter()
                        .map(move |(aspect, image)| Variant {
                            product_id: product_id.clone(),
                            aspect,
                            image: Arc::new(image),
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>()
        })
        .await;
        ctx.record_timing("variants_derive", started.elapsed());

        match derived {
            Ok(variants) => {
                for _ in &variants {
                    ctx.record_variant();
                }
                info!(variants = variants.len(), "aspect variants derived");
                (variants, origins)
            }
            Err(e) => {
                error!(error = %e, "variant derivation aborted");
                ctx.record_error(format!("variant derivation aborted: {e}"));
                (Vec::new(), origins)
            }
        }
    }

    /// Each locale's message, translated once so every asset of a locale
    /// carries the same wording.
    async fn localize_messages(&self, brief: &CampaignBrief, ctx: &mut ExecutionContext) -> HashMap<String, String> {
        let mut messages = HashMap::with_capacity(brief.locales().len());
        for locale in brief.locales() {
            let started = Instant::now();
            let message = self
                .localizer
                .localize(brief.campaign_message(), locale, brief.region())
                .await;
            ctx.record_timing(format!("localize_{locale}"), started.elapsed());
            messages.insert(locale.clone(), message);
        }
        messages
    }

    /// Phase 3: one pooled task per (product, aspect, locale).
    async fn compose_assets(
        &self,
        brief: &Arc<CampaignBrief>,
        variants: Vec<Variant>,
        origins: &HashMap<String, HeroProvenance>,
        ctx: &mut ExecutionContext,
    ) -> Vec<GeneratedAsset> {
        let messages = if variants.is_empty() {
            HashMap::new()
        } else {
            self.localize_messages(brief, ctx).await
        };
        let mut pool = TaskPool::new(self.max_workers);
        for variant in &variants {
            let Some(provenance) = origins.get(&variant.product_id).copied() else {
                continue;
            };
            for (locale, message) in &messages {
                let task = ComposeTask {
                    brief: Arc::clone(brief),
                    product_id: variant.product_id.clone(),
                    aspect: variant.aspect,
                    locale: locale.clone(),
                    message: message.clone(),
                    variant: Arc::clone(&variant.image),
                    provenance,
                    compositor: Arc::clone(&self.compositor),
                    checker: Arc::clone(&self.checker),
                    output: Arc::clone(&self.output),
                };
                pool.spawn(task.run());
            }
        }
        drop(variants);

        let mut assets = Vec::with_capacity(pool.len());
        while let Some(joined) = pool.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "compose task aborted");
                    ctx.record_error(format!("compose task aborted: {e}"));
                    continue;
                }
            };
            let label = format!("{}_{}_{}", outcome.product_id, outcome.aspect.file_token(), outcome.locale);
            ctx.record_timing(format!("compose_{label}"), outcome.elapsed);
            match outcome.result {
                Ok(asset) => {
                    if !asset.compliance.passed {
                        warn!(asset = %label, errors = ?asset.compliance.errors, "asset failed compliance");
                        ctx.record_error(format!("{label}: Compliance failed"));
                    }
                    assets.push(asset);
                }
                Err(e) => {
                    warn!(asset = %label, error = %e, "asset composition failed");
                    ctx.record_error(format!("{label}: {e}"));
                }
            }
        }
        assets.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        assets
    }
}

/// Everything one compose task owns.
struct ComposeTask {
    brief: Arc<CampaignBrief>,
    product_id: String,
    aspect: AspectRatio,
    locale: String,
    message: String,
    variant: Arc<DynamicImage>,
    provenance: HeroProvenance,
    compositor: Arc<Compositor>,
    checker: Arc<ComplianceChecker>,
    output: Arc<dyn AssetStorage>,
}

impl ComposeTask {
    async fn run(self) -> ComposeOutcome {
        let started = Instant::now();
        let message = self.message;
        let path = format!(
            "{}/{}/{}_{}.png",
            self.brief.campaign_id(),
            self.product_id,
            self.aspect.file_token(),
            self.locale
        );
        let (compositor, checker, output) = (self.compositor, self.checker, self.output);
        let (variant, aspect, locale) = (self.variant, self.aspect, self.locale.clone());
        let campaign_id = self.brief.campaign_id().to_string();

        let rendered = tokio::task::spawn_blocking(move || {
            let composed = compositor.compose(&variant, &message, aspect, &locale, &campaign_id);
            let compliance = checker.check_asset(&composed, &message);
            output.save(&path, &composed).map(|saved| (saved, compliance))
        })
        .await;

        let result = match rendered {
            Ok(Ok((saved, compliance))) => {
                metrics::counter!("campaign.assets_composed").increment(1);
                Ok(GeneratedAsset {
                    product_id: self.product_id.clone(),
                    aspect_ratio: self.aspect,
                    locale: self.locale.clone(),
                    file_path: saved.display().to_string(),
                    generation_cost: 0.0,
                    hero_provenance: self.provenance,
                    compliance,
                })
            }
            Ok(Err(e)) => Err(CampaignError::from(e)),
            Err(e) => Err(CampaignError::Imaging(format!("compose task failed: {e}"))),
        };

        ComposeOutcome {
            product_id: self.product_id,
            aspect: self.aspect,
            locale: self.locale,
            elapsed: started.elapsed(),
            result,
        }
    }
}

fn enter(phase: RunPhase, brief: &CampaignBrief) {
    info!(campaign_id = brief.campaign_id(), phase = %phase, "entering phase");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        let phases = [
            RunPhase::Validating,
            RunPhase::ResolvingHeroes,
            RunPhase::DerivingVariants,
            RunPhase::Composing,
            RunPhase::Reporting,
            RunPhase::Done,
        ];
        let names: Vec<_> = phases.iter().map(RunPhase::to_string).collect();
        assert_eq!(
            names,
            ["validating", "resolving_heroes", "deriving_variants", "composing", "reporting", "done"]
        );
    }
}
