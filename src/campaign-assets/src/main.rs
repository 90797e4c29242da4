//! Campaign Assets — turns a campaign brief into localized, multi-format
//! creative assets.
//!
//! Loads configuration and the brief, wires the external services and runs
//! the pipeline once (or twice with `--verify-cache`).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use campaign_agents::{CampaignOrchestrator, ExternalServices};
use campaign_cache::clear_hero_cache;
use campaign_core::config::{AppConfig, StorageBackendKind};
use campaign_core::{CampaignBrief, CampaignError, ExecutionReport};
use campaign_integrations::{LanguageModel, OpenAiChatModel, OpenAiClient, OpenAiImageGenerator};
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-assets")]
#[command(about = "Generate localized multi-format campaign assets from a brief")]
#[command(version)]
struct Cli {
    /// Campaign brief (JSON)
    #[arg(long)]
    campaign: PathBuf,

    /// Configuration file (YAML, TOML or JSON)
    #[arg(long, env = "CAMPAIGN_ASSETS_CONFIG")]
    config: Option<PathBuf>,

    /// Worker pool size (overrides config)
    #[arg(long)]
    workers: Option<usize>,

    /// Delete cached hero images before running
    #[arg(long, default_value_t = false)]
    clear_cache: bool,

    /// Run the campaign twice and check the second run reuses every hero
    #[arg(long, default_value_t = false)]
    verify_cache: bool,

    /// Emit logs as JSON lines
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(workers) = cli.workers {
        config.scalability.max_workers = workers.max(1);
    }
    if config.generator.api_key.is_none() {
        config.generator.api_key = std::env::var("OPENAI_API_KEY").ok();
    }

    let brief = CampaignBrief::from_file(&cli.campaign)
        .with_context(|| format!("invalid campaign brief {}", cli.campaign.display()))?;
    info!(
        campaign_id = brief.campaign_id(),
        products = brief.products().len(),
        locales = ?brief.locales(),
        max_workers = config.scalability.max_workers,
        "configuration loaded"
    );

    if cli.clear_cache {
        if config.storage.backend == StorageBackendKind::Local {
            let removed = clear_hero_cache(&config.storage.cache_base)?;
            info!(removed, dir = %config.storage.cache_base.display(), "hero cache cleared");
        } else {
            warn!(backend = ?config.storage.backend, "--clear-cache only applies to local storage");
        }
    }

    let orchestrator = CampaignOrchestrator::new(&config, external_services(&config)?)?;

    let report = match orchestrator.run(&brief).await {
        Ok(report) => report,
        Err(CampaignError::PreflightRejected { errors }) => {
            error!(campaign_id = brief.campaign_id(), "campaign rejected by pre-flight validation");
            for e in &errors {
                eprintln!("  - {e}");
            }
            anyhow::bail!("campaign '{}' failed pre-flight validation", brief.campaign_id());
        }
        Err(e) => return Err(e.into()),
    };
    print_summary(&report);

    if cli.verify_cache {
        let rerun = orchestrator.run(&brief).await?;
        print_summary(&rerun);
        if rerun.hero_images_generated == 0 {
            println!("Cache verified: every hero reused, cost ${:.2}", rerun.total_cost);
        } else {
            warn!(generated = rerun.hero_images_generated, "second run still generated heroes");
            anyhow::bail!("cache verification failed: {} heroes regenerated", rerun.hero_images_generated);
        }
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "campaign_assets=info,campaign_agents=info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build the OpenAI-backed services. The API key is required; the language
/// models are only built for the features that use them.
fn external_services(config: &AppConfig) -> anyhow::Result<ExternalServices> {
    let client = Arc::new(
        OpenAiClient::new(
            config.generator.api_key.as_deref(),
            &config.generator.api_base,
            Duration::from_secs(config.generator.timeout_secs),
        )
        .context("OPENAI_API_KEY (or generator.api_key) must be set")?,
    );

    let chat_model = |model: &str| -> Arc<dyn LanguageModel> {
        Arc::new(OpenAiChatModel::new(Arc::clone(&client), model, config.generator.max_retries))
    };
    let validation_model = config
        .governance
        .llm_validation_enabled
        .then(|| chat_model(&config.governance.llm_validation_model));
    let translation_model = config
        .localization
        .enabled
        .then(|| chat_model(&config.localization.translation_model));

    Ok(ExternalServices {
        image_generator: Arc::new(OpenAiImageGenerator::new(
            Arc::clone(&client),
            &config.generator,
            &config.hero_image,
        )),
        validation_model,
        translation_model,
    })
}

fn print_summary(report: &ExecutionReport) {
    let compliance = &report.compliance_summary;
    println!("Campaign {} ({})", report.campaign_id, report.run_id);
    println!("  products:          {}", report.products_count);
    println!(
        "  heroes:            {} generated, {} cached, {} reused total",
        report.hero_images_generated, report.hero_images_cached, report.assets_reused
    );
    println!("  variants:          {}", report.variations_created);
    println!(
        "  assets:            {} ({} passed compliance, {} warnings, {} errors)",
        compliance.total_assets, compliance.passed, compliance.warnings, compliance.errors
    );
    println!("  cost:              ${:.2}", report.total_cost);
    println!("  cache efficiency:  {:.1}%", report.cache_efficiency);
    println!("  time:              {:.2}s ({} workers)", report.execution_time, report.worker_count);
    println!("  output:            {}", report.output_path);
    if !report.errors.is_empty() {
        println!("  errors:");
        for e in &report.errors {
            println!("    - {e}");
        }
    }
}
