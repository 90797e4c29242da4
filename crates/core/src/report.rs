//! Run-level metrics accumulator and the immutable execution report it
//! finalizes into.
//!
//! [`ExecutionContext`] takes `&mut self` everywhere: it is owned by the
//! coordinating task that drains worker results, so no locking is needed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CampaignResult;
use crate::types::{GeneratedAsset, HeroProvenance};

/// One charge against the run's budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    pub label: String,
    pub amount: f64,
}

/// Mutable accumulator for a single campaign run.
#[derive(Debug)]
pub struct ExecutionContext {
    run_id: Uuid,
    campaign_id: String,
    started: Instant,
    started_at: DateTime<Utc>,
    costs: Vec<CostEntry>,
    timings: BTreeMap<String, f64>,
    stage_timings: BTreeMap<String, f64>,
    errors: Vec<String>,
    hero_images_generated: u32,
    hero_images_cached: u32,
    hero_images_user_provided: u32,
    variations_created: u32,
}

impl ExecutionContext {
    pub fn new(campaign_id: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            campaign_id: campaign_id.into(),
            started: Instant::now(),
            started_at: Utc::now(),
            costs: Vec::new(),
            timings: BTreeMap::new(),
            stage_timings: BTreeMap::new(),
            errors: Vec::new(),
            hero_images_generated: 0,
            hero_images_cached: 0,
            hero_images_user_provided: 0,
            variations_created: 0,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn campaign_id(&self) -> &str {
        &self.campaign_id
    }

    pub fn record_cost(&mut self, label: impl Into<String>, amount: f64) {
        self.costs.push(CostEntry {
            label: label.into(),
            amount,
        });
    }

    /// Record a named timing. The stage is the operation name up to the
    /// first `_`, and stage totals accumulate across operations.
    pub fn record_timing(&mut self, operation: impl Into<String>, duration: Duration) {
        let operation = operation.into();
        let secs = duration.as_secs_f64();
        let stage = operation
            .split_once('_')
            .map(|(stage, _)| stage.to_string())
            .unwrap_or_else(|| operation.clone());
        *self.stage_timings.entry(stage).or_insert(0.0) += secs;
        self.timings.insert(operation, secs);
    }

    pub fn record_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// Count a resolved hero and charge its cost when it was generated.
    pub fn record_hero(&mut self, product_id: &str, provenance: HeroProvenance, cost: f64) {
        match provenance {
            HeroProvenance::Generated => {
                self.hero_images_generated += 1;
                self.record_cost(format!("hero:{product_id}"), cost);
            }
            HeroProvenance::CacheHit => self.hero_images_cached += 1,
            HeroProvenance::UserProvided => self.hero_images_user_provided += 1,
        }
    }

    pub fn record_variant(&mut self) {
        self.variations_created += 1;
    }

    pub fn total_cost(&self) -> f64 {
        self.costs.iter().map(|c| c.amount).sum()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn hero_images_generated(&self) -> u32 {
        self.hero_images_generated
    }

    pub fn hero_images_cached(&self) -> u32 {
        self.hero_images_cached
    }

    pub fn variations_created(&self) -> u32 {
        self.variations_created
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Close the run and produce the immutable report.
    pub fn finalize(self, summary: RunSummary<'_>) -> ExecutionReport {
        let execution_time = self.started.elapsed().as_secs_f64();
        let total_cost = self.total_cost();
        let assets_generated = self.hero_images_generated;
        let assets_reused = self.hero_images_cached + self.hero_images_user_provided;
        let total_heroes = assets_generated + assets_reused;
        let cache_efficiency = if total_heroes > 0 {
            assets_reused as f64 / total_heroes as f64 * 100.0
        } else {
            0.0
        };

        ExecutionReport {
            run_id: self.run_id,
            campaign_id: self.campaign_id,
            products_count: summary.products_count,
            assets_generated,
            assets_reused,
            total_cost,
            execution_time,
            cache_efficiency,
            output_path: summary.output_path.display().to_string(),
            hero_images_generated: self.hero_images_generated,
            hero_images_cached: self.hero_images_cached,
            variations_created: self.variations_created,
            errors: self.errors,
            timings: ReportTimings {
                operations: self.timings,
                stage_timings: self.stage_timings,
                total_execution: execution_time,
            },
            compliance_summary: ComplianceSummary::from_assets(summary.assets),
            worker_count: summary.worker_count,
            started_at: self.started_at,
            completed_at: Utc::now(),
        }
    }
}

/// Run facts known only to the orchestrator, folded in at finalization.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary<'a> {
    pub products_count: usize,
    pub worker_count: usize,
    pub output_path: &'a Path,
    pub assets: &'a [GeneratedAsset],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    pub total_assets: usize,
    pub passed: usize,
    /// Individual warning messages across all assets.
    pub warnings: usize,
    /// Individual error messages across all assets.
    pub errors: usize,
}

impl ComplianceSummary {
    pub fn from_assets(assets: &[GeneratedAsset]) -> Self {
        Self {
            total_assets: assets.len(),
            passed: assets.iter().filter(|a| a.compliance.passed).count(),
            warnings: assets.iter().map(|a| a.compliance.warnings.len()).sum(),
            errors: assets.iter().map(|a| a.compliance.errors.len()).sum(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportTimings {
    #[serde(flatten)]
    pub operations: BTreeMap<String, f64>,
    pub stage_timings: BTreeMap<String, f64>,
    pub total_execution: f64,
}

/// Immutable summary of one campaign run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub run_id: Uuid,
    pub campaign_id: String,
    pub products_count: usize,
    pub assets_generated: u32,
    pub assets_reused: u32,
    pub total_cost: f64,
    /// Wall-clock seconds.
    pub execution_time: f64,
    /// Percentage of heroes obtained without generation.
    pub cache_efficiency: f64,
    pub output_path: String,
    pub hero_images_generated: u32,
    pub hero_images_cached: u32,
    pub variations_created: u32,
    pub errors: Vec<String>,
    pub timings: ReportTimings,
    pub compliance_summary: ComplianceSummary,
    pub worker_count: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn file_name(&self) -> String {
        format!("{}_execution.json", self.campaign_id)
    }

    /// Persist as pretty JSON at `{dir}/{campaign_id}_execution.json`.
    pub fn save(&self, dir: &Path) -> CampaignResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> CampaignResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
