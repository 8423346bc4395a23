//! Tunables for the SIMBA outer loop.

use std::sync::Arc;
use std::time::Duration;

use bon::Builder;

use crate::lm::LmClient;
use crate::optimizer::progress::ProgressEvent;
use crate::strategy::{AppendDemo, Strategy};
use crate::telemetry::CorrelationId;

fn default_strategies() -> Vec<Arc<dyn Strategy>> {
    vec![Arc::new(AppendDemo::new())]
}

fn default_temperature_perturbations() -> Vec<f32> {
    vec![0.1, 0.5, 0.9]
}

fn generated_seed() -> u64 {
    rand::random()
}

/// `bon::Builder` configuration consumed by [`Simba::configure`](crate::Simba::configure).
#[derive(Builder)]
pub struct SimbaConfig {
    pub client: Arc<LmClient>,

    #[builder(default = 32)]
    pub batch_size: usize,
    #[builder(default = 6)]
    pub num_candidates: usize,
    #[builder(default = 8)]
    pub max_steps: usize,
    #[builder(default = 4)]
    pub max_demos: usize,
    #[builder(default = 100_000)]
    pub demo_input_field_maxlen: usize,
    #[builder(default = default_strategies())]
    pub strategies: Vec<Arc<dyn Strategy>>,
    #[builder(default = 0.2)]
    pub temperature_sampling: f32,
    #[builder(default = 0.2)]
    pub temperature_candidates: f32,
    #[builder(default = 0.7)]
    pub quality_threshold: f32,
    #[builder(default = 10)]
    pub max_concurrency: usize,
    #[builder(default = 30_000)]
    pub timeout_ms: u64,
    #[builder(default = CorrelationId::new())]
    pub correlation_id: CorrelationId,
    #[builder(default = 0.1)]
    pub improvement_potential_threshold: f32,
    #[builder(default = 0.001)]
    pub min_improvement: f32,
    #[builder(default = 3)]
    pub patience: usize,
    #[builder(default = generated_seed())]
    pub seed: u64,
    #[builder(default = default_temperature_perturbations())]
    pub temperature_perturbations: Vec<f32>,
    pub run_deadline: Option<Duration>,
    pub progress_callback: Option<Arc<dyn Fn(ProgressEvent) + Send + Sync>>,
}
