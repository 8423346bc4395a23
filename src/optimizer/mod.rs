//! The SIMBA outer loop (C9): mini-batch sampling, candidate sampling with softmax,
//! bounded-concurrency trajectory collection, bucket analysis, strategy dispatch,
//! candidate evaluation, and selection.

pub mod config;
pub mod progress;
pub mod sampling;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{info, instrument};

pub use config::SimbaConfig;
pub use progress::{ProgressEvent, ProgressPhase};

use crate::bucket::Bucket;
use crate::error::CompileError;
use crate::evaluate::{average_score, Metric};
use crate::executor::Executor;
use crate::lm::ChatOptions;
use crate::program::{Example, Program, ProgramId};
use crate::strategy::{apply_first_match, StrategyContext, StrategyOutcome};
use crate::trajectory::Trajectory;

/// `(Optimizer::compile)`'s generic contract: a report type plus the entry point every
/// teleprompter implements.
#[async_trait]
pub trait Optimizer {
    type Report;

    async fn compile(
        &self,
        student: Program,
        teacher: Program,
        trainset: Vec<Example>,
        metric: Metric,
    ) -> Result<Self::Report, CompileError>;
}

/// The SIMBA teleprompter.
pub struct Simba {
    config: SimbaConfig,
}

fn is_well_formed(program: &Program) -> bool {
    !program.signature_ref.name.is_empty()
        && !program.signature_ref.input_fields.is_empty()
        && !program.signature_ref.output_fields.is_empty()
}

/// Per-run bookkeeping threaded through the outer loop.
struct Ledger {
    scores: IndexMap<ProgramId, Vec<f32>>,
}

impl Ledger {
    fn new() -> Self {
        Self {
            scores: IndexMap::new(),
        }
    }

    fn record(&mut self, id: ProgramId, step_avg: f32) {
        self.scores.entry(id).or_default().push(step_avg);
    }

    fn running_average(&self, id: ProgramId) -> f32 {
        self.scores
            .get(&id)
            .map(|values| average_score(values))
            .unwrap_or(0.0)
    }
}

impl Simba {
    /// Builds a teleprompter from a resolved configuration. Does not validate the
    /// program/trainset/metric it will later be asked to `compile` against — that
    /// happens at the start of `compile` itself, so the same `Simba` can be reused
    /// across multiple `compile` calls against different training sets.
    pub fn configure(config: SimbaConfig) -> Self {
        Self { config }
    }

    async fn run_trajectories(
        &self,
        executor: &Executor,
        batch: &[&Example],
        variants: &[Program],
        metric: &Metric,
    ) -> Vec<Trajectory> {
        let pairs: Vec<(usize, usize)> = (0..batch.len())
            .flat_map(|b| (0..variants.len()).map(move |v| (b, v)))
            .collect();

        stream::iter(pairs)
            .map(|(b, v)| {
                let example = batch[b].clone();
                let program = variants[v].clone();
                let executor = executor;
                let metric = metric;
                let options = ChatOptions {
                    temperature: program
                        .model_config
                        .get("temperature")
                        .and_then(|v| v.as_f64())
                        .map(|t| t as f32),
                    ..ChatOptions::default()
                };
                async move {
                    match executor.forward(&program, &example, options).await {
                        Ok(outcome) => {
                            let score = metric.score(&example, &outcome.outputs);
                            Trajectory::success(
                                program.clone(),
                                example,
                                outcome.outputs,
                                score,
                                outcome.duration_ms,
                                program.model_config.clone(),
                            )
                        }
                        Err(e) => Trajectory::failure(
                            program.clone(),
                            example,
                            e.to_string(),
                            None,
                            program.model_config.clone(),
                        ),
                    }
                }
            })
            .buffer_unordered(self.config.max_concurrency)
            .collect()
            .await
    }

    fn prepare_variants(&self, programs: &[Program], ledger: &Ledger, rng: &mut StdRng) -> Vec<Program> {
        let scores: Vec<f32> = programs.iter().map(|p| ledger.running_average(p.id)).collect();
        let weights = sampling::softmax_weights(&scores, self.config.temperature_sampling);

        let mut variants = Vec::with_capacity(self.config.num_candidates);
        // The baseline (unperturbed, highest-scoring-so-far program) is always present.
        let baseline_idx = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        variants.push(programs[baseline_idx].clone());

        if variants.len() < self.config.num_candidates {
            let picks = sampling::sample_indices_with_replacement(
                &weights,
                self.config.num_candidates - variants.len(),
                rng,
            );
            for idx in picks {
                let source = &programs[idx];
                let temperature = *self
                    .config
                    .temperature_perturbations
                    .choose(rng)
                    .unwrap_or(&0.7);
                let mut model_config = source.model_config.clone();
                model_config.insert("temperature".to_string(), serde_json::Value::from(temperature));
                variants.push(source.with_model_config(model_config));
            }
        }

        variants
    }

    fn build_buckets(&self, batch: &[&Example], trajectories: Vec<Trajectory>) -> Vec<Bucket> {
        let mut by_example: Vec<Vec<Trajectory>> = vec![Vec::new(); batch.len()];
        for trajectory in trajectories {
            if let Some(idx) = batch.iter().position(|e| e.inputs == trajectory.example.inputs) {
                by_example[idx].push(trajectory);
            }
        }

        let mut buckets: Vec<Bucket> = by_example
            .into_iter()
            .filter(|group| !group.is_empty())
            .map(Bucket::new)
            .collect();

        buckets.sort_by(|a, b| {
            b.max_to_avg_gap
                .partial_cmp(&a.max_to_avg_gap)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        buckets
    }

    async fn mint_candidates(
        &self,
        buckets: &[Bucket],
        rng: &mut StdRng,
    ) -> Vec<Program> {
        let mut minted = Vec::new();
        for bucket in buckets {
            if minted.len() >= self.config.num_candidates {
                break;
            }
            if !bucket.has_improvement_potential(self.config.improvement_potential_threshold) {
                continue;
            }

            let source = bucket.best().program.clone();
            let mut ctx = StrategyContext {
                max_demos: self.config.max_demos,
                demo_input_field_maxlen: self.config.demo_input_field_maxlen,
                quality_threshold: self.config.quality_threshold,
                rng,
                client: self.config.client.clone(),
                correlation_id: self.config.correlation_id,
            };

            match apply_first_match(&self.config.strategies, bucket, &source, &mut ctx).await {
                StrategyOutcome::Applied(program) => minted.push(program),
                StrategyOutcome::Skip(reason) => {
                    tracing::debug!(event = "bucket_skipped", reason = %reason);
                }
            }
        }
        minted
    }

    fn batch_for_step<'a>(&self, shuffled: &'a [Example], step: usize) -> Vec<&'a Example> {
        let n = shuffled.len();
        if n <= self.config.batch_size {
            return shuffled.iter().collect();
        }
        let start = ((step - 1) * self.config.batch_size) % n;
        (0..self.config.batch_size)
            .map(|offset| &shuffled[(start + offset) % n])
            .collect()
    }
}

#[async_trait]
impl Optimizer for Simba {
    type Report = Program;

    /// `teacher` is validated as a well-formed program (`Err(InvalidTeacherProgram)`
    /// otherwise) but never otherwise influences optimization: `student` is the only
    /// program SIMBA ever mutates or evaluates. This is intentional, not dead code —
    /// see the design ledger entry for the rationale.
    #[instrument(skip(self, student, teacher, trainset, metric), fields(correlation_id = %self.config.correlation_id))]
    async fn compile(
        &self,
        student: Program,
        teacher: Program,
        trainset: Vec<Example>,
        metric: Metric,
    ) -> Result<Program, CompileError> {
        let correlation_id = self.config.correlation_id;

        if !is_well_formed(&student) {
            return Err(CompileError::InvalidStudentProgram {
                reason: "student program has an empty signature or no input/output fields".to_string(),
                correlation_id,
            });
        }
        if !is_well_formed(&teacher) {
            return Err(CompileError::InvalidTeacherProgram {
                reason: "teacher program has an empty signature or no input/output fields".to_string(),
                correlation_id,
            });
        }
        if trainset.is_empty() {
            return Err(CompileError::InvalidOrEmptyTrainset { correlation_id });
        }
        if let Err(reason) = metric.validate(&trainset[0]) {
            return Err(CompileError::InvalidMetricFunction {
                reason,
                correlation_id,
            });
        }

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut shuffled = trainset.clone();
        shuffled.shuffle(&mut rng);

        let executor = Executor::new(self.config.client.clone());
        let mut programs = vec![student.clone()];
        let student_id = student.id;
        let mut ledger = Ledger::new();

        let run_started = Instant::now();
        let mut best_running_score = 0.0_f32;
        let mut steps_without_improvement = 0usize;
        let mut any_success = false;

        for step in 1..=self.config.max_steps {
            if let Some(deadline) = self.config.run_deadline {
                if run_started.elapsed() >= deadline {
                    break;
                }
            }

            let batch = self.batch_for_step(&shuffled, step);
            let variants = self.prepare_variants(&programs, &ledger, &mut rng);

            let trajectories = self.run_trajectories(&executor, &batch, &variants, &metric).await;
            any_success = any_success || trajectories.iter().any(|t| t.success);

            for variant in &variants {
                let scores: Vec<f32> = trajectories
                    .iter()
                    .filter(|t| t.program.id == variant.id)
                    .map(|t| t.score)
                    .collect();
                if !scores.is_empty() {
                    ledger.record(variant.id, average_score(&scores));
                }
            }

            let buckets = self.build_buckets(&batch, trajectories);
            let minted = self.mint_candidates(&buckets, &mut rng).await;

            if !minted.is_empty() {
                let minted_trajectories = self
                    .run_trajectories(&executor, &batch, &minted, &metric)
                    .await;
                any_success = any_success || minted_trajectories.iter().any(|t| t.success);
                for candidate in &minted {
                    let scores: Vec<f32> = minted_trajectories
                        .iter()
                        .filter(|t| t.program.id == candidate.id)
                        .map(|t| t.score)
                        .collect();
                    if !scores.is_empty() {
                        ledger.record(candidate.id, average_score(&scores));
                    }
                }
                programs.extend(minted);
            }

            let mut ranked: Vec<&Program> = programs.iter().collect();
            ranked.sort_by(|a, b| {
                let score_a = ledger.running_average(a.id);
                let score_b = ledger.running_average(b.id);
                score_b
                    .partial_cmp(&score_a)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            });

            let mut retained: Vec<Program> = ranked
                .into_iter()
                .take(self.config.num_candidates)
                .cloned()
                .collect();
            if !retained.iter().any(|p| p.id == student_id) {
                retained.push(student.clone());
            }
            programs = retained;

            let step_best = programs
                .iter()
                .map(|p| ledger.running_average(p.id))
                .fold(0.0_f32, f32::max);

            if step_best - best_running_score >= self.config.min_improvement {
                best_running_score = step_best;
                steps_without_improvement = 0;
            } else {
                steps_without_improvement += 1;
            }

            if let Some(callback) = &self.config.progress_callback {
                callback(ProgressEvent {
                    phase: ProgressPhase::StepCompleted,
                    step,
                    completed: step,
                    total: self.config.max_steps,
                    best_score: best_running_score,
                    correlation_id,
                });
            }

            info!(event = "step_complete", step, best_score = best_running_score);

            if steps_without_improvement >= self.config.patience {
                info!(event = "converged", step);
                if let Some(callback) = &self.config.progress_callback {
                    callback(ProgressEvent {
                        phase: ProgressPhase::Converged,
                        step,
                        completed: step,
                        total: self.config.max_steps,
                        best_score: best_running_score,
                        correlation_id,
                    });
                }
                break;
            }
        }

        if !any_success {
            return Err(CompileError::NoSuccessfulBootstrapCandidates { correlation_id });
        }

        let best = programs
            .into_iter()
            .max_by(|a, b| {
                ledger
                    .running_average(a.id)
                    .partial_cmp(&ledger.running_average(b.id))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(student);

        Ok(best)
    }
}
