//! Entry handlers
//!
//! Each trigger assembles the terraform step list and its listeners, runs the
//! engine and records the finished run.

pub mod command;
pub mod push;

pub use command::{ApplyCommand, CommandHandler};
pub use push::{PushEvent, PushHandler};

use crate::core::{ExecutionContext, PipelineResult, Step};
use crate::execution::{ExecutionEngine, StepListener};
use crate::notify::ProgressRenderer;
use crate::persistence::{RunLog, RunRecord};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Collaborators shared by both handlers besides [`Services`](crate::core::Services)
#[derive(Clone, Default)]
pub struct HandlerHooks {
    /// Listeners notified after the progress renderer
    pub listeners: Vec<Arc<dyn StepListener>>,

    pub run_log: Option<Arc<dyn RunLog>>,
}

/// Run `steps` with a fresh progress renderer and record the outcome
pub(crate) async fn run_pipeline(
    steps: Vec<Box<dyn Step>>,
    context: &ExecutionContext,
    hooks: &HandlerHooks,
) -> PipelineResult {
    let renderer = Arc::new(ProgressRenderer::new(steps.len()));
    let mut engine = ExecutionEngine::new(steps).with_listener(renderer.clone());
    for listener in &hooks.listeners {
        engine.add_listener(listener.clone());
    }

    let started_at = Utc::now();
    let result = engine.execute(context).await;
    info!(
        "{} run {} for {} finished: {} ({})",
        context.trigger.as_str(),
        context.run_id,
        context.repo.slug(),
        result.code,
        result.reason
    );

    if let Some(run_log) = &hooks.run_log {
        let record = RunRecord::new(context, &result, renderer.full_transcript().await, started_at);
        if let Err(e) = run_log.save_run(&record).await {
            warn!("Failed to record run {}: {:#}", context.run_id, e);
        }
    }

    result
}
