//! Terminal listener
//!
//! Shows pipeline progress on the terminal: a progress bar over the steps
//! with one line printed per step transition, e.g. `[3/8] Init Terraform`.

use crate::cli::output::{create_progress_bar, format_output, CHECK, CROSS, SKIP, SPINNER};
use crate::core::{ExecutionContext, PipelineError, Registration, StepOutcome, StepResult};
use crate::execution::StepListener;
use async_trait::async_trait;
use console::style;
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Listener printing step transitions above a progress bar
pub struct TerminalListener {
    progress: ProgressBar,
    total_steps: usize,
    step_number: AtomicUsize,
    /// Lines of step output echoed after a step completes
    output_lines: usize,
}

impl TerminalListener {
    pub fn new(total_steps: usize, output_lines: usize) -> Self {
        Self {
            progress: create_progress_bar(total_steps),
            total_steps,
            step_number: AtomicUsize::new(0),
            output_lines,
        }
    }

    /// A listener drawing to a hidden bar, for tests and non-interactive use
    pub fn hidden(total_steps: usize) -> Self {
        Self {
            progress: ProgressBar::hidden(),
            total_steps,
            step_number: AtomicUsize::new(0),
            output_lines: 0,
        }
    }

    fn header(&self, step: &str) -> String {
        let number = self.step_number.load(Ordering::SeqCst) + 1;
        format!(
            "[{}/{}] {}",
            style(number).cyan(),
            style(self.total_steps).dim(),
            style(step).bold()
        )
    }

    fn finish_step(&self) {
        let done = self.step_number.fetch_add(1, Ordering::SeqCst) + 1;
        self.progress.inc(1);
        if done >= self.total_steps {
            self.progress.finish_and_clear();
        }
    }

    pub fn finished(&self) -> usize {
        self.step_number.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StepListener for TerminalListener {
    async fn starting(
        &self,
        _context: &ExecutionContext,
        _registration: &Registration,
        step: &str,
    ) -> Result<(), PipelineError> {
        self.progress.set_message(step.to_string());
        self.progress.println(format!("{}{}", SPINNER, self.header(step)));
        Ok(())
    }

    async fn skipped(
        &self,
        _context: &ExecutionContext,
        _registration: &Registration,
        step: &str,
    ) -> Result<(), PipelineError> {
        self.progress
            .println(format!("{}{} {}", SKIP, self.header(step), style("skipped").dim()));
        self.finish_step();
        Ok(())
    }

    async fn completed(
        &self,
        _context: &ExecutionContext,
        _registration: &Registration,
        step: &str,
        result: &StepResult,
    ) -> Result<(), PipelineError> {
        let line = match &result.outcome {
            StepOutcome::Ok { output } => {
                let mut line = format!("{}{}", CHECK, self.header(step));
                if let Some(output) = output.as_deref().filter(|_| self.output_lines > 0) {
                    line.push('\n');
                    line.push_str(&format_output(output.trim_end(), self.output_lines));
                }
                line
            }
            StepOutcome::Failed { code, reason } => format!(
                "{}{} {}\n{}",
                CROSS,
                self.header(step),
                style(format!("code {}", code)).red(),
                format_output(reason.trim_end(), self.output_lines.max(20))
            ),
            StepOutcome::Skipped { reason } => {
                format!("{}{} {}", SKIP, self.header(step), style(reason).dim())
            }
        };
        self.progress.println(line);
        self.finish_step();
        Ok(())
    }

    async fn failed(
        &self,
        _context: &ExecutionContext,
        _registration: &Registration,
        step: &str,
        error: &PipelineError,
    ) -> Result<(), PipelineError> {
        self.progress.println(format!(
            "{}{} {}",
            CROSS,
            self.header(step),
            style(error).red()
        ));
        self.progress.abandon();
        self.step_number.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;

    #[tokio::test]
    async fn test_counts_finished_steps() {
        let listener = TerminalListener::hidden(3);
        let context = test_context();
        let registration = Registration::default();

        listener.starting(&context, &registration, "Load Project").await.unwrap();
        listener
            .completed(&context, &registration, "Load Project", &StepResult::ok())
            .await
            .unwrap();
        listener.skipped(&context, &registration, "Set Terraform Version").await.unwrap();
        assert_eq!(listener.finished(), 2);

        listener
            .failed(
                &context,
                &registration,
                "Init Terraform",
                &PipelineError::MissingState("project"),
            )
            .await
            .unwrap();
        assert_eq!(listener.finished(), 3);
    }
}
