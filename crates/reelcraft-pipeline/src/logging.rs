//! Structured stage logging.

use tracing::{error, info, warn, Span};

/// Logger carrying the run id and stage name on every event.
#[derive(Debug, Clone)]
pub struct StageLogger {
    run_id: String,
    stage: String,
}

impl StageLogger {
    /// Logger for a fresh run of `stage`.
    pub fn new(stage: &str) -> Self {
        Self::with_run_id(&uuid::Uuid::new_v4().simple().to_string(), stage)
    }

    pub fn with_run_id(run_id: &str, stage: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            stage: stage.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(run_id = %self.run_id, stage = %self.stage, "Stage started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(run_id = %self.run_id, stage = %self.stage, "Stage progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(run_id = %self.run_id, stage = %self.stage, "Stage warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(run_id = %self.run_id, stage = %self.stage, "Stage error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(run_id = %self.run_id, stage = %self.stage, "Stage completed: {}", message);
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Span to instrument the stage's future with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("stage", run_id = %self.run_id, stage = %self.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_run_ids_differ() {
        let a = StageLogger::new("split");
        let b = StageLogger::new("split");
        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.stage(), "split");
    }

    #[test]
    fn test_with_run_id() {
        let logger = StageLogger::with_run_id("run-1", "assemble");
        assert_eq!(logger.run_id(), "run-1");
        assert_eq!(logger.stage(), "assemble");
    }
}
