//! Per-item outcomes for batch stages.

use metrics::counter;
use serde::Serialize;

/// What happened to one item of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Success {
        #[serde(skip_serializing_if = "Vec::is_empty")]
        outputs: Vec<String>,
    },
    Skipped { reason: String },
    NotFound { what: String },
    Failed { error: String },
}

impl ItemOutcome {
    pub fn success(outputs: Vec<String>) -> Self {
        Self::Success { outputs }
    }

    pub fn failed(error: impl ToString) -> Self {
        Self::Failed {
            error: error.to_string(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ItemOutcome::Success { .. } => "success",
            ItemOutcome::Skipped { .. } => "skipped",
            ItemOutcome::NotFound { .. } => "not_found",
            ItemOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemReport {
    pub item: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

/// Outcomes of one stage run, in processing order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub stage: &'static str,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            items: Vec::new(),
        }
    }

    pub fn record(&mut self, item: impl Into<String>, outcome: ItemOutcome) {
        counter!("reelcraft_stage_items_total", "stage" => self.stage, "outcome" => outcome.label())
            .increment(1);
        self.items.push(ItemReport {
            item: item.into(),
            outcome,
        });
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Success { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Failed { .. } | ItemOutcome::NotFound { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ItemOutcome::Skipped { .. }))
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_serialization() {
        let mut report = BatchReport::new("extract");
        report.record("a.mp4", ItemOutcome::success(vec!["f-a.jpg".into()]));
        report.record("b.mp4", ItemOutcome::failed("decode error"));
        report.record("c.avi", ItemOutcome::Skipped { reason: "not mp4".into() });

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["items"][0]["status"], "success");
        assert_eq!(json["items"][0]["outputs"][0], "f-a.jpg");
        assert_eq!(json["items"][1]["error"], "decode error");
    }
}
