//! Validation decisions and the evaluation write-back

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use review_common::db::schema::ensure_evaluation_tables;
use review_common::models::{ReviewSummary, UpdatedLabels, ValidationDecision, ValidationRequest};
use review_common::upsert::{build_upsert, EvaluationLabels, HumanEvaluation};
use review_common::Result;

use super::ReviewService;

/// Similar reviews searched after a correction
const RECOMMENDATIONS_PER_CORRECTION: usize = 5;

/// Body returned by the validate endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    pub success: bool,
    pub review_id: String,
    pub decision: ValidationDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corrections_made: Option<u32>,
    pub message: String,
}

impl ValidationOutcome {
    fn skipped(review_id: &str) -> Self {
        Self {
            success: true,
            review_id: review_id.to_string(),
            decision: ValidationDecision::Skip,
            corrections_made: None,
            message: format!("Review {} has been skipped (no evaluation written)", review_id),
        }
    }

    /// Response for sample-data mode, where nothing is written
    pub fn mock(review_id: &str, decision: ValidationDecision) -> Self {
        Self {
            success: true,
            review_id: review_id.to_string(),
            decision,
            corrections_made: None,
            message: format!("Review {} has been {}", review_id, decision.past_tense()),
        }
    }
}

/// Human-side labels: present corrections win, everything else keeps the displayed value
pub fn merge_labels(displayed: &ReviewSummary, corrections: &UpdatedLabels) -> EvaluationLabels {
    let base = EvaluationLabels::from_summary(displayed);

    EvaluationLabels {
        profane: corrections.profane.unwrap_or(base.profane),
        rewritten_comment: corrections
            .rewritten_comment
            .clone()
            .or(base.rewritten_comment),
        irrelevant: corrections.irrelevant().unwrap_or(base.irrelevant),
        overall_sentiment_label: corrections
            .overall_sentiment_label
            .clone()
            .or(base.overall_sentiment_label),
        overall_sentiment_score: corrections
            .overall_sentiment_score
            .or(base.overall_sentiment_score),
        category_sentiments: corrections
            .category_sentiments
            .clone()
            .unwrap_or(base.category_sentiments),
    }
}

impl ReviewService {
    /// Apply a reviewer decision to one review
    ///
    /// Skip returns immediately without touching the warehouse. Accept and override
    /// upsert one evaluation row; the machine side always records what was displayed.
    pub async fn validate(
        &self,
        response_id: &str,
        request: &ValidationRequest,
    ) -> Result<ValidationOutcome> {
        if request.decision == ValidationDecision::Skip {
            info!(response_id, "Review skipped");
            return Ok(ValidationOutcome::skipped(response_id));
        }

        let displayed = self.get_review(response_id).await?.summary;
        let machine = EvaluationLabels::from_summary(&displayed);

        let human_labels = match (request.decision, &request.updated_labels) {
            (ValidationDecision::Override, Some(corrections)) => {
                merge_labels(&displayed, corrections)
            }
            _ => machine.clone(),
        };

        let human = HumanEvaluation::new(&displayed, human_labels);
        let upsert = build_upsert(
            response_id,
            &human,
            Some(&machine),
            &self.settings.evaluation_model,
        )?;

        ensure_evaluation_tables(self.warehouse(), &self.tables).await?;
        let statement = upsert.to_statement(self.tables.evaluation(), self.dialect(), Utc::now())?;
        self.execute(&statement).await?;

        info!(
            response_id,
            decision = %request.decision,
            hash_key = %upsert.hash_key,
            table = self.tables.evaluation(),
            "Evaluation written"
        );

        let corrections_made = request.corrections_made.unwrap_or(0);
        if request.decision == ValidationDecision::Override
            && corrections_made > 0
            && self.settings.recommendations_enabled
        {
            self.recommend_after_correction(&displayed).await;
        }

        Ok(ValidationOutcome {
            success: true,
            review_id: response_id.to_string(),
            decision: request.decision,
            corrections_made: Some(corrections_made),
            message: format!(
                "Review {} has been {} and saved to evaluation table",
                response_id,
                request.decision.past_tense()
            ),
        })
    }

    /// Find reviews like a corrected one and store them; failures only warn
    async fn recommend_after_correction(&self, source: &ReviewSummary) {
        let hits = self
            .similar_reviews(source, RECOMMENDATIONS_PER_CORRECTION, true)
            .await;
        if hits.is_empty() {
            return;
        }

        match self
            .store_recommendations(&source.response_id, &source.question_response, &hits)
            .await
        {
            Ok(()) => info!(
                source = %source.response_id,
                count = hits.len(),
                "Stored recommendations after correction"
            ),
            Err(e) => warn!(
                source = %source.response_id,
                error = %e,
                "Could not store recommendations after correction"
            ),
        }
    }
}
