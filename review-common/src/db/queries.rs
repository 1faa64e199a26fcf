//! Statement builders for the review workflow

use chrono::{DateTime, Utc};

use super::Tables;
use crate::warehouse::{Dialect, Statement};

/// Source columns aliased to the names the row converter reads
const SOURCE_SELECT: &str = "t.SurveyResponseId AS response_id,
        t.QuestionLabel AS question_label,
        t.QuestionResponse AS question_response,
        t.ResponseRelevancy AS response_relevancy,
        t.IsProfanityRewrittenFlag AS profane,
        t.RewrittenQuestionResponse AS rewritten_comment,
        t.OverallSentimentLabel AS overall_sentiment_label,
        t.OverallSentimentScore AS overall_sentiment_score,
        t.CommentCategory AS comment_category,
        t.CategorySentimentLabel AS category_sentiment_label,
        t.CategorySentimentScore AS category_sentiment_score,
        t.CommentSubcategory AS comment_subcategory,
        t.SubCategorySentimentLabel AS subcategory_sentiment_label,
        t.SubCategorySentimentScore AS subcategory_sentiment_score,
        t.StoreKey AS store_key,
        t.VisitDateTime AS visit_datetime";

const EVALUATION_SELECT: &str = "survey_response_id,
        question_label,
        question_response,
        response_relevancy,
        overall_sentiment_label,
        overall_sentiment_score,
        category_subcategory_list,
        human_eval_profane,
        human_eval_rewritten_comment,
        human_eval_irrelevant,
        human_eval_overall_sentiment_label,
        human_eval_overall_sentiment_score,
        human_eval_category_sentiments,
        machine_eval_overall_sentiment_score,
        store_key,
        visit_datetime,
        evaluation_model,
        created_at,
        updated_at";

/// Random page of survey responses, with all their category rows
///
/// `limit` and `offset` count responses, not rows. With `exclude_evaluated` the page
/// only holds responses that have no evaluation row yet.
pub fn pending_reviews(
    tables: &Tables,
    dialect: Dialect,
    limit: u32,
    offset: u32,
    exclude_evaluated: bool,
) -> Statement {
    let exclusion = if exclude_evaluated {
        format!(
            "\n        AND SurveyResponseId NOT IN (SELECT DISTINCT survey_response_id FROM {})",
            tables.evaluation()
        )
    } else {
        String::new()
    };

    Statement::new(format!(
        "WITH unique_surveys AS (
    SELECT SurveyResponseId
    FROM {source}
    WHERE 1=1{exclusion}
    GROUP BY SurveyResponseId
    ORDER BY {random}
    LIMIT {limit} OFFSET {offset}
)
SELECT
        {SOURCE_SELECT}
FROM {source} t
INNER JOIN unique_surveys u ON t.SurveyResponseId = u.SurveyResponseId
ORDER BY response_id, comment_category, comment_subcategory",
        source = tables.source(),
        random = dialect.random_fn(),
    ))
}

/// All category rows of one survey response
pub fn source_rows_by_id(tables: &Tables, response_id: &str) -> Statement {
    Statement::new(format!(
        "SELECT
        {SOURCE_SELECT}
FROM {} t
WHERE t.SurveyResponseId = :response_id
ORDER BY comment_category, comment_subcategory",
        tables.source()
    ))
    .bind("response_id", response_id)
}

/// Category rows of several survey responses
pub fn source_rows_by_ids(tables: &Tables, response_ids: &[String]) -> Statement {
    let markers = (0..response_ids.len())
        .map(|i| format!(":id{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let statement = Statement::new(format!(
        "SELECT
        {SOURCE_SELECT}
FROM {} t
WHERE t.SurveyResponseId IN ({})
ORDER BY response_id, comment_category, comment_subcategory",
        tables.source(),
        markers
    ));

    response_ids
        .iter()
        .enumerate()
        .fold(statement, |stmt, (i, id)| stmt.bind(&format!("id{}", i), id.as_str()))
}

/// Evaluated reviews, newest first
pub fn completed_reviews(tables: &Tables, limit: u32, offset: u32) -> Statement {
    Statement::new(format!(
        "SELECT
        {EVALUATION_SELECT}
FROM {}
ORDER BY created_at DESC
LIMIT {} OFFSET {}",
        tables.evaluation(),
        limit,
        offset
    ))
}

pub fn evaluation_by_id(tables: &Tables, response_id: &str) -> Statement {
    Statement::new(format!(
        "SELECT
        {EVALUATION_SELECT}
FROM {}
WHERE survey_response_id = :response_id
LIMIT 1",
        tables.evaluation()
    ))
    .bind("response_id", response_id)
}

pub fn count_source_responses(tables: &Tables) -> Statement {
    Statement::new(format!(
        "SELECT COUNT(DISTINCT SurveyResponseId) AS total_count FROM {}",
        tables.source()
    ))
}

pub fn count_evaluations(tables: &Tables) -> Statement {
    Statement::new(format!(
        "SELECT COUNT(DISTINCT survey_response_id) AS eval_count FROM {}",
        tables.evaluation()
    ))
}

/// Original vs human overall score for every joined (source row, evaluation) pair
///
/// Source rows are per category, so a response contributes one pair per category row.
pub fn accuracy_pairs(tables: &Tables) -> Statement {
    Statement::new(format!(
        "SELECT
        src.SurveyResponseId AS response_id,
        src.OverallSentimentScore AS orig_overall_score,
        ev.human_eval_overall_sentiment_score AS human_overall_score
FROM {} src
INNER JOIN {} ev ON src.SurveyResponseId = ev.survey_response_id",
        tables.source(),
        tables.evaluation()
    ))
}

/// Responses with any category or subcategory score outside [-0.5, 0.5]
pub fn count_recommended(tables: &Tables) -> Statement {
    Statement::new(format!(
        "SELECT COUNT(DISTINCT SurveyResponseId) AS recommended_count
FROM {}
WHERE (CategorySentimentScore < -0.5 OR CategorySentimentScore > 0.5)
   OR (SubCategorySentimentScore < -0.5 OR SubCategorySentimentScore > 0.5)",
        tables.source()
    ))
}

pub fn deactivate_recommendations(tables: &Tables, source_review_id: &str) -> Statement {
    Statement::new(format!(
        "UPDATE {} SET is_active = :inactive WHERE source_review_id = :source_review_id",
        tables.recommendations()
    ))
    .bind("inactive", false)
    .bind("source_review_id", source_review_id)
}

pub fn insert_recommendation(
    tables: &Tables,
    source_review_id: &str,
    recommended_review_id: &str,
    similarity_score: f64,
    source_review_text: &str,
    now: DateTime<Utc>,
) -> Statement {
    Statement::new(format!(
        "INSERT INTO {} (
        source_review_id, recommended_review_id, similarity_score,
        recommendation_timestamp, source_review_text, is_active
) VALUES (
        :source_review_id, :recommended_review_id, :similarity_score,
        :now, :source_review_text, :active
)",
        tables.recommendations()
    ))
    .bind("source_review_id", source_review_id)
    .bind("recommended_review_id", recommended_review_id)
    .bind("similarity_score", similarity_score)
    .bind("now", now)
    .bind("source_review_text", source_review_text)
    .bind("active", true)
}

/// Active recommendation groups, newest first
pub fn recommendation_groups(tables: &Tables) -> Statement {
    Statement::new(format!(
        "SELECT
        r.source_review_id,
        r.source_review_text,
        MAX(r.recommendation_timestamp) AS recommendation_timestamp,
        COUNT(*) AS recommendation_count
FROM {} r
WHERE r.is_active = :active
GROUP BY r.source_review_id, r.source_review_text
ORDER BY MAX(r.recommendation_timestamp) DESC",
        tables.recommendations()
    ))
    .bind("active", true)
}

/// Active recommended ids for one source review, best match first
pub fn recommendations_for_source(tables: &Tables, source_review_id: &str) -> Statement {
    Statement::new(format!(
        "SELECT recommended_review_id, similarity_score
FROM {}
WHERE source_review_id = :source_review_id AND is_active = :active
ORDER BY similarity_score DESC",
        tables.recommendations()
    ))
    .bind("source_review_id", source_review_id)
    .bind("active", true)
}

pub fn select_one() -> Statement {
    Statement::new("SELECT 1 AS test_value")
}

pub fn describe_source(tables: &Tables, dialect: Dialect) -> Statement {
    Statement::new(dialect.describe_table(tables.source()))
}
