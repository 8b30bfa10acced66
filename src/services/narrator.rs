use crate::services::{
    classifier::ReportKind,
    dispatcher::{ReportOutcome, ReportRows},
    language_model::TextGenerator,
};
use metrics::counter;
use std::sync::Arc;
use tracing::warn;

pub const NO_DATA_MESSAGE: &str = "No data found.";

const SYSTEM_ROLE: &str = "You are a business insights assistant for a retail beverage ordering system. \
You report sales by SKU, merchant, district, time period and sales representative, \
surface insights such as top SKUs, trends and ordering patterns, \
and answer natural-language questions about them.";

/// Turns report outcomes into prose.
#[derive(Clone)]
pub struct Narrator {
    generator: Option<Arc<dyn TextGenerator>>,
    language: String,
}

impl Narrator {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>, language: impl Into<String>) -> Self {
        Self {
            generator,
            language: language.into(),
        }
    }

    fn prompt(&self, kind: ReportKind, rows_json: &str) -> String {
        format!(
            "{SYSTEM_ROLE}\n\n\
             Explain the following database query result to the user in plain words.\n\n\
             Query type: {kind}\n\
             Result: {rows_json}\n\n\
             Answer in {}, briefly and clearly. Include figures, comparisons and insights.",
            self.language
        )
    }

    /// Never fails: if the model is unavailable the rows are returned as
    /// pretty-printed JSON.
    pub async fn narrate(&self, outcome: &ReportOutcome, kind: ReportKind) -> String {
        let rows = match outcome {
            ReportOutcome::Failed { error } => return format!("An error occurred: {}", error.error),
            ReportOutcome::Unsupported { message } => return message.clone(),
            ReportOutcome::Rows { rows } if rows.is_empty() => return NO_DATA_MESSAGE.to_string(),
            ReportOutcome::Rows { rows } => rows,
        };

        let rows_json = pretty(rows);
        let Some(generator) = &self.generator else {
            return rows_json;
        };

        match generator.generate(&self.prompt(kind, &rows_json)).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                counter!("retail_insights.narrator.fallbacks", 1);
                warn!("Language model returned an empty narration, using raw rows");
                rows_json
            }
            Err(e) => {
                counter!("retail_insights.narrator.fallbacks", 1);
                warn!("Narration failed, using raw rows: {}", e);
                rows_json
            }
        }
    }
}

/// Pretty JSON rendering of report rows.
pub fn pretty(rows: &ReportRows) -> String {
    serde_json::to_string_pretty(rows).unwrap_or_else(|_| format!("{:?}", rows))
}
