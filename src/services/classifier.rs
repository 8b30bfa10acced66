//! Maps free-text business questions to a report kind and its filters.
//!
//! Classification is a keyword pass over an ordered rule table. Rules are
//! evaluated top to bottom and every rule that fires overwrites the kind
//! chosen so far, so later rules take priority. When nothing fires the
//! question is handed to the remote text generator, whose answer must name
//! one of the report kinds.

use crate::services::language_model::TextGenerator;
use chrono::NaiveDate;
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::{debug, warn};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ReportKind {
    Sku,
    Merchant,
    District,
    TimePeriod,
    SalesRep,
    TopSkus,
    DistrictTrends,
    CategorySummary,
    MerchantPatterns,
    General,
}

impl ReportKind {
    /// Short description used when asking the remote classifier.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Sku => "sales of one or all SKUs (products)",
            Self::Merchant => "sales of one or all merchants (customers)",
            Self::District => "sales grouped by district",
            Self::TimePeriod => "sales bucketed by day, week or month",
            Self::SalesRep => "sales representative performance",
            Self::TopSkus => "best selling SKUs",
            Self::DistrictTrends => "district sales trends",
            Self::CategorySummary => "sales summary per product category",
            Self::MerchantPatterns => "monthly ordering patterns of merchants",
            Self::General => "anything else",
        }
    }

    /// Every kind backed by a report.
    pub fn reports() -> impl Iterator<Item = ReportKind> {
        ReportKind::iter().filter(|kind| *kind != ReportKind::General)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Period {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

/// Filter parameters extracted from a question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sales_rep_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedQuestion {
    pub kind: ReportKind,
    pub filters: ReportFilters,
    pub original_question: String,
}

const SKU_WORDS: &[&str] = &["sku", "бүтээгдэхүүн", "product", "item"];
const MERCHANT_WORDS: &[&str] = &["merchant", "худалдаачин", "client", "customer"];
const DISTRICT_WORDS: &[&str] = &["district", "бүс", "region", "area"];
const TIME_WORDS: &[&str] = &["day", "week", "month", "өдөр", "долоо хоног", "сар"];
const REP_WORDS: &[&str] = &["sales rep", "rep", "төлөөлөгч", "salesperson"];
const PATTERN_WORDS: &[&str] = &["pattern", "хэв маяг"];
const RANKING_WORDS: &[&str] = &["top", "best", "highest", "дээд", "хамгийн"];

static SKU_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"sku[:\s]+(\d+)").unwrap());
static MERCHANT_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"merchant[:\s]+(\d+)").unwrap());
static REP_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"rep[:\s]+(\d+)").unwrap());
static DISTRICT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"district[:\s]+([a-zа-яёөү\s]+)").unwrap());
static TOP_LIMIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:top|дээд)\s+(\d+)").unwrap());
static ISO_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").unwrap());

fn contains_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|word| text.contains(word))
}

fn capture_id(re: &Regex, text: &str) -> Option<i64> {
    re.captures(text)?.get(1)?.as_str().parse().ok()
}

fn time_period(text: &str) -> Option<Period> {
    if !contains_any(text, TIME_WORDS) {
        return None;
    }
    if contains_any(text, &["daily", "өдөр"]) {
        Some(Period::Daily)
    } else if contains_any(text, &["week", "долоо хоног"]) {
        Some(Period::Weekly)
    } else if contains_any(text, &["month", "сар"]) {
        Some(Period::Monthly)
    } else {
        None
    }
}

fn is_ranking(text: &str) -> bool {
    contains_any(text, RANKING_WORDS)
}

fn trend_subject(text: &str) -> bool {
    text.contains("district") || text.contains("trend")
}

/// One entry of the keyword table.
struct Rule {
    kind: ReportKind,
    fires: fn(&str) -> bool,
    extract: fn(&str, &mut ReportFilters),
}

fn no_extract(_: &str, _: &mut ReportFilters) {}

static RULES: &[Rule] = &[
    Rule {
        kind: ReportKind::Sku,
        fires: |t: &str| contains_any(t, SKU_WORDS),
        extract: |t: &str, f: &mut ReportFilters| {
            f.sku_id = capture_id(&SKU_ID, t).or(f.sku_id);
        },
    },
    Rule {
        kind: ReportKind::Merchant,
        fires: |t: &str| contains_any(t, MERCHANT_WORDS),
        extract: |t: &str, f: &mut ReportFilters| {
            f.merchant_id = capture_id(&MERCHANT_ID, t).or(f.merchant_id);
        },
    },
    Rule {
        kind: ReportKind::District,
        fires: |t: &str| contains_any(t, DISTRICT_WORDS),
        extract: |t: &str, f: &mut ReportFilters| {
            if let Some(name) = DISTRICT_NAME
                .captures(t)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim())
                .filter(|name| !name.is_empty())
            {
                f.district = Some(name.to_string());
            }
        },
    },
    Rule {
        kind: ReportKind::TimePeriod,
        fires: |t: &str| time_period(t).is_some(),
        extract: |t: &str, f: &mut ReportFilters| {
            f.period = time_period(t);
        },
    },
    Rule {
        kind: ReportKind::SalesRep,
        fires: |t: &str| contains_any(t, REP_WORDS),
        extract: |t: &str, f: &mut ReportFilters| {
            f.sales_rep_id = capture_id(&REP_ID, t).or(f.sales_rep_id);
        },
    },
    Rule {
        kind: ReportKind::MerchantPatterns,
        fires: |t: &str| contains_any(t, PATTERN_WORDS) && contains_any(t, MERCHANT_WORDS),
        extract: no_extract,
    },
    Rule {
        kind: ReportKind::TopSkus,
        fires: |t: &str| is_ranking(t) && t.contains("sku"),
        extract: |t: &str, f: &mut ReportFilters| {
            f.limit = capture_id(&TOP_LIMIT, t).map(|n| n as u64).or(f.limit);
        },
    },
    Rule {
        kind: ReportKind::DistrictTrends,
        fires: |t: &str| is_ranking(t) && !t.contains("sku") && trend_subject(t),
        extract: no_extract,
    },
    Rule {
        kind: ReportKind::CategorySummary,
        fires: |t: &str| {
            is_ranking(t) && !t.contains("sku") && !trend_subject(t) && t.contains("category")
        },
        extract: no_extract,
    },
];

/// Valid calendar dates in order of appearance.
fn extract_dates(question: &str) -> Vec<NaiveDate> {
    ISO_DATE
        .find_iter(question)
        .filter_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
        .collect()
}

/// Keyword-only classification. Yields `general` when no rule fires.
pub fn classify_keywords(question: &str) -> ParsedQuestion {
    let text = question.to_lowercase();
    let mut kind = ReportKind::General;
    let mut filters = ReportFilters::default();

    for rule in RULES {
        if (rule.fires)(&text) {
            kind = rule.kind;
            (rule.extract)(&text, &mut filters);
        }
    }

    let dates = extract_dates(question);
    filters.start_date = dates.first().copied();
    filters.end_date = dates.get(1).copied();

    ParsedQuestion {
        kind,
        filters,
        original_question: question.to_string(),
    }
}

/// Maps a free-form model answer to a report kind.
pub fn normalize_label(raw: &str) -> ReportKind {
    let label: String = raw
        .trim()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '.' | '*'))
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect();

    ReportKind::from_str(&label).unwrap_or(ReportKind::General)
}

fn classification_prompt(question: &str) -> String {
    let kinds: Vec<String> = ReportKind::reports()
        .map(|kind| format!("- {}: {}", kind, kind.description()))
        .collect();

    format!(
        "Classify the following business question about a retail ordering system.\n\n\
         Question: {}\n\n\
         Possible types:\n{}\n\n\
         Answer with the type name only (for example: sku).",
        question,
        kinds.join("\n")
    )
}

/// Keyword classifier with an optional remote fallback.
#[derive(Clone, Default)]
pub struct Classifier {
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Classifier {
    pub fn new(generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { generator }
    }

    pub async fn classify(&self, question: &str) -> ParsedQuestion {
        let mut parsed = classify_keywords(question);
        if parsed.kind != ReportKind::General {
            debug!(kind = %parsed.kind, "Question classified by keywords");
            return parsed;
        }

        let Some(generator) = &self.generator else {
            return parsed;
        };

        counter!("retail_insights.classifier.fallbacks", 1);
        parsed.kind = match generator.generate(&classification_prompt(question)).await {
            Ok(answer) => {
                let kind = normalize_label(&answer);
                debug!(answer = %answer.trim(), kind = %kind, "Remote classification");
                kind
            }
            Err(e) => {
                warn!("Remote classification failed, using general: {}", e);
                ReportKind::General
            }
        };
        parsed
    }
}
