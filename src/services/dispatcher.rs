use crate::{
    errors::ServiceError,
    services::{
        classifier::{ReportFilters, ReportKind},
        reports::ReportService,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Result rows of a report, one JSON object per row.
pub type ReportRows = Vec<Value>;

/// Message returned for questions no report can answer.
pub const UNSUPPORTED_MESSAGE: &str = "This type of question is not supported yet.";

/// Error details of a report that could not be executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFailure {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReportOutcome {
    Rows { rows: ReportRows },
    Unsupported { message: String },
    Failed { error: ReportFailure },
}

impl ReportOutcome {
    pub fn rows(&self) -> Option<&ReportRows> {
        match self {
            Self::Rows { rows } => Some(rows),
            _ => None,
        }
    }
}

fn to_rows<T: Serialize>(rows: Vec<T>) -> Result<ReportRows, ServiceError> {
    rows.into_iter()
        .map(|row| serde_json::to_value(row).map_err(ServiceError::from))
        .collect()
}

/// Routes a report kind and its filters to the matching report.
#[derive(Clone)]
pub struct ReportDispatcher {
    reports: ReportService,
}

impl ReportDispatcher {
    pub fn new(reports: ReportService) -> Self {
        Self { reports }
    }

    async fn run(
        &self,
        kind: ReportKind,
        filters: &ReportFilters,
    ) -> Result<ReportRows, ServiceError> {
        let r = &self.reports;
        let (start, end) = (filters.start_date, filters.end_date);

        match kind {
            ReportKind::Sku => to_rows(r.sales_by_sku(filters.sku_id, start, end).await?),
            ReportKind::Merchant => {
                to_rows(r.sales_by_merchant(filters.merchant_id, start, end).await?)
            }
            ReportKind::District => {
                to_rows(r.sales_by_district(filters.district.as_deref(), start, end).await?)
            }
            ReportKind::TimePeriod => to_rows(
                r.sales_by_time_period(filters.period.unwrap_or_default(), start, end)
                    .await?,
            ),
            ReportKind::SalesRep => {
                to_rows(r.sales_rep_performance(filters.sales_rep_id, start, end).await?)
            }
            ReportKind::TopSkus => to_rows(r.top_skus(filters.limit, start, end).await?),
            ReportKind::DistrictTrends => to_rows(r.district_trends(start, end).await?),
            ReportKind::CategorySummary => to_rows(r.category_summary(start, end).await?),
            ReportKind::MerchantPatterns => {
                to_rows(r.merchant_ordering_patterns(filters.merchant_id).await?)
            }
            ReportKind::General => Ok(Vec::new()),
        }
    }

    /// Executes the report for `kind`.
    ///
    /// Only an unreachable store is returned as an error; any other failure
    /// is folded into [`ReportOutcome::Failed`].
    pub async fn dispatch(
        &self,
        kind: ReportKind,
        filters: &ReportFilters,
    ) -> Result<ReportOutcome, ServiceError> {
        if kind == ReportKind::General {
            return Ok(ReportOutcome::Unsupported {
                message: UNSUPPORTED_MESSAGE.to_string(),
            });
        }

        match self.run(kind, filters).await {
            Ok(rows) => {
                info!(kind = %kind, rows = rows.len(), "Report dispatched");
                Ok(ReportOutcome::Rows { rows })
            }
            Err(e) if e.is_store_unavailable() => Err(e),
            Err(e) => {
                warn!(kind = %kind, "Report failed: {}", e);
                Ok(ReportOutcome::Failed {
                    error: ReportFailure {
                        error: e.to_string(),
                    },
                })
            }
        }
    }
}
