use crate::{
    db::{
        query_builder::{bucket_expr, Bucket, QueryBuilder},
        ConnectionProvider, DbPool,
    },
    errors::ServiceError,
    services::classifier::Period,
};
use chrono::NaiveDate;
use metrics::{counter, histogram};
use sea_orm::{ConnectionTrait, DbBackend, FromQueryResult, Statement};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, instrument};

/// Default and maximum row count of the top-SKU report.
pub const DEFAULT_TOP_LIMIT: u64 = 10;
pub const MAX_TOP_LIMIT: u64 = 100;

const REVENUE: &str = "CAST(COALESCE(SUM(oi.quantity * oi.price), 0) AS DOUBLE PRECISION)";
const QUANTITY: &str = "CAST(COALESCE(SUM(oi.quantity), 0) AS BIGINT)";
const ORDER_COUNT: &str = "CAST(COUNT(DISTINCT o.id) AS BIGINT)";

/// Sales of a single SKU
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct SkuSales {
    pub sku_id: i64,
    pub sku_name: String,
    pub category: Option<String>,
    pub total_sales: f64,
    pub total_quantity: i64,
    pub order_count: i64,
}

/// Sales of a single merchant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct MerchantSales {
    pub merchant_id: i64,
    pub merchant_name: String,
    pub district: Option<String>,
    pub total_sales: f64,
    pub total_quantity: i64,
    pub order_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct DistrictSales {
    pub district: Option<String>,
    pub total_sales: f64,
    pub total_quantity: i64,
    pub order_count: i64,
    pub merchant_count: i64,
}

/// Sales of one time bucket. `period` is the ISO date the bucket starts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct PeriodSales {
    pub period: Option<String>,
    pub total_sales: f64,
    pub total_quantity: i64,
    pub order_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct SalesRepPerformance {
    pub sales_rep_id: i64,
    pub sales_rep_name: String,
    pub total_sales: f64,
    pub total_quantity: i64,
    pub order_count: i64,
    pub merchant_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct CategorySales {
    pub category: Option<String>,
    pub total_sales: f64,
    pub total_quantity: i64,
    pub order_count: i64,
    pub sku_count: i64,
}

/// Orders and revenue of one merchant in one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromQueryResult)]
pub struct MerchantMonth {
    pub merchant_id: i64,
    pub merchant_name: String,
    pub month: Option<String>,
    pub orders_per_month: i64,
    pub monthly_sales: f64,
}

impl From<Period> for Bucket {
    fn from(period: Period) -> Self {
        match period {
            Period::Daily => Bucket::Day,
            Period::Weekly => Bucket::Week,
            Period::Monthly => Bucket::Month,
        }
    }
}

/// Clamps a requested top-N size into `1..=MAX_TOP_LIMIT`.
pub fn clamp_limit(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_TOP_LIMIT)
}

/// Fixed, read-only aggregate reports over the ordering dataset.
///
/// Every report is a single parameterized statement. Ties in the sort key
/// are broken by the row's identifier or name so repeated calls over the
/// same data return rows in the same order.
#[derive(Clone)]
pub struct ReportService {
    provider: Arc<dyn ConnectionProvider>,
}

impl ReportService {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn ConnectionProvider> {
        &self.provider
    }

    /// One validated handle per report; the statement is built for its backend.
    async fn pool(&self) -> Result<(Arc<DbPool>, DbBackend), ServiceError> {
        let db = self.provider.connection().await?;
        let backend = db.get_database_backend();
        Ok((db, backend))
    }

    async fn fetch<T>(
        db: &DbPool,
        report: &'static str,
        stmt: Statement,
    ) -> Result<Vec<T>, ServiceError>
    where
        T: FromQueryResult + Send,
    {
        let start = Instant::now();
        debug!(report, sql = %stmt.sql, "Running report");

        let rows = T::find_by_statement(stmt).all(db).await.map_err(|e| {
            error!(report, "Report query failed: {}", e);
            counter!("retail_insights.report.failures", 1, "report" => report);
            ServiceError::DatabaseError(e)
        })?;

        counter!("retail_insights.report.executions", 1, "report" => report);
        histogram!(
            "retail_insights.report.duration",
            start.elapsed().as_secs_f64(),
            "report" => report
        );
        debug!(report, rows = rows.len(), "Report finished in {:?}", start.elapsed());
        Ok(rows)
    }

    fn sku_query(backend: DbBackend) -> QueryBuilder {
        QueryBuilder::new(
            backend,
            &format!(
                "SELECT CAST(s.id AS BIGINT) AS sku_id, s.name AS sku_name, s.category AS category, \
                 {REVENUE} AS total_sales, {QUANTITY} AS total_quantity, {ORDER_COUNT} AS order_count \
                 FROM sku s \
                 LEFT JOIN order_items oi ON s.id = oi.sku_id \
                 LEFT JOIN orders o ON oi.order_id = o.id \
                 WHERE 1=1"
            ),
        )
    }

    fn district_query(backend: DbBackend) -> QueryBuilder {
        QueryBuilder::new(
            backend,
            &format!(
                "SELECT m.district AS district, {REVENUE} AS total_sales, \
                 {QUANTITY} AS total_quantity, {ORDER_COUNT} AS order_count, \
                 CAST(COUNT(DISTINCT m.id) AS BIGINT) AS merchant_count \
                 FROM merchants m \
                 LEFT JOIN orders o ON m.id = o.merchant_id \
                 LEFT JOIN order_items oi ON o.id = oi.order_id \
                 WHERE 1=1"
            ),
        )
    }

    fn date_range(
        query: QueryBuilder,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> QueryBuilder {
        query
            .filter_opt("o.order_date", ">=", start)
            .filter_opt("o.order_date", "<=", end)
    }

    #[instrument(skip(self))]
    pub async fn sales_by_sku(
        &self,
        sku_id: Option<i64>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SkuSales>, ServiceError> {
        let (db, backend) = self.pool().await?;
        let query = Self::sku_query(backend).filter_opt("s.id", "=", sku_id);
        let stmt = Self::date_range(query, start, end)
            .push("GROUP BY s.id, s.name, s.category ORDER BY total_sales DESC, sku_id ASC")
            .build();
        Self::fetch(&db, "sales_by_sku", stmt).await
    }

    #[instrument(skip(self))]
    pub async fn sales_by_merchant(
        &self,
        merchant_id: Option<i64>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<MerchantSales>, ServiceError> {
        let (db, backend) = self.pool().await?;
        let query = QueryBuilder::new(
            backend,
            &format!(
                "SELECT CAST(m.id AS BIGINT) AS merchant_id, m.name AS merchant_name, \
                 m.district AS district, {REVENUE} AS total_sales, \
                 {QUANTITY} AS total_quantity, {ORDER_COUNT} AS order_count \
                 FROM merchants m \
                 LEFT JOIN orders o ON m.id = o.merchant_id \
                 LEFT JOIN order_items oi ON o.id = oi.order_id \
                 WHERE 1=1"
            ),
        )
        .filter_opt("m.id", "=", merchant_id);

        let stmt = Self::date_range(query, start, end)
            .push("GROUP BY m.id, m.name, m.district ORDER BY total_sales DESC, merchant_id ASC")
            .build();
        Self::fetch(&db, "sales_by_merchant", stmt).await
    }

    /// District names compare case-insensitively.
    #[instrument(skip(self))]
    pub async fn sales_by_district(
        &self,
        district: Option<&str>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<DistrictSales>, ServiceError> {
        let (db, backend) = self.pool().await?;
        let district = district
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_lowercase);
        let query = Self::district_query(backend).filter_opt(
            "LOWER(m.district)",
            "=",
            district,
        );
        let stmt = Self::date_range(query, start, end)
            .push("GROUP BY m.district ORDER BY total_sales DESC, district ASC")
            .build();
        Self::fetch(&db, "sales_by_district", stmt).await
    }

    #[instrument(skip(self))]
    pub async fn sales_by_time_period(
        &self,
        period: Period,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<PeriodSales>, ServiceError> {
        let (db, backend) = self.pool().await?;
        let bucket = bucket_expr(backend, period.into(), "o.order_date");
        let query = QueryBuilder::new(
            backend,
            &format!(
                "SELECT {bucket} AS period, {REVENUE} AS total_sales, \
                 {QUANTITY} AS total_quantity, {ORDER_COUNT} AS order_count \
                 FROM orders o \
                 LEFT JOIN order_items oi ON o.id = oi.order_id \
                 WHERE 1=1"
            ),
        );
        let stmt = Self::date_range(query, start, end)
            .push("GROUP BY 1 ORDER BY 1 DESC")
            .build();
        Self::fetch(&db, "sales_by_time_period", stmt).await
    }

    #[instrument(skip(self))]
    pub async fn sales_rep_performance(
        &self,
        sales_rep_id: Option<i64>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SalesRepPerformance>, ServiceError> {
        let (db, backend) = self.pool().await?;
        let query = QueryBuilder::new(
            backend,
            &format!(
                "SELECT CAST(sr.id AS BIGINT) AS sales_rep_id, sr.name AS sales_rep_name, \
                 {REVENUE} AS total_sales, {QUANTITY} AS total_quantity, \
                 {ORDER_COUNT} AS order_count, \
                 CAST(COUNT(DISTINCT o.merchant_id) AS BIGINT) AS merchant_count \
                 FROM sales_reps sr \
                 LEFT JOIN orders o ON sr.id = o.sales_rep_id \
                 LEFT JOIN order_items oi ON o.id = oi.order_id \
                 WHERE 1=1"
            ),
        )
        .filter_opt("sr.id", "=", sales_rep_id);

        let stmt = Self::date_range(query, start, end)
            .push("GROUP BY sr.id, sr.name ORDER BY total_sales DESC, sales_rep_id ASC")
            .build();
        Self::fetch(&db, "sales_rep_performance", stmt).await
    }

    /// Best selling SKUs. The limit is applied by the store.
    #[instrument(skip(self))]
    pub async fn top_skus(
        &self,
        limit: Option<u64>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<SkuSales>, ServiceError> {
        let (db, backend) = self.pool().await?;
        let query = Self::sku_query(backend);
        let stmt = Self::date_range(query, start, end)
            .push("GROUP BY s.id, s.name, s.category ORDER BY total_sales DESC, sku_id ASC")
            .limit(clamp_limit(limit))
            .build();
        Self::fetch(&db, "top_skus", stmt).await
    }

    #[instrument(skip(self))]
    pub async fn district_trends(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<DistrictSales>, ServiceError> {
        let (db, backend) = self.pool().await?;
        let query = Self::district_query(backend);
        let stmt = Self::date_range(query, start, end)
            .push("GROUP BY m.district ORDER BY total_sales DESC, district ASC")
            .build();
        Self::fetch(&db, "district_trends", stmt).await
    }

    #[instrument(skip(self))]
    pub async fn category_summary(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<CategorySales>, ServiceError> {
        let (db, backend) = self.pool().await?;
        let query = QueryBuilder::new(
            backend,
            &format!(
                "SELECT s.category AS category, {REVENUE} AS total_sales, \
                 {QUANTITY} AS total_quantity, {ORDER_COUNT} AS order_count, \
                 CAST(COUNT(DISTINCT s.id) AS BIGINT) AS sku_count \
                 FROM sku s \
                 LEFT JOIN order_items oi ON s.id = oi.sku_id \
                 LEFT JOIN orders o ON oi.order_id = o.id \
                 WHERE 1=1"
            ),
        );
        let stmt = Self::date_range(query, start, end)
            .push("GROUP BY s.category ORDER BY total_sales DESC, category ASC")
            .build();
        Self::fetch(&db, "category_summary", stmt).await
    }

    /// Monthly order counts and revenue per merchant, newest month first.
    #[instrument(skip(self))]
    pub async fn merchant_ordering_patterns(
        &self,
        merchant_id: Option<i64>,
    ) -> Result<Vec<MerchantMonth>, ServiceError> {
        let (db, backend) = self.pool().await?;
        let month = bucket_expr(backend, Bucket::Month, "o.order_date");
        let stmt = QueryBuilder::new(
            backend,
            &format!(
                "SELECT CAST(m.id AS BIGINT) AS merchant_id, m.name AS merchant_name, \
                 {month} AS month, {ORDER_COUNT} AS orders_per_month, \
                 {REVENUE} AS monthly_sales \
                 FROM merchants m \
                 LEFT JOIN orders o ON m.id = o.merchant_id \
                 LEFT JOIN order_items oi ON o.id = oi.order_id \
                 WHERE 1=1"
            ),
        )
        .filter_opt("m.id", "=", merchant_id)
        .push(&format!("GROUP BY m.id, m.name, {month} ORDER BY 1 ASC, 3 DESC"))
        .build();
        Self::fetch(&db, "merchant_ordering_patterns", stmt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, 10)]
    #[case(Some(0), 1)]
    #[case(Some(25), 25)]
    #[case(Some(5000), 100)]
    fn top_limit_is_clamped(#[case] requested: Option<u64>, #[case] expected: u64) {
        assert_eq!(clamp_limit(requested), expected);
    }

    #[test]
    fn period_maps_to_bucket() {
        assert_eq!(Bucket::from(Period::Daily), Bucket::Day);
        assert_eq!(Bucket::from(Period::Weekly), Bucket::Week);
        assert_eq!(Bucket::from(Period::Monthly), Bucket::Month);
    }

    #[test]
    fn sku_query_filters_before_grouping() {
        let stmt = ReportService::date_range(
            ReportService::sku_query(DbBackend::Postgres).filter_opt("s.id", "=", Some(5i64)),
            NaiveDate::from_ymd_opt(2024, 1, 1),
            None,
        )
        .push("GROUP BY s.id")
        .build();

        assert!(stmt.sql.contains("WHERE 1=1 AND s.id = $1 AND o.order_date >= $2 GROUP BY s.id"));
    }
}
