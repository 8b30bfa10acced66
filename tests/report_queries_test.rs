mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use retail_insights::{
    db::{ConnectionProvider, DbConfig, DbPool, LazyConnection},
    errors::ServiceError,
    services::{
        classifier::{Period, ReportFilters, ReportKind},
        dispatcher::{ReportDispatcher, ReportOutcome, UNSUPPORTED_MESSAGE},
        reports::ReportService,
    },
};
use sea_orm::{ConnectionTrait, DatabaseBackend, Statement};

fn date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

async fn service() -> ReportService {
    ReportService::new(common::seeded_provider().await)
}

/// Provider that counts how often a handle is requested.
struct CountingProvider {
    inner: Arc<dyn ConnectionProvider>,
    calls: AtomicUsize,
}

#[async_trait]
impl ConnectionProvider for CountingProvider {
    async fn connection(&self) -> Result<Arc<DbPool>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.connection().await
    }

    async fn reconnect(&self) -> Result<Arc<DbPool>, ServiceError> {
        self.inner.reconnect().await
    }
}

#[tokio::test]
async fn each_report_acquires_one_connection() {
    let provider = Arc::new(CountingProvider {
        inner: common::seeded_provider().await,
        calls: AtomicUsize::new(0),
    });
    let reports = ReportService::new(provider.clone());

    reports.sales_by_sku(None, None, None).await.unwrap();
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    reports
        .sales_by_time_period(Period::Weekly, None, None)
        .await
        .unwrap();
    reports.merchant_ordering_patterns(None).await.unwrap();
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn sales_by_sku_ranks_by_revenue() {
    let rows = service().await.sales_by_sku(None, None, None).await.unwrap();

    let ids: Vec<i64> = rows.iter().map(|r| r.sku_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    let cola = &rows[0];
    assert_eq!(cola.sku_name, "Cola");
    assert_eq!(cola.category.as_deref(), Some("Beverages"));
    assert!((cola.total_sales - 40.0).abs() < 1e-9);
    assert_eq!(cola.total_quantity, 16);
    assert_eq!(cola.order_count, 3);

    let juice = &rows[3];
    assert_eq!(juice.total_sales, 0.0);
    assert_eq!(juice.total_quantity, 0);
    assert_eq!(juice.order_count, 0);
}

#[tokio::test]
async fn sales_by_sku_applies_id_and_date_window() {
    let reports = service().await;
    let rows = reports
        .sales_by_sku(Some(1), date("2024-01-01"), date("2024-01-10"))
        .await
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert!((rows[0].total_sales - 35.0).abs() < 1e-9);
    assert_eq!(rows[0].order_count, 2);
}

#[tokio::test]
async fn sales_by_merchant_includes_merchants_without_orders() {
    let rows = service()
        .await
        .sales_by_merchant(None, None, None)
        .await
        .unwrap();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].merchant_name, "Alpha Mart");
    assert!((rows[0].total_sales - 40.0).abs() < 1e-9);
    assert!((rows[1].total_sales - 37.0).abs() < 1e-9);
    assert_eq!(rows[2].merchant_id, 3);
    assert_eq!(rows[2].order_count, 0);
}

#[tokio::test]
async fn sales_by_district_matches_names_case_insensitively() {
    let reports = service().await;
    let all = reports.sales_by_district(None, None, None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].district.as_deref(), Some("Bayanzurkh"));
    assert_eq!(all[0].merchant_count, 2);

    let one = reports
        .sales_by_district(Some("bayanzurkh"), None, None)
        .await
        .unwrap();
    assert_eq!(one.len(), 1);
    assert!((one[0].total_sales - 40.0).abs() < 1e-9);
    assert_eq!(one[0].order_count, 2);
}

#[tokio::test]
async fn time_period_buckets_newest_first() {
    let reports = service().await;

    let daily = reports
        .sales_by_time_period(Period::Daily, None, None)
        .await
        .unwrap();
    let days: Vec<&str> = daily.iter().filter_map(|r| r.period.as_deref()).collect();
    assert_eq!(days, vec!["2024-02-05", "2024-01-15", "2024-01-03", "2024-01-01"]);

    let weekly = reports
        .sales_by_time_period(Period::Weekly, None, None)
        .await
        .unwrap();
    let weeks: Vec<(&str, f64)> = weekly
        .iter()
        .map(|r| (r.period.as_deref().unwrap_or_default(), r.total_sales))
        .collect();
    assert_eq!(
        weeks,
        vec![("2024-02-05", 20.0), ("2024-01-15", 17.0), ("2024-01-01", 40.0)]
    );

    let monthly = reports
        .sales_by_time_period(Period::Monthly, None, None)
        .await
        .unwrap();
    assert_eq!(monthly.len(), 2);
    assert_eq!(monthly[1].period.as_deref(), Some("2024-01-01"));
    assert!((monthly[1].total_sales - 57.0).abs() < 1e-9);
    assert_eq!(monthly[1].order_count, 3);
}

#[tokio::test]
async fn sales_rep_performance_counts_distinct_merchants() {
    let rows = service()
        .await
        .sales_rep_performance(None, None, None)
        .await
        .unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].sales_rep_name, "Bat");
    assert!((rows[0].total_sales - 60.0).abs() < 1e-9);
    assert_eq!(rows[0].order_count, 3);
    assert_eq!(rows[0].merchant_count, 2);
}

#[tokio::test]
async fn top_skus_limits_inside_the_query() {
    let reports = service().await;
    let rows = reports.top_skus(Some(2), None, None).await.unwrap();
    let ids: Vec<i64> = rows.iter().map(|r| r.sku_id).collect();
    assert_eq!(ids, vec![1, 2]);

    let default = reports.top_skus(None, None, None).await.unwrap();
    assert_eq!(default.len(), 4);
}

#[tokio::test]
async fn category_summary_groups_by_category() {
    let rows = service().await.category_summary(None, None).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].category.as_deref(), Some("Beverages"));
    assert!((rows[0].total_sales - 65.0).abs() < 1e-9);
    assert_eq!(rows[0].sku_count, 3);
    assert_eq!(rows[0].order_count, 4);
}

#[tokio::test]
async fn merchant_patterns_are_monthly_per_merchant() {
    let reports = service().await;
    let rows = reports.merchant_ordering_patterns(Some(2)).await.unwrap();

    let months: Vec<(Option<&str>, i64)> = rows
        .iter()
        .map(|r| (r.month.as_deref(), r.orders_per_month))
        .collect();
    assert_eq!(months, vec![(Some("2024-02-01"), 1), (Some("2024-01-01"), 1)]);

    let all = reports.merchant_ordering_patterns(None).await.unwrap();
    assert_eq!(all.first().map(|r| r.merchant_id), Some(1));
    assert_eq!(all.last().map(|r| r.merchant_id), Some(3));
}

#[tokio::test]
async fn reports_are_idempotent() {
    let reports = service().await;
    let first = reports.district_trends(None, None).await.unwrap();
    let second = reports.district_trends(None, None).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn dispatcher_routes_kinds_to_reports() {
    let dispatcher = ReportDispatcher::new(service().await);
    let filters = ReportFilters {
        sku_id: Some(3),
        ..Default::default()
    };

    let outcome = dispatcher.dispatch(ReportKind::Sku, &filters).await.unwrap();
    let rows = outcome.rows().expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["sku_name"], "Chips");

    let outcome = dispatcher
        .dispatch(ReportKind::General, &ReportFilters::default())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ReportOutcome::Unsupported {
            message: UNSUPPORTED_MESSAGE.to_string()
        }
    );
}

#[tokio::test]
async fn dispatcher_folds_query_failures() {
    let pool = common::seeded_pool().await;
    pool.execute(Statement::from_string(
        DatabaseBackend::Sqlite,
        "DROP TABLE order_items".to_string(),
    ))
    .await
    .unwrap();

    let provider = Arc::new(LazyConnection::with_connection(
        DbConfig::from(&common::test_config()),
        pool,
    ));
    let dispatcher = ReportDispatcher::new(ReportService::new(provider));

    let outcome = dispatcher
        .dispatch(ReportKind::CategorySummary, &ReportFilters::default())
        .await
        .unwrap();
    assert!(matches!(outcome, ReportOutcome::Failed { .. }));
}

#[tokio::test]
async fn dispatcher_propagates_store_unavailable() {
    let dispatcher = ReportDispatcher::new(ReportService::new(common::unreachable_provider()));
    let err = dispatcher
        .dispatch(ReportKind::TopSkus, &ReportFilters::default())
        .await
        .unwrap_err();
    assert!(err.is_store_unavailable());
}
