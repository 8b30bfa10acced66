use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Json,
    routing::get,
    Router,
};

use super::common::{query_params, success_response, validate_input, validate_window, ReportResponse};
use crate::{
    dto::{DateRangeQuery, DateWindow, MerchantPatternsQuery, TopSkusQuery},
    errors::ServiceError,
    services::reports::{CategorySales, DistrictSales, MerchantMonth, SkuSales},
    AppState,
};

/// Build the insights Router scoped under `/api/insights`.
pub fn insights_routes() -> Router<AppState> {
    Router::new()
        .route("/top-skus", get(top_skus))
        .route("/district-trends", get(district_trends))
        .route("/category-summary", get(category_summary))
        .route("/merchant-patterns", get(merchant_patterns))
}

type Params<T> = Result<Query<T>, QueryRejection>;

/// Best selling SKUs, 10 by default
pub async fn top_skus(
    State(state): State<AppState>,
    params: Params<TopSkusQuery>,
) -> Result<Json<ReportResponse<Vec<SkuSales>>>, ServiceError> {
    let params = query_params(params)?;
    validate_window(&params)?;

    let rows = state
        .reports
        .top_skus(
            params.limit.map(u64::from),
            params.start_date(),
            params.end_date(),
        )
        .await?;
    Ok(success_response(rows))
}

pub async fn district_trends(
    State(state): State<AppState>,
    params: Params<DateRangeQuery>,
) -> Result<Json<ReportResponse<Vec<DistrictSales>>>, ServiceError> {
    let params = query_params(params)?;
    validate_window(&params)?;

    let rows = state
        .reports
        .district_trends(params.start_date(), params.end_date())
        .await?;
    Ok(success_response(rows))
}

pub async fn category_summary(
    State(state): State<AppState>,
    params: Params<DateRangeQuery>,
) -> Result<Json<ReportResponse<Vec<CategorySales>>>, ServiceError> {
    let params = query_params(params)?;
    validate_window(&params)?;

    let rows = state
        .reports
        .category_summary(params.start_date(), params.end_date())
        .await?;
    Ok(success_response(rows))
}

pub async fn merchant_patterns(
    State(state): State<AppState>,
    params: Params<MerchantPatternsQuery>,
) -> Result<Json<ReportResponse<Vec<MerchantMonth>>>, ServiceError> {
    let params = query_params(params)?;
    validate_input(&params)?;

    let rows = state
        .reports
        .merchant_ordering_patterns(params.merchant_id)
        .await?;
    Ok(success_response(rows))
}
