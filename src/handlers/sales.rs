use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::post,
    Router,
};

use super::common::{json_body, success_response, validate_window, ReportResponse};
use crate::{
    dto::{
        DateWindow, SalesByDistrictRequest, SalesByMerchantRequest, SalesBySkuRequest,
        SalesByTimePeriodRequest, SalesRepPerformanceRequest,
    },
    errors::ServiceError,
    services::reports::{DistrictSales, MerchantSales, PeriodSales, SalesRepPerformance, SkuSales},
    AppState,
};

/// Build the sales Router scoped under `/api/sales`.
pub fn sales_routes() -> Router<AppState> {
    Router::new()
        .route("/sku", post(sales_by_sku))
        .route("/merchant", post(sales_by_merchant))
        .route("/district", post(sales_by_district))
        .route("/time-period", post(sales_by_time_period))
        .route("/sales-rep", post(sales_rep_performance))
}

type Payload<T> = Result<Json<T>, JsonRejection>;

pub async fn sales_by_sku(
    State(state): State<AppState>,
    payload: Payload<SalesBySkuRequest>,
) -> Result<Json<ReportResponse<Vec<SkuSales>>>, ServiceError> {
    let request = json_body(payload)?;
    validate_window(&request)?;

    let rows = state
        .reports
        .sales_by_sku(request.sku_id, request.start_date(), request.end_date())
        .await?;
    Ok(success_response(rows))
}

pub async fn sales_by_merchant(
    State(state): State<AppState>,
    payload: Payload<SalesByMerchantRequest>,
) -> Result<Json<ReportResponse<Vec<MerchantSales>>>, ServiceError> {
    let request = json_body(payload)?;
    validate_window(&request)?;

    let rows = state
        .reports
        .sales_by_merchant(request.merchant_id, request.start_date(), request.end_date())
        .await?;
    Ok(success_response(rows))
}

pub async fn sales_by_district(
    State(state): State<AppState>,
    payload: Payload<SalesByDistrictRequest>,
) -> Result<Json<ReportResponse<Vec<DistrictSales>>>, ServiceError> {
    let request = json_body(payload)?;
    validate_window(&request)?;

    let rows = state
        .reports
        .sales_by_district(
            request.district.as_deref(),
            request.start_date(),
            request.end_date(),
        )
        .await?;
    Ok(success_response(rows))
}

pub async fn sales_by_time_period(
    State(state): State<AppState>,
    payload: Payload<SalesByTimePeriodRequest>,
) -> Result<Json<ReportResponse<Vec<PeriodSales>>>, ServiceError> {
    let request = json_body(payload)?;
    let period = request.period()?;
    validate_window(&request)?;

    let rows = state
        .reports
        .sales_by_time_period(period, request.start_date(), request.end_date())
        .await?;
    Ok(success_response(rows))
}

pub async fn sales_rep_performance(
    State(state): State<AppState>,
    payload: Payload<SalesRepPerformanceRequest>,
) -> Result<Json<ReportResponse<Vec<SalesRepPerformance>>>, ServiceError> {
    let request = json_body(payload)?;
    validate_window(&request)?;

    let rows = state
        .reports
        .sales_rep_performance(request.sales_rep_id, request.start_date(), request.end_date())
        .await?;
    Ok(success_response(rows))
}
