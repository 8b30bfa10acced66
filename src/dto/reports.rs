use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::{Validate, ValidationError};

use crate::errors::ServiceError;
use crate::services::classifier::Period;

fn validate_iso_date(value: &str) -> Result<(), ValidationError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|_| ())
        .map_err(|_| {
            let mut err = ValidationError::new("iso_date");
            err.message = Some("expected a calendar date formatted as YYYY-MM-DD".into());
            err
        })
}

fn validate_period(value: &str) -> Result<(), ValidationError> {
    Period::from_str(value).map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("period");
        err.message = Some("period must be daily, weekly or monthly".into());
        err
    })
}

fn parse_date(value: &Option<String>) -> Option<NaiveDate> {
    value
        .as_deref()
        .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
}

/// Inclusive order-date window shared by most report requests.
pub trait DateWindow {
    fn raw_start(&self) -> &Option<String>;
    fn raw_end(&self) -> &Option<String>;

    fn start_date(&self) -> Option<NaiveDate> {
        parse_date(self.raw_start())
    }

    fn end_date(&self) -> Option<NaiveDate> {
        parse_date(self.raw_end())
    }

    fn check_window(&self) -> Result<(), ServiceError> {
        match (self.start_date(), self.end_date()) {
            (Some(start), Some(end)) if start > end => Err(ServiceError::BadRequest(format!(
                "start_date {} is after end_date {}",
                start, end
            ))),
            _ => Ok(()),
        }
    }
}

macro_rules! date_window {
    ($ty:ty) => {
        impl DateWindow for $ty {
            fn raw_start(&self) -> &Option<String> {
                &self.start_date
            }

            fn raw_end(&self) -> &Option<String> {
                &self.end_date
            }
        }
    };
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct SalesBySkuRequest {
    #[serde(default)]
    pub sku_id: Option<i64>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct SalesByMerchantRequest {
    #[serde(default)]
    pub merchant_id: Option<i64>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct SalesByDistrictRequest {
    #[serde(default)]
    #[validate(length(max = 100))]
    pub district: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SalesByTimePeriodRequest {
    #[serde(default = "default_period")]
    #[validate(custom = "validate_period")]
    pub period: String,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
}

fn default_period() -> String {
    Period::default().to_string()
}

impl Default for SalesByTimePeriodRequest {
    fn default() -> Self {
        Self {
            period: default_period(),
            start_date: None,
            end_date: None,
        }
    }
}

impl SalesByTimePeriodRequest {
    pub fn period(&self) -> Result<Period, ServiceError> {
        Period::from_str(&self.period).map_err(|_| {
            ServiceError::BadRequest("period must be daily, weekly or monthly".to_string())
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct SalesRepPerformanceRequest {
    #[serde(default)]
    pub sales_rep_id: Option<i64>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
}

/// Query string of `GET /api/insights/top-skus`
#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct TopSkusQuery {
    #[serde(default)]
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u32>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct DateRangeQuery {
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub start_date: Option<String>,
    #[serde(default)]
    #[validate(custom = "validate_iso_date")]
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize, Validate)]
pub struct MerchantPatternsQuery {
    #[serde(default)]
    pub merchant_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct QuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub question: String,
}

date_window!(SalesBySkuRequest);
date_window!(SalesByMerchantRequest);
date_window!(SalesByDistrictRequest);
date_window!(SalesByTimePeriodRequest);
date_window!(SalesRepPerformanceRequest);
date_window!(TopSkusQuery);
date_window!(DateRangeQuery);
