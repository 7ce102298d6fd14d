//! Wire payloads exchanged with the shipment service.
//!
//! Every endpoint answers with a JSON object carrying the [`ApiStatus`] fields next to the
//! endpoint-specific body. The service is loose about scalar types (`is_active` arrives as
//! `1`, `"1"` or `true`; counts sometimes arrive as strings), so the payload types here
//! normalise those before they are turned into domain values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    domain::{
        Company, CompanyId, ShipmentId, ShipmentRecord, StatsFilter, StatsReport, StatsRow,
        StatsSummary,
    },
    error::ApiStatus,
};

pub const COMPANIES_ENDPOINT: &str = "getCompanies.php";
pub const ADD_SHIPMENT_ENDPOINT: &str = "addShipment.php";
pub const STATS_ENDPOINT: &str = "getStats.php";
pub const ADD_COMPANY_ENDPOINT: &str = "addCompany.php";
pub const TOGGLE_COMPANY_ENDPOINT: &str = "toggleCompany.php";

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Status fields plus an endpoint body, flattened into one JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(flatten)]
    pub status: ApiStatus,
    #[serde(flatten)]
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn ok(body: T) -> Self {
        Self {
            status: ApiStatus::default(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPayload {
    #[serde(deserialize_with = "de_i64")]
    pub id: i64,
    pub name: String,
    #[serde(deserialize_with = "de_flag")]
    pub is_active: bool,
}

impl From<CompanyPayload> for Company {
    fn from(value: CompanyPayload) -> Self {
        Self {
            id: CompanyId(value.id),
            name: value.name,
            active: value.is_active,
        }
    }
}

impl From<&Company> for CompanyPayload {
    fn from(value: &Company) -> Self {
        Self {
            id: value.id.0,
            name: value.name.clone(),
            is_active: value.active,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompaniesBody {
    #[serde(default)]
    pub companies: Vec<CompanyPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateShipmentRequest {
    pub barcode: String,
    pub company_id: CompanyId,
    pub scan_date: NaiveDate,
}

/// Echo of an inserted shipment. The row is already stored once the envelope reports
/// success, so every field is optional and malformed values decode as absent rather
/// than failing the call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentPayload {
    #[serde(
        default,
        deserialize_with = "de_lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de_lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub barcode: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub company_id: Option<i64>,
    #[serde(
        default,
        deserialize_with = "de_lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub company_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "de_lenient_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub scan_date: Option<NaiveDate>,
    #[serde(
        default,
        deserialize_with = "de_optional_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub is_duplicate: Option<bool>,
}

impl ShipmentPayload {
    /// Fields the service left out are taken from the request that created the row.
    pub fn into_record(self, request: &CreateShipmentRequest) -> ShipmentRecord {
        ShipmentRecord {
            id: self.id.map(ShipmentId),
            barcode: self.barcode.unwrap_or_else(|| request.barcode.clone()),
            company_id: self.company_id.map(CompanyId).unwrap_or(request.company_id),
            company_name: self.company_name,
            scan_date: self.scan_date.unwrap_or(request.scan_date),
            is_duplicate: self.is_duplicate,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShipmentBody {
    #[serde(default)]
    pub shipment: ShipmentPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCompanyRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyBody {
    pub company: CompanyPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleCompanyRequest {
    pub company_id: CompanyId,
    pub is_active: bool,
}

/// Older deployments answer a toggle with the bare status and no company.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToggleCompanyBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsQueryParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i64>,
}

impl From<&StatsFilter> for StatsQueryParams {
    fn from(filter: &StatsFilter) -> Self {
        Self {
            start_date: filter.start_date,
            end_date: filter.end_date,
            // 0 is the "all companies" sentinel in selection controls.
            company_id: filter.company_id.map(|id| id.0).filter(|id| *id > 0),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsPayload {
    #[serde(default, deserialize_with = "de_u64")]
    pub total_unique_shipments: u64,
    #[serde(default, deserialize_with = "de_u64")]
    pub total_scans: u64,
    #[serde(default, deserialize_with = "de_u64")]
    pub duplicate_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRowPayload {
    pub barcode: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(deserialize_with = "de_u64")]
    pub scan_count: u64,
    #[serde(deserialize_with = "de_timestamp")]
    pub first_scan: DateTime<Utc>,
    #[serde(deserialize_with = "de_timestamp")]
    pub last_scan: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsBody {
    #[serde(default)]
    pub statistics: StatisticsPayload,
    #[serde(default)]
    pub shipments: Vec<StatsRowPayload>,
}

impl From<StatsBody> for StatsReport {
    fn from(value: StatsBody) -> Self {
        Self {
            summary: StatsSummary {
                total_scans: value.statistics.total_scans,
                unique_shipments: value.statistics.total_unique_shipments,
                duplicate_count: value.statistics.duplicate_count,
            },
            rows: value
                .shipments
                .into_iter()
                .map(|row| StatsRow {
                    barcode: row.barcode,
                    company_name: row.company_name,
                    count: u32::try_from(row.scan_count).unwrap_or(u32::MAX),
                    first_scan_time: row.first_scan,
                    last_scan_time: row.last_scan,
                })
                .collect(),
        }
    }
}

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_i64().map(|n| n != 0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "1" | "true" => Some(true),
            "0" | "false" | "" => Some(false),
            _ => None,
        },
        Value::Null => Some(false),
        _ => None,
    }
}

fn de_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_as_i64(&value).ok_or_else(|| D::Error::custom(format!("expected integer, got {value}")))
}

fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0);
    }
    value_as_i64(&value)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| D::Error::custom(format!("expected non-negative integer, got {value}")))
}

fn de_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(deserializer)?;
    value_as_flag(&value).ok_or_else(|| D::Error::custom(format!("expected flag, got {value}")))
}

fn de_optional_flag<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<bool>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(value_as_flag(&value))
}

fn de_lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value_as_i64(&value))
}

fn de_lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

/// Accepts `YYYY-MM-DD` as well as full timestamps, keeping the date part.
fn de_lenient_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let Value::String(raw) = value else {
        return Ok(None);
    };
    Ok(parse_date(&raw))
}

fn de_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp '{raw}'")))
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
