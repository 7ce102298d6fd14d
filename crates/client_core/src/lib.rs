use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    domain::{Company, CompanyId, ShipmentRecord, StatsFilter, StatsReport},
    error::{ApiError, ApiStatus, ErrorCode},
    protocol::{
        CompaniesBody, CompanyBody, CreateCompanyRequest, CreateShipmentRequest, ShipmentBody,
        StatsBody, StatsQueryParams, ToggleCompanyBody, ToggleCompanyRequest,
        ADD_COMPANY_ENDPOINT, ADD_SHIPMENT_ENDPOINT, COMPANIES_ENDPOINT, STATS_ENDPOINT,
        TOGGLE_COMPANY_ENDPOINT,
    },
};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub mod auth;
pub mod directory;
pub mod report;
pub mod user_store;

pub use directory::CompanyDirectory;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const BODY_PREVIEW_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("server error: {0}")]
    Server(#[from] ApiError),
    #[error("invalid response: {0}")]
    Decode(String),
    #[error("invalid service url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid input: {0}")]
    Validation(&'static str),
}

impl ClientError {
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Operations the application consumes from the remote shipment service.
#[async_trait]
pub trait ShipmentApi: Send + Sync {
    async fn list_companies(&self, active_only: bool) -> Result<Vec<Company>, ClientError>;
    async fn create_shipment(
        &self,
        barcode: &str,
        company_id: CompanyId,
    ) -> Result<ShipmentRecord, ClientError>;
    async fn create_company(&self, name: &str) -> Result<Company, ClientError>;
    async fn set_company_active(
        &self,
        company_id: CompanyId,
        active: bool,
    ) -> Result<Company, ClientError>;
    async fn query_stats(&self, filter: &StatsFilter) -> Result<StatsReport, ClientError>;
}

pub struct ShipmentServiceClient {
    http: Client,
    base_url: Url,
}

impl ShipmentServiceClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, name: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(name)?)
    }

    async fn get<Q, T>(&self, endpoint: &str, query: &Q) -> Result<T, ClientError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(endpoint)?;
        debug!(%url, "GET");
        let response = self.http.get(url).query(query).send().await?;
        read_envelope(response).await
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(endpoint)?;
        debug!(%url, "POST");
        let response = self.http.post(url).json(body).send().await?;
        read_envelope(response).await
    }
}

/// `Url::join` drops the last path segment unless the base ends with a slash.
fn normalize_base_url(raw: &str) -> Result<Url, ClientError> {
    let trimmed = raw.trim();
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{trimmed}/"))?)
    }
}

fn body_preview(text: &str) -> String {
    text.chars().take(BODY_PREVIEW_CHARS).collect()
}

async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let http_status = response.status();
    let text = response.text().await?;

    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(_) if !http_status.is_success() => {
            return Err(ApiError::new(
                ErrorCode::from_status(http_status.as_u16()),
                format!("HTTP {http_status}"),
            )
            .into());
        }
        Err(_) => {
            return Err(ClientError::Decode(format!(
                "Invalid JSON response: {}",
                body_preview(&text)
            )));
        }
    };

    let status: ApiStatus = serde_json::from_value(value.clone()).unwrap_or_default();
    status.into_result()?;

    if !http_status.is_success() {
        return Err(ApiError::new(
            ErrorCode::from_status(http_status.as_u16()),
            format!("HTTP {http_status}"),
        )
        .into());
    }

    serde_json::from_value(value).map_err(|err| ClientError::Decode(err.to_string()))
}

#[async_trait]
impl ShipmentApi for ShipmentServiceClient {
    async fn list_companies(&self, active_only: bool) -> Result<Vec<Company>, ClientError> {
        let no_query: [(&str, &str); 0] = [];
        let body: CompaniesBody = self.get(COMPANIES_ENDPOINT, &no_query).await?;
        let companies = body
            .companies
            .into_iter()
            .map(Company::from)
            .filter(|company| !active_only || company.active)
            .collect();
        Ok(companies)
    }

    async fn create_shipment(
        &self,
        barcode: &str,
        company_id: CompanyId,
    ) -> Result<ShipmentRecord, ClientError> {
        let request = CreateShipmentRequest {
            barcode: barcode.to_string(),
            company_id,
            scan_date: Utc::now().date_naive(),
        };
        let body: ShipmentBody = self.post(ADD_SHIPMENT_ENDPOINT, &request).await?;
        Ok(body.shipment.into_record(&request))
    }

    async fn create_company(&self, name: &str) -> Result<Company, ClientError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::Validation("company name must not be empty"));
        }
        let body: CompanyBody = self
            .post(
                ADD_COMPANY_ENDPOINT,
                &CreateCompanyRequest {
                    name: name.to_string(),
                },
            )
            .await?;
        Ok(body.company.into())
    }

    async fn set_company_active(
        &self,
        company_id: CompanyId,
        active: bool,
    ) -> Result<Company, ClientError> {
        let body: ToggleCompanyBody = self
            .post(
                TOGGLE_COMPANY_ENDPOINT,
                &ToggleCompanyRequest {
                    company_id,
                    is_active: active,
                },
            )
            .await?;

        if let Some(company) = body.company {
            return Ok(company.into());
        }

        warn!(%company_id, "toggle response carried no company; re-reading company list");
        self.list_companies(false)
            .await?
            .into_iter()
            .find(|company| company.id == company_id)
            .ok_or_else(|| {
                ApiError::new(
                    ErrorCode::NotFound,
                    format!("company {company_id} not found after toggle"),
                )
                .into()
            })
    }

    async fn query_stats(&self, filter: &StatsFilter) -> Result<StatsReport, ClientError> {
        let params = StatsQueryParams::from(filter);
        let body: StatsBody = self.get(STATS_ENDPOINT, &params).await?;
        Ok(body.into())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
