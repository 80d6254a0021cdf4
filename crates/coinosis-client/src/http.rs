//! HTTP transport of the coinosis backend
//!
//! [`HttpBackend`] implements the request/response API used by the assessment
//! flows. [`HttpBeacon`] posts clap deltas without waiting for the answer, so a
//! mirror never holds up the control that produced it.

use crate::config::BackendConfig;
use async_trait::async_trait;
use coinosis_assessment::{
    AssessmentBackend, AssessmentError, ClapBeacon, ClapMessage, DistributionInfo, GasQuote,
    RelayRequest, Result,
};
use coinosis_types::{Address, TxHash};
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

#[derive(Deserialize)]
struct AssessmentResponse {
    assessment: BTreeMap<Address, i64>,
}

#[derive(Deserialize)]
struct RelayResponse {
    result: TxHash,
}

fn build_client(config: &BackendConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(AssessmentError::transport)
}

#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config)?,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_distribution(&self, event: &str) -> Result<Option<DistributionInfo>> {
        let response = self
            .client
            .get(self.url(&format!("/distribution/{}", event)))
            .send()
            .await
            .map_err(AssessmentError::transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let info = response
            .error_for_status()
            .map_err(AssessmentError::transport)?
            .json()
            .await
            .map_err(AssessmentError::transport)?;
        Ok(Some(info))
    }
}

#[async_trait]
impl AssessmentBackend for HttpBackend {
    async fn fetch_assessment(
        &self,
        event: &str,
        account: &Address,
    ) -> Result<Option<BTreeMap<Address, i64>>> {
        let url = self.url(&format!("/assessment/{}/{}", event, account));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(AssessmentError::transport)?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(event, account = %account.short(), "No assessment on backend");
            return Ok(None);
        }
        let body: AssessmentResponse = response
            .error_for_status()
            .map_err(AssessmentError::transport)?
            .json()
            .await
            .map_err(AssessmentError::transport)?;
        Ok(Some(body.assessment))
    }

    async fn relay_assessment(&self, request: &RelayRequest) -> Result<TxHash> {
        let response = self
            .client
            .post(self.url("/assessments"))
            .json(request)
            .send()
            .await
            .map_err(AssessmentError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, "Backend refused to relay assessment");
            return Err(AssessmentError::Transport(format!("{}: {}", status, text)));
        }
        let body: RelayResponse = response.json().await.map_err(AssessmentError::transport)?;
        info!(tx = %body.result, event = %request.event, "📡 Assessment relayed");
        Ok(body.result)
    }

    async fn gas_quote(&self) -> Result<GasQuote> {
        self.client
            .get(self.url("/eth/gas"))
            .send()
            .await
            .map_err(AssessmentError::transport)?
            .error_for_status()
            .map_err(AssessmentError::transport)?
            .json()
            .await
            .map_err(AssessmentError::transport)
    }

    async fn distribution(&self, event: &str) -> Result<DistributionInfo> {
        if let Some(info) = self.get_distribution(event).await? {
            return Ok(info);
        }

        debug!(event, "Initialising distribution record");
        self.client
            .put(self.url(&format!("/distribution/{}", event)))
            .send()
            .await
            .map_err(AssessmentError::transport)?
            .error_for_status()
            .map_err(AssessmentError::transport)?;

        self.get_distribution(event).await?.ok_or_else(|| {
            AssessmentError::Transport(format!("distribution of {} still missing", event))
        })
    }
}

/// Fire-and-forget `POST /clap`.
#[derive(Clone)]
pub struct HttpBeacon {
    client: reqwest::Client,
    url: String,
    runtime: Handle,
}

impl HttpBeacon {
    /// Must be created inside a tokio runtime; posts are spawned onto it.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(AssessmentError::transport)?;
        Ok(Self {
            client: build_client(config)?,
            url: format!("{}/clap", config.url.trim_end_matches('/')),
            runtime,
        })
    }
}

impl ClapBeacon for HttpBeacon {
    fn dispatch(&self, message: ClapMessage) -> bool {
        let request = self.client.post(&self.url).json(&message);
        self.runtime.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => debug!(status = %response.status(), "Clap beacon rejected"),
                Err(e) => debug!(error = %e, "Clap beacon lost"),
            }
        });
        true
    }
}
