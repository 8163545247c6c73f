//! HTTP client for the spreadsheet-backed web service.

use std::time::Duration;

use serde::Serialize;

use crate::config::RemoteConfig;
use crate::core::record::{StudentStatus, StudentSummary};
use crate::error::{Result, TrajectoryError};
use crate::remote::envelope::{
    actions, CloseData, CloseRequest, CycleQuery, DivisionRisk, Envelope, Request, RiskData,
    RiskQuery, RolloverReport, RolloverRequest, SaveRequest, StudentQuery, SyncRequest, SyncResult,
    BODY_SNIPPET_CHARS,
};
use crate::remote::traits::TrajectoryService;
use crate::util::{truncate_chars, WireText};

/// Blocking client posting `{apiKey, action, payload}` to a single endpoint.
///
/// The body is sent as plain text with no custom headers, which is what the
/// deployed web app accepts without a preflight.
pub struct HttpService {
    url: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl std::fmt::Debug for HttpService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpService")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl HttpService {
    /// Create a client for `url` authenticated with `api_key`.
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let url = url.into();
        let api_key = api_key.into();

        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(TrajectoryError::config(format!(
                "remote url must be an http(s) URL, got '{url}'"
            )));
        }
        if api_key.trim().is_empty() {
            return Err(TrajectoryError::config(
                "no API key; set TRAJECTORY_API_KEY",
            ));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrajectoryError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url,
            api_key,
            client,
        })
    }

    /// Create a client from the `[remote]` config section.
    pub fn from_config(config: &RemoteConfig, api_key: impl Into<String>) -> Result<Self> {
        Self::new(
            config.url.clone(),
            api_key,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    /// The endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn call<P: Serialize>(&self, action: &str, payload: &P) -> Result<Envelope> {
        let body = serde_json::to_string(&Request {
            api_key: &self.api_key,
            action,
            payload,
        })?;

        tracing::debug!(action, "remote call");

        let response = self.client.post(&self.url).body(body).send()?;
        let status = response.status();
        let text = response.text()?;

        if !status.is_success() {
            tracing::warn!(action, %status, "remote call returned HTTP error");
            return Err(TrajectoryError::transport(format!(
                "HTTP {status}: {}",
                truncate_chars(&text, BODY_SNIPPET_CHARS)
            )));
        }

        Envelope::decode(action, &text).inspect_err(|e| {
            tracing::warn!(action, error = %e, "remote call failed");
        })
    }
}

#[derive(Serialize)]
struct Empty {}

impl TrajectoryService for HttpService {
    fn name(&self) -> &'static str {
        "http"
    }

    fn ping(&self) -> Result<()> {
        self.call(actions::PING, &Empty {})?;
        Ok(())
    }

    fn cycles(&self) -> Result<Vec<String>> {
        let cycles: Vec<WireText> =
            self.call(actions::GET_CYCLES, &Empty {})?.field("cycles")?;
        Ok(cycles.into_iter().map(|c| c.0.trim().to_string()).collect())
    }

    fn students(&self, cycle: &str) -> Result<Vec<StudentSummary>> {
        self.call(actions::GET_STUDENT_LIST, &CycleQuery { cycle })?
            .field("students")
    }

    fn fetch_status(&self, cycle: &str, student_id: &str) -> Result<StudentStatus> {
        self.call(
            actions::GET_STUDENT_STATUS,
            &StudentQuery { cycle, student_id },
        )?
        .data()
    }

    fn save_status(&self, request: &SaveRequest) -> Result<StudentStatus> {
        self.call(actions::SAVE_STUDENT_STATUS, request)?.data()
    }

    fn close_cycle(&self, request: &CloseRequest) -> Result<StudentStatus> {
        let data: CloseData = self.call(actions::CLOSE_CYCLE, request)?.data()?;
        match data.status {
            Some(status) => Ok(status),
            None => self.fetch_status(&request.cycle, &request.student_id),
        }
    }

    fn sync_catalog(&self, request: &SyncRequest) -> Result<SyncResult> {
        self.call(actions::SYNC_CATALOG_ROWS, request)?.data()
    }

    fn division_risk_summary(&self, cycle: &str, threshold: u32) -> Result<Vec<DivisionRisk>> {
        let data: RiskData = self
            .call(
                actions::GET_DIVISION_RISK_SUMMARY,
                &RiskQuery { cycle, threshold },
            )?
            .data()?;
        Ok(data.divisions)
    }

    fn rollover(&self, request: &RolloverRequest) -> Result<RolloverReport> {
        request.validate()?;
        self.call(actions::ROLLOVER_CYCLE, request)?.data()
    }
}
