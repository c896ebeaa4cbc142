//! Twirp client for the Actions results service.
//!
//! Cache and artifact calls are JSON `POST`s to
//! `{ACTIONS_RESULTS_URL}/twirp/github.actions.results.api.v1.<Service>/<Method>`
//! authenticated with `ACTIONS_RUNTIME_TOKEN`. Payloads use protobuf field
//! names; 64-bit integers travel as strings.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use qodana_ci_core::env::EnvSnapshot;
use qodana_ci_core::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

const PACKAGE: &str = "github.actions.results.api.v1";

/// Scope in the runtime token that names the run and job backends.
const RESULTS_SCOPE: &str = "Actions.Results";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TwirpError {
    code: String,
    msg: String,
}

/// Run and job identifiers the artifact service keys artifacts by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct BackendIds {
    pub workflow_run_backend_id: String,
    pub workflow_job_run_backend_id: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    scp: String,
}

/// Read the backend ids from the `Actions.Results:<run>:<job>` scope of a
/// runtime token (a JWT).
pub(crate) fn backend_ids(token: &str) -> Result<BackendIds> {
    let invalid = |reason: &str| Error::host("artifact", format!("Invalid ACTIONS_RUNTIME_TOKEN: {reason}"));

    let payload = token.split('.').nth(1).ok_or_else(|| invalid("not a JWT"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| invalid(&e.to_string()))?;
    let claims: Claims = serde_json::from_slice(&bytes)?;

    claims
        .scp
        .split_whitespace()
        .find_map(|scope| {
            let mut parts = scope.split(':');
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(RESULTS_SCOPE), Some(run), Some(job), None) => Some(BackendIds {
                    workflow_run_backend_id: run.to_string(),
                    workflow_job_run_backend_id: job.to_string(),
                }),
                _ => None,
            }
        })
        .ok_or_else(|| invalid("no Actions.Results scope"))
}

/// Whether `server_url` points at GitHub Enterprise Server, which has no
/// results service.
pub(crate) fn is_ghes(server_url: Option<&str>) -> bool {
    let Some(url) = server_url else {
        return false;
    };
    let host = url
        .split_once("://")
        .map_or(url, |(_, rest)| rest)
        .split(['/', ':'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    host != "github.com" && !host.ends_with(".ghe.com") && !host.ends_with(".localhost")
}

/// Results service client.
pub(crate) struct ResultsClient {
    client: Client,
    base_url: Option<String>,
    token: Option<String>,
}

impl ResultsClient {
    pub(crate) fn from_env(env: &EnvSnapshot) -> Self {
        Self {
            client: Client::new(),
            base_url: env.non_empty("ACTIONS_RESULTS_URL").map(|url| {
                if url.ends_with('/') {
                    url.to_string()
                } else {
                    format!("{url}/")
                }
            }),
            token: env.non_empty("ACTIONS_RUNTIME_TOKEN").map(String::from),
        }
    }

    pub(crate) fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Plain HTTP client for signed blob URLs.
    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Call `service/method`.
    ///
    /// `Ok(None)` when the service answers `not_found` or `already_exists`.
    pub(crate) async fn call<Req, Resp>(
        &self,
        label: &'static str,
        service: &str,
        method: &str,
        request: &Req,
    ) -> Result<Option<Resp>>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| Error::host(label, "ACTIONS_RESULTS_URL is not set"))?;
        let url = format!("{base}twirp/{PACKAGE}.{service}/{method}");
        debug!(%url, "Calling results service");

        let mut builder = self.client.post(&url).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| Error::host(label, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .json()
                .await
                .map_err(|e| Error::host(label, format!("Invalid {method} response: {e}")))?;
            return Ok(Some(body));
        }

        let error: TwirpError = response.json().await.unwrap_or_default();
        if matches!(status, StatusCode::NOT_FOUND | StatusCode::CONFLICT)
            || matches!(error.code.as_str(), "not_found" | "already_exists")
        {
            debug!(method, code = %error.code, msg = %error.msg, "Results service declined");
            return Ok(None);
        }
        Err(Error::host(
            label,
            format!("{method} failed: HTTP {status} {} {}", error.code, error.msg)
                .trim_end()
                .to_string(),
        ))
    }
}
