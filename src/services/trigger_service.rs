//! Outbound side of the relay: asking the Job Runner to start a compression run.

use crate::{config::RelayConfig, errors::TriggerDispatchError, models::job::TriggerRequest};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::{
    Client, StatusCode,
    header::{ACCEPT, AUTHORIZATION, HeaderValue, InvalidHeaderValue},
};
use serde::Serialize;
use tracing::debug;

/// The Job Runner accepted the trigger.
#[derive(Debug, Clone)]
pub struct TriggerAck {
    pub status: StatusCode,
    pub body: String,
}

/// Anything that can start a compression job for a [`TriggerRequest`].
#[async_trait]
pub trait JobTrigger: Send + Sync {
    /// Issue exactly one trigger attempt.
    async fn trigger(&self, request: &TriggerRequest) -> Result<TriggerAck, TriggerDispatchError>;
}

#[derive(Serialize)]
struct DagRunBody<'a> {
    conf: &'a TriggerRequest,
}

/// Triggers DAG runs over the Job Runner's REST API.
///
/// Single attempt, bounded by the client timeout; retrying is left to
/// the storage service's own redelivery.
#[derive(Clone, Debug)]
pub struct HttpJobTrigger {
    client: Client,
    url: String,
    authorization: HeaderValue,
}

impl HttpJobTrigger {
    pub fn new(config: &RelayConfig) -> Result<Self, TriggerDispatchError> {
        let client = Client::builder().timeout(config.trigger_timeout).build()?;
        Ok(Self {
            client,
            url: dag_runs_url(&config.job_runner_url, &config.dag_id),
            authorization: basic_auth(&config.job_runner_username, &config.job_runner_password)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl JobTrigger for HttpJobTrigger {
    async fn trigger(&self, request: &TriggerRequest) -> Result<TriggerAck, TriggerDispatchError> {
        debug!(url = %self.url, object_name = %request.object_key, "posting dag run");

        let response = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.authorization.clone())
            .json(&DagRunBody { conf: request })
            .send()
            .await?;

        let status = response.status();
        // A body that cannot be read is still a response; keep the status.
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(TriggerAck { status, body })
        } else {
            Err(TriggerDispatchError::Rejected { status, body })
        }
    }
}

/// `<base>/dags/<dag_id>/dagRuns`
pub fn dag_runs_url(base: &str, dag_id: &str) -> String {
    format!("{}/dags/{}/dagRuns", base.trim_end_matches('/'), dag_id)
}

/// Preemptive `Basic` credentials, sent on the first request.
pub fn basic_auth(username: &str, password: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    let encoded = general_purpose::STANDARD.encode(format!("{}:{}", username, password));
    let mut value = HeaderValue::from_str(&format!("Basic {}", encoded))?;
    value.set_sensitive(true);
    Ok(value)
}
