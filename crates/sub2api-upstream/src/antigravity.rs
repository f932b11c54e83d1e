//! Antigravity (Cloud Code internal API) client

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use sub2api_core::ports::AntigravityApi;
use sub2api_core::upstream::{FetchAvailableModelsResponse, LoadCodeAssistResponse};

use crate::config::UpstreamConfig;
use crate::error::Result;
use crate::http::{send_json, HttpClients};

/// `v1internal` client for tier and quota lookups
pub struct AntigravityClient {
    clients: HttpClients,
    base_url: String,
    user_agent: String,
}

impl AntigravityClient {
    /// Create a client from upstream settings
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        Ok(Self {
            clients: HttpClients::new(config.timeout())?,
            base_url: config.antigravity_base_url.trim_end_matches('/').to_string(),
            user_agent: config.antigravity_user_agent.clone(),
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1internal:{}", self.base_url, method)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        access_token: &str,
        body: serde_json::Value,
        proxy_url: Option<&str>,
    ) -> Result<T> {
        let client = self.clients.get(proxy_url)?;
        debug!(method, proxied = proxy_url.is_some(), "Calling Cloud Code");
        let request = client
            .post(self.endpoint(method))
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .json(&body);
        send_json(request).await
    }
}

#[async_trait]
impl AntigravityApi for AntigravityClient {
    async fn load_code_assist(
        &self,
        access_token: &str,
        proxy_url: Option<&str>,
    ) -> sub2api_core::Result<LoadCodeAssistResponse> {
        let body = json!({"metadata": {"ideType": "ANTIGRAVITY"}});
        Ok(self
            .call("loadCodeAssist", access_token, body, proxy_url)
            .await?)
    }

    async fn fetch_available_models(
        &self,
        access_token: &str,
        project_id: &str,
        proxy_url: Option<&str>,
    ) -> sub2api_core::Result<FetchAvailableModelsResponse> {
        let body = json!({"project": project_id});
        Ok(self
            .call("fetchAvailableModels", access_token, body, proxy_url)
            .await?)
    }
}
