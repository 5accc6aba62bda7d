//! Appium / W3C WebDriver HTTP client
//!
//! Speaks the W3C WebDriver JSON protocol as served by an Appium 2 server
//! (default `http://127.0.0.1:4723`). Element lookups, element commands,
//! pointer actions, legacy touch actions and `mobile:` device commands all go
//! through [`AppiumClient::command`], which turns W3C error bodies into
//! [`DriverError`]s.

use super::actions::{
    By, DeviceCommand, ElementId, Rect, TouchChain, W3cActions, ELEMENT_KEY, LEGACY_ELEMENT_KEY,
};
use super::error::{DriverError, DriverResult};
use super::traits::RemoteSession;
use crate::utils::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Server status response
#[derive(Debug, Deserialize)]
pub struct ServerStatus {
    pub value: ServerStatusValue,
}

#[derive(Debug, Deserialize)]
pub struct ServerStatusValue {
    #[serde(default)]
    pub ready: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub build: Option<Value>,
}

/// New session response
#[derive(Debug, Deserialize)]
struct SessionResponse {
    value: SessionValue,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionValue {
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Window rect
#[derive(Debug, Deserialize)]
struct WindowRect {
    width: u32,
    height: u32,
}

/// HTTP client bound to one Appium session
pub struct AppiumClient {
    /// Base URL for the server (e.g., "http://127.0.0.1:4723")
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
    /// Server-assigned session id
    session_id: String,
}

impl AppiumClient {
    fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")
    }

    /// Create a new session with the configured capabilities
    ///
    /// If the session opens but its setup fails, it is deleted again before
    /// the error is returned.
    pub async fn connect(config: &Config) -> Result<Self> {
        let base_url = config.server.trim_end_matches('/').to_string();
        let client = Self::http_client(config.request_timeout_secs)?;

        let body = json!({
            "capabilities": {
                "alwaysMatch": Value::Object(config.capabilities.clone()),
                "firstMatch": [{}],
            }
        });

        log::debug!("Creating session at {} with {}", base_url, body);

        let resp = client
            .post(format!("{}/session", base_url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach automation server at {}", base_url))?;

        let status = resp.status();
        let payload: Value = resp
            .json()
            .await
            .context("Failed to parse session response")?;

        if !status.is_success() {
            let err = DriverError::from_response(status.as_u16(), &payload);
            anyhow::bail!("Session creation rejected: {}", err);
        }

        let session: SessionResponse =
            serde_json::from_value(payload).context("Failed to parse session response")?;
        let session_id = session
            .session_id
            .or(session.value.session_id)
            .ok_or_else(|| anyhow::anyhow!("No session ID in response"))?;

        let client = Self {
            base_url,
            client,
            session_id,
        };

        if config.implicit_wait_ms > 0 {
            if let Err(e) = client
                .command::<Value>(
                    Method::POST,
                    "/timeouts",
                    Some(json!({ "implicit": config.implicit_wait_ms })),
                )
                .await
            {
                if let Err(quit_err) = client.quit().await {
                    log::warn!(
                        "Could not delete session {} after failed setup: {}",
                        client.session_id,
                        quit_err
                    );
                }
                return Err(e).context("Failed to set implicit wait");
            }
        }

        log::info!("Session {} created", client.session_id);
        Ok(client)
    }

    /// Probe `GET /status` without creating a session
    pub async fn status(base_url: &str) -> Result<ServerStatus> {
        let client = Self::http_client(10)?;
        let url = format!("{}/status", base_url.trim_end_matches('/'));
        let resp = client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;
        resp.json::<ServerStatus>()
            .await
            .context("Failed to parse status response")
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn session_url(&self, path: &str) -> String {
        format!("{}/session/{}{}", self.base_url, self.session_id, path)
    }

    /// Issue a session command and decode the `value` field of the response
    async fn command<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> DriverResult<T> {
        let url = self.session_url(path);
        log::trace!("{} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request.send().await.map_err(DriverError::from_transport)?;
        let status = resp.status();
        let text = resp.text().await.map_err(DriverError::from_transport)?;
        let mut payload: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                if status.is_success() {
                    DriverError::Decode(e.to_string())
                } else {
                    DriverError::from_response(status.as_u16(), &Value::Null)
                }
            })?
        };

        if !status.is_success() || has_error(&payload) {
            return Err(DriverError::from_response(status.as_u16(), &payload));
        }

        let value = payload
            .get_mut("value")
            .map(Value::take)
            .unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| DriverError::Decode(e.to_string()))
    }

    fn element_path(element: &ElementId, suffix: &str) -> String {
        format!("/element/{}{}", element.as_str(), suffix)
    }
}

fn has_error(payload: &Value) -> bool {
    payload
        .get("value")
        .and_then(|v| v.get("error"))
        .map(|e| e.is_string())
        .unwrap_or(false)
}

/// Pull the element id out of a W3C or legacy element reference
pub(crate) fn parse_element_ref(value: &Value) -> DriverResult<ElementId> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get(LEGACY_ELEMENT_KEY))
        .and_then(Value::as_str)
        .map(|id| ElementId(id.to_string()))
        .ok_or_else(|| DriverError::Decode(format!("Not an element reference: {}", value)))
}

#[async_trait]
impl RemoteSession for AppiumClient {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn find_element(&self, by: &By) -> DriverResult<ElementId> {
        let value: Value = self
            .command(Method::POST, "/element", Some(by.to_body()))
            .await?;
        parse_element_ref(&value)
    }

    async fn find_elements(&self, by: &By) -> DriverResult<Vec<ElementId>> {
        let values: Vec<Value> = self
            .command(Method::POST, "/elements", Some(by.to_body()))
            .await?;
        values.iter().map(parse_element_ref).collect()
    }

    async fn element_rect(&self, element: &ElementId) -> DriverResult<Rect> {
        self.command(Method::GET, &Self::element_path(element, "/rect"), None)
            .await
    }

    async fn click_element(&self, element: &ElementId) -> DriverResult<()> {
        let _: Value = self
            .command(
                Method::POST,
                &Self::element_path(element, "/click"),
                Some(json!({})),
            )
            .await?;
        Ok(())
    }

    async fn clear_element(&self, element: &ElementId) -> DriverResult<()> {
        let _: Value = self
            .command(
                Method::POST,
                &Self::element_path(element, "/clear"),
                Some(json!({})),
            )
            .await?;
        Ok(())
    }

    async fn send_keys(&self, element: &ElementId, text: &str) -> DriverResult<()> {
        let chars: Vec<String> = text.chars().map(|c| c.to_string()).collect();
        let _: Value = self
            .command(
                Method::POST,
                &Self::element_path(element, "/value"),
                Some(json!({ "text": text, "value": chars })),
            )
            .await?;
        Ok(())
    }

    async fn element_attribute(
        &self,
        element: &ElementId,
        name: &str,
    ) -> DriverResult<Option<String>> {
        let value: Value = self
            .command(
                Method::GET,
                &Self::element_path(element, &format!("/attribute/{}", name)),
                None,
            )
            .await?;
        Ok(match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        })
    }

    async fn element_text(&self, element: &ElementId) -> DriverResult<String> {
        self.command(Method::GET, &Self::element_path(element, "/text"), None)
            .await
    }

    async fn is_displayed(&self, element: &ElementId) -> DriverResult<bool> {
        self.command(
            Method::GET,
            &Self::element_path(element, "/displayed"),
            None,
        )
        .await
    }

    async fn perform_actions(&self, actions: &W3cActions) -> DriverResult<()> {
        let body = serde_json::to_value(actions).map_err(|e| DriverError::Decode(e.to_string()))?;
        let _: Value = self.command(Method::POST, "/actions", Some(body)).await?;
        // Release any pointer state left behind; not every backend supports it.
        if let Err(e) = self.command::<Value>(Method::DELETE, "/actions", None).await {
            log::debug!("Releasing actions failed: {}", e);
        }
        Ok(())
    }

    async fn perform_touch(&self, chain: &TouchChain) -> DriverResult<()> {
        let body = serde_json::to_value(chain).map_err(|e| DriverError::Decode(e.to_string()))?;
        let _: Value = self
            .command(Method::POST, "/touch/perform", Some(body))
            .await?;
        Ok(())
    }

    async fn execute_device_command(&self, command: &DeviceCommand) -> DriverResult<()> {
        let (script, args) = command.to_script();
        let _: Value = self
            .command(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": script, "args": args })),
            )
            .await?;
        Ok(())
    }

    async fn page_source(&self) -> DriverResult<String> {
        self.command(Method::GET, "/source", None).await
    }

    async fn window_size(&self) -> DriverResult<(u32, u32)> {
        let rect: WindowRect = self.command(Method::GET, "/window/rect", None).await?;
        Ok((rect.width, rect.height))
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        let data: String = self.command(Method::GET, "/screenshot", None).await?;
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| DriverError::Decode(format!("screenshot: {}", e)))
    }

    async fn quit(&self) -> DriverResult<()> {
        let _: Value = self.command(Method::DELETE, "", None).await?;
        log::info!("Session {} closed", self.session_id);
        Ok(())
    }
}
