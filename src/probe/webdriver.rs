//! Minimal W3C WebDriver client, speaking JSON over HTTP to a chromedriver.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use reqwest::Client;
use serde_json::Value;
use serde_json::json;

use crate::probe::error::WebDriverError;

/// Key under which the W3C protocol nests element ids.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Must outlive both the page-load timeout and any delayed driver response.
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

/// A live browser session. Discarded with [`WebDriverClient::delete_session`].
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct ElementHandle {
    id: String,
}

pub struct WebDriverClient {
    client: Client,
    base_url: String,
}

impl WebDriverClient {
    pub fn new(base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Opens a fresh headless Chrome session with no shared cookies or cache.
    ///
    /// Prompts are left open (`unhandledPromptBehavior: ignore`) so the caller
    /// decides when to accept the booking widget's entry alert.
    pub async fn new_session(&self) -> Result<Session, WebDriverError> {
        let payload = json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "unhandledPromptBehavior": "ignore",
                    "goog:chromeOptions": {
                        "args": [
                            "--headless=new",
                            "--no-sandbox",
                            "--disable-gpu",
                            "--window-size=1280,960"
                        ]
                    }
                }
            }
        });

        let value = self.post("/session", &payload).await?;
        let id = value["sessionId"]
            .as_str()
            .ok_or_else(|| WebDriverError::MissingField {
                field: "sessionId".to_string(),
            })?
            .to_string();

        debug!("Opened WebDriver session {id}");
        Ok(Session { id })
    }

    pub async fn delete_session(&self, session: &Session) -> Result<(), WebDriverError> {
        self.delete(&format!("/session/{}", session.id)).await?;
        debug!("Closed WebDriver session {}", session.id);
        Ok(())
    }

    pub async fn set_timeouts(
        &self,
        session: &Session,
        page_load: Duration,
    ) -> Result<(), WebDriverError> {
        let payload = json!({
            "pageLoad": page_load.as_millis() as u64,
            "implicit": 0,
        });
        self.post(&format!("/session/{}/timeouts", session.id), &payload)
            .await?;
        Ok(())
    }

    pub async fn navigate(&self, session: &Session, url: &str) -> Result<(), WebDriverError> {
        self.post(&format!("/session/{}/url", session.id), &json!({ "url": url }))
            .await?;
        Ok(())
    }

    pub async fn current_url(&self, session: &Session) -> Result<String, WebDriverError> {
        let value = self.get(&format!("/session/{}/url", session.id)).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WebDriverError::MissingField {
                field: "url".to_string(),
            })
    }

    /// Accepts the open modal alert. Returns `false` when no alert is present.
    pub async fn accept_alert(&self, session: &Session) -> Result<bool, WebDriverError> {
        let path = format!("/session/{}/alert/accept", session.id);
        match self.post(&path, &json!({})).await {
            Ok(_) => Ok(true),
            Err(WebDriverError::Api { error, .. }) if error == "no such alert" => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Finds the first element matching `selector`. Returns `None` when absent.
    ///
    /// `using` is a W3C location strategy, e.g. `css selector` or `xpath`.
    pub async fn find(
        &self,
        session: &Session,
        using: &str,
        selector: &str,
    ) -> Result<Option<ElementHandle>, WebDriverError> {
        let path = format!("/session/{}/element", session.id);
        let payload = json!({ "using": using, "value": selector });

        match self.post(&path, &payload).await {
            Ok(value) => {
                let id = value[ELEMENT_KEY]
                    .as_str()
                    .ok_or_else(|| WebDriverError::MissingField {
                        field: ELEMENT_KEY.to_string(),
                    })?
                    .to_string();
                Ok(Some(ElementHandle { id }))
            }
            Err(WebDriverError::Api { error, .. }) if error == "no such element" => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn click(
        &self,
        session: &Session,
        element: &ElementHandle,
    ) -> Result<(), WebDriverError> {
        let path = format!("/session/{}/element/{}/click", session.id, element.id);
        self.post(&path, &json!({})).await?;
        Ok(())
    }

    pub async fn text(
        &self,
        session: &Session,
        element: &ElementHandle,
    ) -> Result<String, WebDriverError> {
        let path = format!("/session/{}/element/{}/text", session.id, element.id);
        let value = self.get(&path).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| WebDriverError::MissingField {
                field: "text".to_string(),
            })
    }

    /// Captures the viewport as PNG bytes.
    pub async fn screenshot(&self, session: &Session) -> Result<Vec<u8>, WebDriverError> {
        let value = self
            .get(&format!("/session/{}/screenshot", session.id))
            .await?;
        let encoded = value.as_str().ok_or_else(|| WebDriverError::MissingField {
            field: "screenshot".to_string(),
        })?;
        Ok(STANDARD.decode(encoded)?)
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<Value, WebDriverError> {
        debug!("WebDriver POST {path}");
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(payload)
            .send()
            .await?;
        Self::into_value(response).await
    }

    async fn get(&self, path: &str) -> Result<Value, WebDriverError> {
        debug!("WebDriver GET {path}");
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await?;
        Self::into_value(response).await
    }

    async fn delete(&self, path: &str) -> Result<Value, WebDriverError> {
        debug!("WebDriver DELETE {path}");
        let response = self
            .client
            .delete(format!("{}{path}", self.base_url))
            .send()
            .await?;
        Self::into_value(response).await
    }

    /// Unwraps the protocol envelope, turning error bodies into [`WebDriverError::Api`].
    async fn into_value(response: reqwest::Response) -> Result<Value, WebDriverError> {
        let status = response.status();
        let body = response.text().await?;
        let mut parsed: Value = serde_json::from_str(&body)?;
        let value = parsed["value"].take();

        if !status.is_success() {
            let error = value["error"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            let message = value["message"].as_str().unwrap_or_default().to_string();
            return Err(WebDriverError::Api { error, message });
        }

        Ok(value)
    }
}
