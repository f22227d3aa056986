//! REST client for the UTMka backend.
//!
//! Reads of the two collections never fail: any problem is logged and the
//! collection comes back empty. Writes return their error to the caller.
use std::time::Duration;

use log::{debug, error, info, warn};
use reqwest::{
    header::{ACCEPT, CACHE_CONTROL},
    Client, RequestBuilder,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    Config, LinkRecord, NewLinkRecord, NewTemplate, RecordId, Result, ServerPreferences, Tag,
    Template, UtmError,
};

/// `{success, id}` returned after creating a record
#[derive(Debug, Clone, Deserialize)]
pub struct CreateResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub id: Option<RecordId>,
}

/// `{success, imported_count}` returned by both import endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ImportResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub imported_count: usize,
}

/// Result of a server-side export.
///
/// The templates endpoint returns the file body; the history endpoint writes
/// the file next to the backend and returns its path instead.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportResponse {
    #[serde(default)]
    pub success: bool,
    pub filename: String,
    #[serde(default)]
    pub file_content: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub count: usize,
}

/// An example import file served by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct ExampleFile {
    pub filename: String,
    pub file_content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct UpdateInfo {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub latest_version: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub release_url: Option<String>,
    #[serde(default)]
    pub release_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadResponse {
    pub installer_path: String,
}

/// Export file formats understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = UtmError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(UtmError::validation(format!(
                "Invalid format: {}. Must be one of: json, csv",
                other
            ))),
        }
    }
}

/// Client for every backend endpoint
#[derive(Debug, Clone)]
pub struct RestGateway {
    client: Client,
    base_url: String,
    user_email: String,
    timeout: Duration,
}

impl RestGateway {
    pub fn new(base_url: &str, user_email: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(RestGateway {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_email: user_email.to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        RestGateway::new(
            &config.api_base_url,
            &config.user_email,
            config.request_timeout(),
        )
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends a request with the shared headers and timeout, mapping non-2xx
    /// answers to `ServerRejected`.
    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<reqwest::Response> {
        let response = request
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UtmError::Timeout {
                        endpoint: endpoint.to_string(),
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    UtmError::Http(e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    body.trim().to_string()
                }
            });
        error!("{} {} -> {}: {}", endpoint, self.base_url, status, message);
        Err(UtmError::ServerRejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T> {
        let response = self.send(request, endpoint).await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn try_fetch_history(&self) -> Result<Vec<LinkRecord>> {
        let request = self
            .client
            .get(self.url("/history"))
            .query(&[("user_email", &self.user_email)]);
        self.send_json(request, "GET /history").await
    }

    pub async fn try_fetch_templates(&self) -> Result<Vec<Template>> {
        let request = self
            .client
            .get(self.url("/templates"))
            .query(&[("user_email", &self.user_email)]);
        self.send_json(request, "GET /templates").await
    }

    /// History, newest first as served. Failures yield an empty list.
    pub async fn fetch_history(&self) -> Vec<LinkRecord> {
        match self.try_fetch_history().await {
            Ok(history) => {
                debug!("Fetched {} history records", history.len());
                history
            }
            Err(e) => {
                warn!("Failed to fetch history: {}", e);
                Vec::new()
            }
        }
    }

    /// Templates as served. Failures yield an empty list.
    pub async fn fetch_templates(&self) -> Vec<Template> {
        match self.try_fetch_templates().await {
            Ok(templates) => {
                debug!("Fetched {} templates", templates.len());
                templates
            }
            Err(e) => {
                warn!("Failed to fetch templates: {}", e);
                Vec::new()
            }
        }
    }

    /// Fetches both collections concurrently.
    pub async fn fetch_all(&self) -> (Vec<LinkRecord>, Vec<Template>) {
        tokio::join!(self.fetch_history(), self.fetch_templates())
    }

    pub async fn create_history(&self, record: &NewLinkRecord) -> Result<CreateResponse> {
        let request = self.client.post(self.url("/history")).json(record);
        let created: CreateResponse = self.send_json(request, "POST /history").await?;
        info!("Created history record {:?}", created.id);
        Ok(created)
    }

    pub async fn delete_history(&self, id: &RecordId) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/history/{}", id)));
        self.send(request, "DELETE /history").await?;
        info!("Deleted history record {}", id);
        Ok(())
    }

    pub async fn set_short_url(&self, id: &RecordId, short_url: &str) -> Result<()> {
        let request = self
            .client
            .put(self.url(&format!("/history/{}/short_url", id)))
            .json(&json!({ "short_url": short_url }));
        self.send(request, "PUT /history/short_url").await?;
        Ok(())
    }

    /// Sets or clears (with `None`) the tag of a history record.
    pub async fn set_tag(&self, id: &RecordId, tag: Option<&Tag>) -> Result<()> {
        let body = match tag {
            Some(tag) => json!({ "tag_name": tag.tag_name, "tag_color": tag.tag_color }),
            None => json!({ "tag_name": "", "tag_color": "" }),
        };
        let request = self
            .client
            .put(self.url(&format!("/history/{}/tag", id)))
            .json(&body);
        self.send(request, "PUT /history/tag").await?;
        Ok(())
    }

    pub async fn create_template(&self, template: &NewTemplate) -> Result<ImportResponse> {
        let request = self.client.post(self.url("/templates")).json(template);
        self.send_json(request, "POST /templates").await
    }

    /// Sends every item in one request.
    pub async fn import_templates(&self, items: &[Value]) -> Result<ImportResponse> {
        let request = self.client.post(self.url("/templates")).json(items);
        self.send_json(request, "POST /templates").await
    }

    pub async fn delete_template(&self, id: &RecordId) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/templates/{}", id)));
        self.send(request, "DELETE /templates").await?;
        info!("Deleted template {}", id);
        Ok(())
    }

    pub async fn import_history(&self, items: &[Value]) -> Result<ImportResponse> {
        let request = self.client.post(self.url("/import_history")).json(items);
        self.send_json(request, "POST /import_history").await
    }

    pub async fn export_templates(&self, format: ExportFormat) -> Result<ExportResponse> {
        let request = self
            .client
            .post(self.url("/export_templates"))
            .json(&json!({ "user_email": self.user_email, "format": format }));
        self.send_json(request, "POST /export_templates").await
    }

    pub async fn export_history(&self, format: ExportFormat) -> Result<ExportResponse> {
        let request = self
            .client
            .post(self.url("/export_history"))
            .json(&json!({ "user_email": self.user_email, "format": format }));
        self.send_json(request, "POST /export_history").await
    }

    pub async fn download_example(&self, filename: &str) -> Result<ExampleFile> {
        let request = self
            .client
            .post(self.url("/download_template_with_folder"))
            .json(&json!({ "filename": filename }));
        self.send_json(request, "POST /download_template_with_folder")
            .await
    }

    pub async fn fetch_preferences(&self) -> Result<ServerPreferences> {
        let request = self.client.get(self.url("/api/preferences"));
        self.send_json(request, "GET /api/preferences").await
    }

    /// Partial update; only the fields that are set are sent.
    pub async fn save_preferences(&self, prefs: &ServerPreferences) -> Result<ServerPreferences> {
        let request = self.client.post(self.url("/api/preferences")).json(prefs);
        self.send_json(request, "POST /api/preferences").await
    }

    /// Asks the backend about a newer release. Any failure means "no update".
    pub async fn check_for_updates(&self) -> Option<UpdateInfo> {
        let request = self.client.get(self.url("/api/update/check"));
        match self
            .send_json::<UpdateInfo>(request, "GET /api/update/check")
            .await
        {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Update check failed: {}", e);
                None
            }
        }
    }

    /// Downloads the installer and returns its path on the backend host.
    pub async fn download_update(&self, download_url: &str) -> Result<String> {
        let request = self
            .client
            .post(self.url("/api/update/download"))
            .json(&json!({ "url": download_url }));
        let response: DownloadResponse = self
            .send_json(request, "POST /api/update/download")
            .await?;
        Ok(response.installer_path)
    }

    pub async fn install_update(&self, installer_path: Option<&str>) -> Result<()> {
        let body = match installer_path {
            Some(path) => json!({ "path": path }),
            None => json!({}),
        };
        let request = self.client.post(self.url("/api/update/install")).json(&body);
        self.send(request, "POST /api/update/install").await?;
        Ok(())
    }
}
