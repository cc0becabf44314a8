//! HTTP instance client.
//!
//! This module talks to the AdGuard Home control API with `reqwest`.
//! Every call maps the response onto the engine's error taxonomy so that the
//! report can tell transport failures from validation rejections.

use crate::error::{SyncError, SyncResult};
use crate::transport::InstanceClient;
use adguard_sync_model::{
    Client, ClientUpdate, Clients, Filter, FilterList, FilterRef, FilterUpdate, FilteringConfig,
    FilteringStatus, NewFilter, RefreshFilter, RewriteEntry, Services, Status, Toggle,
    ToggleStatus, UserRules,
};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Default API path appended to the instance URL.
pub const DEFAULT_API_PATH: &str = "control";

/// Connection settings of one AdGuard Home instance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Base URL of the web interface (e.g. `https://dns1.lan:3000`).
    pub url: String,
    /// API path below `url`. Empty means `control`.
    pub api_path: String,
    /// Basic auth user.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Accept invalid TLS certificates.
    pub insecure_skip_verify: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl InstanceConfig {
    /// Creates a configuration for `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Sets the API path.
    pub fn with_api_path(mut self, path: impl Into<String>) -> Self {
        self.api_path = path.into();
        self
    }

    /// Sets basic auth credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Disables TLS certificate validation.
    pub fn with_insecure_skip_verify(mut self, skip: bool) -> Self {
        self.insecure_skip_verify = skip;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Resolves the API base URL: `{url}/{api_path}` with a cleaned path.
    pub fn api_base(&self) -> SyncResult<Url> {
        let api_path = if self.api_path.is_empty() {
            DEFAULT_API_PATH
        } else {
            self.api_path.as_str()
        };
        let raw = format!("{}/{}", self.url, api_path);
        let mut url =
            Url::parse(&raw).map_err(|e| SyncError::config(format!("invalid URL {raw}: {e}")))?;
        if url.cannot_be_a_base() || url.host_str().is_none() {
            return Err(SyncError::config(format!("invalid URL {raw}: no host")));
        }
        let path = clean_path(url.path());
        url.set_path(&path);
        Ok(url)
    }

    fn credentials(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some((user.clone(), pass.clone()))
            }
            _ => None,
        }
    }
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_path: String::new(),
            username: None,
            password: None,
            insecure_skip_verify: false,
            timeout_secs: 30,
        }
    }
}

impl fmt::Debug for InstanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceConfig")
            .field("url", &self.url)
            .field("api_path", &self.api_path)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Lexically cleans a URL path: collapses repeated slashes, resolves `.` and
/// `..`, and drops the trailing slash.
fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// [`InstanceClient`] backed by the AdGuard Home HTTP API.
pub struct HttpInstanceClient {
    host: String,
    base: String,
    http: reqwest::Client,
    credentials: Option<(String, String)>,
}

impl HttpInstanceClient {
    /// Creates a client for the instance described by `config`.
    pub fn new(config: &InstanceConfig) -> SyncResult<Self> {
        let base = config.api_base()?;
        let host = match (base.host_str(), base.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(SyncError::config("instance URL has no host")),
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(|e| SyncError::config(e.to_string()))?;

        Ok(Self {
            host,
            base: base.as_str().trim_end_matches('/').to_string(),
            http,
            credentials: config.credentials(),
        })
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base, endpoint);
        debug!(host = %self.host, %method, %url, "request");
        let builder = self.http.request(method, url);
        match &self.credentials {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    async fn check(response: Response) -> SyncResult<Response> {
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::http(status.as_u16(), body.trim()));
        }
        Ok(response)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> SyncResult<T> {
        let response = self.request(Method::GET, endpoint).send().await?;
        let response = Self::check(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::decode(format!("{endpoint}: {e}")))
    }

    async fn post_json<B: Serialize + ?Sized + Sync>(&self, endpoint: &str, body: &B) -> SyncResult<()> {
        let response = self.request(Method::POST, endpoint).json(body).send().await?;
        Self::check(response).await.map(drop)
    }

    async fn post_text(&self, endpoint: &str, body: String) -> SyncResult<()> {
        let response = self
            .request(Method::POST, endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await?;
        Self::check(response).await.map(drop)
    }

    async fn post_empty(&self, endpoint: &str) -> SyncResult<()> {
        let response = self.request(Method::POST, endpoint).send().await?;
        Self::check(response).await.map(drop)
    }
}

#[derive(Serialize)]
struct ClientRef<'a> {
    name: &'a str,
}

#[async_trait]
impl InstanceClient for HttpInstanceClient {
    fn name(&self) -> &str {
        &self.host
    }

    async fn status(&self) -> SyncResult<Status> {
        self.get("status").await
    }

    async fn rewrites(&self) -> SyncResult<Vec<RewriteEntry>> {
        let entries: Option<Vec<RewriteEntry>> = self.get("rewrite/list").await?;
        Ok(entries.unwrap_or_default())
    }

    async fn add_rewrite(&self, entry: &RewriteEntry) -> SyncResult<()> {
        info!(host = %self.host, domain = %entry.domain, answer = %entry.answer, "Add rewrite entry");
        self.post_json("rewrite/add", entry).await
    }

    async fn delete_rewrite(&self, entry: &RewriteEntry) -> SyncResult<()> {
        info!(host = %self.host, domain = %entry.domain, answer = %entry.answer, "Delete rewrite entry");
        self.post_json("rewrite/delete", entry).await
    }

    async fn filtering(&self) -> SyncResult<FilteringStatus> {
        self.get("filtering/status").await
    }

    async fn add_filter(&self, list: FilterList, filter: &Filter) -> SyncResult<()> {
        info!(host = %self.host, url = %filter.url, whitelist = list.is_whitelist(), "Add filter");
        self.post_json("filtering/add_url", &NewFilter::new(list, filter))
            .await
    }

    async fn update_filter(&self, list: FilterList, filter: &Filter) -> SyncResult<()> {
        info!(
            host = %self.host,
            url = %filter.url,
            whitelist = list.is_whitelist(),
            enabled = filter.enabled,
            "Update filter"
        );
        self.post_json("filtering/set_url", &FilterUpdate::new(list, filter))
            .await
    }

    async fn delete_filter(&self, list: FilterList, filter: &Filter) -> SyncResult<()> {
        info!(host = %self.host, url = %filter.url, whitelist = list.is_whitelist(), "Delete filter");
        self.post_json("filtering/remove_url", &FilterRef::new(list, filter))
            .await
    }

    async fn refresh_filters(&self, list: FilterList) -> SyncResult<()> {
        info!(host = %self.host, whitelist = list.is_whitelist(), "Refresh filter");
        self.post_json(
            "filtering/refresh",
            &RefreshFilter {
                whitelist: list.is_whitelist(),
            },
        )
        .await
    }

    async fn set_custom_rules(&self, rules: &UserRules) -> SyncResult<()> {
        info!(host = %self.host, rules = rules.len(), "Set user rules");
        self.post_text("filtering/set_rules", rules.to_text()).await
    }

    async fn set_filtering_config(&self, config: FilteringConfig) -> SyncResult<()> {
        info!(
            host = %self.host,
            enabled = config.enabled,
            interval = config.interval,
            "Toggle filtering"
        );
        self.post_json("filtering/config", &config).await
    }

    async fn toggle_status(&self, toggle: Toggle) -> SyncResult<bool> {
        let status: ToggleStatus = self.get(&format!("{}/status", toggle.path())).await?;
        Ok(status.enabled)
    }

    async fn set_toggle(&self, toggle: Toggle, enabled: bool) -> SyncResult<()> {
        info!(host = %self.host, mode = %toggle, enable = enabled, "Toggle");
        let target = if enabled { "enable" } else { "disable" };
        self.post_empty(&format!("{}/{}", toggle.path(), target))
            .await
    }

    async fn services(&self) -> SyncResult<Services> {
        let services: Option<Services> = self.get("blocked_services/list").await?;
        Ok(services.unwrap_or_default())
    }

    async fn set_services(&self, services: &Services) -> SyncResult<()> {
        info!(host = %self.host, services = services.ids().len(), "Set services");
        self.post_json("blocked_services/set", services).await
    }

    async fn clients(&self) -> SyncResult<Vec<Client>> {
        let clients: Clients = self.get("clients").await?;
        Ok(clients.clients)
    }

    async fn add_client(&self, client: &Client) -> SyncResult<()> {
        info!(host = %self.host, name = %client.name, "Add client");
        self.post_json("clients/add", client).await
    }

    async fn update_client(&self, client: &Client) -> SyncResult<()> {
        info!(host = %self.host, name = %client.name, "Update client");
        self.post_json("clients/update", &ClientUpdate::new(client))
            .await
    }

    async fn delete_client(&self, client: &Client) -> SyncResult<()> {
        info!(host = %self.host, name = %client.name, "Delete client");
        self.post_json("clients/delete", &ClientRef { name: &client.name })
            .await
    }
}
