//! HTTP client for the Chef server API

use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::auth::{ClientKey, sign_request};
use crate::error::{ChefError, Result};
use crate::types::{PartialSearchResponse, Projection};

/// Chef client version advertised to the server
const CHEF_VERSION: &str = "18.0.0";

/// Authenticated Chef API client
///
/// Cheap to clone; the underlying `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct ChefClient {
    client: Client,
    base_url: Url,
    client_name: String,
    key: Option<ClientKey>,
}

impl ChefClient {
    /// Create a new client
    ///
    /// A `None` key produces unsigned requests.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    ///
    /// # Example
    /// ```no_run
    /// use chef_exporter_client::ChefClient;
    ///
    /// let client = ChefClient::new("https://chef.example.com/organizations/acme", "exporter", None)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn new(
        base_url: impl AsRef<str>,
        client_name: impl Into<String>,
        key: Option<ClientKey>,
    ) -> Result<Self> {
        Self::with_client(base_url, client_name, key, Client::new())
    }

    /// Create a new client with a custom `reqwest::Client`
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid.
    pub fn with_client(
        base_url: impl AsRef<str>,
        client_name: impl Into<String>,
        key: Option<ClientKey>,
        client: Client,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client,
            base_url,
            client_name: client_name.into(),
            key,
        })
    }

    /// Build a `reqwest::Client` whose requests give up after `timeout`
    ///
    /// # Errors
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn transport(timeout: Duration) -> Result<Client> {
        Ok(Client::builder().timeout(timeout).build()?)
    }

    /// Whether requests will carry a signature
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.key.is_some()
    }

    /// Build a full URL from a path relative to the organization root
    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(ChefError::Url)
    }

    /// Perform a signed POST with a JSON body and deserialize the response
    async fn post<T: DeserializeOwned>(&self, url: Url, body: Vec<u8>) -> Result<T> {
        let signed = sign_request(
            self.key.as_ref(),
            &self.client_name,
            "POST",
            url.path(),
            &body,
            Utc::now(),
        )
        .map_err(|e| ChefError::Signing(e.to_string()))?;

        let mut request = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header("X-Chef-Version", CHEF_VERSION);
        for (name, value) in signed.iter() {
            request = request.header(name, value);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(ChefError::from_transport)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ChefError::Api { status, message });
        }

        let bytes = response.bytes().await.map_err(ChefError::from_transport)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Run a partial search against `index`
    ///
    /// Only the attributes named in `projection` are returned for each match.
    ///
    /// # Errors
    /// Returns an error if the request fails, the server answers with a
    /// non-success status, or the body is not a search result.
    #[instrument(skip(self, projection), fields(server = %self.base_url))]
    pub async fn partial_search(
        &self,
        index: &str,
        query: &str,
        projection: &Projection,
    ) -> Result<PartialSearchResponse> {
        let mut url = self.url(&format!("search/{index}"))?;
        url.query_pairs_mut().append_pair("q", query);

        let attributes: Vec<&str> = projection.keys().collect();
        debug!(?attributes, signed = self.is_signed(), "partial search");
        let body = serde_json::to_vec(projection)?;
        let result: PartialSearchResponse = self.post(url, body).await?;
        debug!(total = result.total, rows = result.rows.len(), "partial search returned");
        Ok(result)
    }
}
