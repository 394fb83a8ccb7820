//! HTTP seam used by the index client and the fetcher.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use crate::error::VendorError;

/// Something that can GET a URL.
///
/// Production code uses [`HttpTransport`]; tests plug in in-memory maps.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the full body of `url`. Non-success statuses are errors.
    async fn get(&self, url: &str) -> Result<Bytes, VendorError>;
}

/// `reqwest` based transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client with the wheelvend user agent.
    ///
    /// # Errors
    ///
    /// Returns [`VendorError::Http`] if the TLS backend fails to initialise.
    pub fn new() -> Result<Self, VendorError> {
        let client = Client::builder().user_agent(crate::USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Bytes, VendorError> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?)
    }
}
