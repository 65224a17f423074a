use crate::error::Result;
use futures::future::BoxFuture;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Source of page bodies. Implementations enforce their own timeout.
pub trait Fetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String>>;
}

/// Plain HTTP GET fetcher backed by a pooled `reqwest` client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(60))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("linkloom/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            debug!("Fetching {}", url);
            let response = self.client.get(url.as_str()).send().await?;
            let response = response.error_for_status()?;
            Ok(response.text().await?)
        })
    }
}
