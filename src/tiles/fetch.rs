use crate::core::config::FetchConfig;
use crate::{MapError, Result};
use async_trait::async_trait;

/// Fetches the raw bytes behind a tile URL.
///
/// Implementations must be cancel-safe: the dispatcher aborts an in-flight
/// transfer by dropping the returned future.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Async HTTP client optimized for tile fetching
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .tcp_keepalive(std::time::Duration::from_secs(30))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()?;
        Ok(Self { client })
    }

    /// Wraps an already configured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("fetching tile {}", url);
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(MapError::Http {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let data = response.bytes().await?.to_vec();
        log::info!("downloaded {} ({} bytes)", url, data.len());
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_fetcher_builds_from_config() {
        assert!(HttpFetcher::new(&FetchConfig::default()).is_ok());
    }
}
