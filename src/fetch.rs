use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use tracing::{info, warn};

use crate::settings::Settings;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1; Win64; x64; rv:43.0) Gecko/20100101 Firefox/43.0";
const BASE_BACKOFF_MS: u64 = 1000;
const MAX_BACKOFF_MS: u64 = 30_000;

/// HTTP client shared by the page fetch and the geocoder.
pub fn build_client(settings: &Settings) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(settings.timeout_secs))
        .timeout(Duration::from_secs(settings.timeout_secs));

    if let Some(proxy) = settings.proxy_url() {
        info!("Using proxy {}", proxy);
        builder = builder.proxy(reqwest::Proxy::all(&proxy).context("Invalid proxy")?);
    }

    builder.build().context("Failed to build HTTP client")
}

/// Fetch a page body, retrying failures and non-success statuses with
/// exponential backoff.
pub async fn fetch_page(client: &Client, url: &str, max_retries: u32) -> Result<String> {
    let mut attempt = 0;
    loop {
        match fetch_once(client, url).await {
            Ok(body) => return Ok(body),
            Err(e) if attempt < max_retries => {
                let backoff = backoff(attempt);
                warn!(
                    "Error fetching {} (attempt {}/{}): {:#}; retrying in {:.1}s",
                    url,
                    attempt + 1,
                    max_retries,
                    e,
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                attempt += 1;
            }
            Err(e) => return Err(e.context(format!("Failed to fetch {} after {} retries", url, max_retries))),
        }
    }
}

async fn fetch_once(client: &Client, url: &str) -> Result<String> {
    info!("Fetching {}", url);
    let response = client.get(url).send().await?;
    let status = response.status();
    if !status.is_success() {
        bail!("HTTP {}", status);
    }
    Ok(response.text().await?)
}

fn backoff(attempt: u32) -> Duration {
    let ms = BASE_BACKOFF_MS.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(ms.min(MAX_BACKOFF_MS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(backoff(0), Duration::from_millis(1000));
        assert_eq!(backoff(1), Duration::from_millis(2000));
        assert_eq!(backoff(3), Duration::from_millis(8000));
        assert_eq!(backoff(9), Duration::from_millis(MAX_BACKOFF_MS));
        assert_eq!(backoff(64), Duration::from_millis(MAX_BACKOFF_MS));
    }
}
