use anyhow::{bail, Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

pub const REGISTER_URL: &str = "http://www.sahealth.sa.gov.au/wps/wcm/connect/public+content/sa+health+internet/about+us/legislation/food+legislation/food+prosecution+register";
const DB_PATH: &str = "data/prosecutions.sqlite";

/// Settings read from `MORPH_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub google_api_key: Option<String>,
    /// `HOST:PORT`
    pub proxy: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub db_path: String,
    pub source_url: String,
}

impl Settings {
    pub fn load() -> Result<Settings> {
        Self::from_source(Environment::with_prefix("MORPH"))
    }

    fn from_source(env: Environment) -> Result<Settings> {
        let settings: Settings = Config::builder()
            .set_default("timeout_secs", 60)?
            .set_default("max_retries", 10)?
            .set_default("db_path", DB_PATH)?
            .set_default("source_url", REGISTER_URL)?
            .add_source(env.try_parsing(true))
            .build()
            .context("Failed to read MORPH_* settings")?
            .try_deserialize()
            .context("Invalid MORPH_* settings")?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if let Some(proxy) = &self.proxy {
            let Some((host, port)) = proxy.split_once(':') else {
                bail!("MORPH_PROXY must be HOST:PORT, got {:?}", proxy);
            };
            if host.is_empty() || port.parse::<u16>().is_err() {
                bail!("MORPH_PROXY must be HOST:PORT, got {:?}", proxy);
            }
        }
        Ok(())
    }

    /// Proxy URL for the HTTP client.
    pub fn proxy_url(&self) -> Option<String> {
        self.proxy.as_ref().map(|p| format!("http://{}", p))
    }
}
