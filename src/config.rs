use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address the REST service listens on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default)]
    pub headlines: Vec<HeadlineConfig>,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// A headline served by `/news`, keyed by its link.
#[derive(Debug, Deserialize, Clone)]
pub struct HeadlineConfig {
    pub category: String,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub source: String,
    /// Full body returned by `/article`
    #[serde(default)]
    pub article: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Distinct categories in the order they first appear.
    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = Vec::new();
        for headline in &self.headlines {
            if !categories.contains(&headline.category.as_str()) {
                categories.push(&headline.category);
            }
        }
        categories
    }
}
