//! Current weather by city name, from weatherapi.com.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use toolchat_agent::tools::{require_string, Tool};

use crate::error::ToolError;

/// HTTPS only: the key travels in the query string.
pub const DEFAULT_API_BASE: &str = "https://api.weatherapi.com/v1";
/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "WEATHER_API";
/// Overrides [`DEFAULT_API_BASE`].
pub const API_BASE_ENV: &str = "TOOLCHAT_WEATHER_API_BASE";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// ─────────────────────────────────────────────
// Wire types (the subset we format)
// ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Realtime {
    location: Location,
    current: Current,
}

#[derive(Debug, Deserialize)]
struct Location {
    name: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct Current {
    temp_c: f64,
    feelslike_c: f64,
    wind_kph: f64,
    wind_dir: String,
    humidity: f64,
    condition: Condition,
}

#[derive(Debug, Deserialize)]
struct Condition {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

fn format_report(data: &Realtime) -> String {
    let c = &data.current;
    format!(
        "🌍 Location: {}, {}\n\
         🌤️ Condition: {}\n\
         🌡️ Temperature: {:.1}°C (Feels like {:.1}°C)\n\
         💨 Wind: {:.1} km/h from {}\n\
         💧 Humidity: {}%",
        data.location.name,
        data.location.country,
        c.condition.text,
        c.temp_c,
        c.feelslike_c,
        c.wind_kph,
        c.wind_dir,
        c.humidity,
    )
}

// ─────────────────────────────────────────────
// WeatherTool
// ─────────────────────────────────────────────

pub struct WeatherTool {
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl WeatherTool {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
        }
    }

    /// Read the key and endpoint from the environment.
    pub fn from_env() -> Self {
        let api_base =
            std::env::var(API_BASE_ENV).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let api_key = std::env::var(API_KEY_ENV).ok();
        if api_key.is_none() {
            warn!("{API_KEY_ENV} is not set; weather lookups will fail");
        }
        Self::new(api_base, api_key)
    }

    async fn lookup(&self, city: &str) -> Result<String, ToolError> {
        let key = self.api_key.as_deref().ok_or(ToolError::MissingKey)?;
        let url = format!("{}/current.json", self.api_base);
        debug!(city = city, "weather lookup");

        let response = self
            .client
            .get(&url)
            .query(&[("key", key), ("q", city)])
            .send()
            .await
            .map_err(upstream)?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(upstream)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}"));
            warn!(city = city, status = %status, message = %message, "weather lookup failed");
            return Err(ToolError::Upstream(message));
        }

        let data: Realtime = serde_json::from_str(&body)
            .map_err(|e| ToolError::Upstream(format!("unexpected response: {e}")))?;
        Ok(format_report(&data))
    }
}

/// The request URL carries the key, so it never goes into the message.
fn upstream(err: reqwest::Error) -> ToolError {
    ToolError::Upstream(err.without_url().to_string())
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather_using_city_name"
    }

    fn description(&self) -> &str {
        "Get the current weather for a city: location, condition, temperature, wind and humidity."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "city_name": {
                    "type": "string",
                    "description": "Name of the city, e.g. \"London\""
                }
            },
            "required": ["city_name"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let city = require_string(&params, "city_name")
            .map_err(|e| ToolError::InvalidParams(e.to_string()))?;
        let city = city.trim();
        if city.is_empty() {
            return Err(ToolError::InvalidParams("city_name must not be empty".into()).into());
        }
        Ok(self.lookup(city).await?)
    }
}
