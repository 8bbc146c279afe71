//! Blocking client for the crop prediction backend.
//!
//! Covers `/predict` and `/weather-forecast`. The blocking client must not be
//! built or used from inside an async runtime; call it before entering one.

use crate::report::{CropInputs, Prediction};
use crate::{Error, Result};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Connection settings for the prediction backend
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend root, e.g. `http://127.0.0.1:8000`
    pub base_url: String,
    /// Whole-request timeout in milliseconds
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_ms: 30000,
            user_agent: concat!("agrireport/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    top_3_recommended_crops: Vec<Prediction>,
}

/// Conditions right now, as reported by the weather endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// Degrees Celsius
    pub temp: f64,
    /// Relative humidity, percent
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMain {
    pub temp: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherCondition {
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
}

/// One 3-hour step of the 5-day forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEntry {
    /// Unix timestamp of the step
    pub dt: i64,
    #[serde(default)]
    pub dt_txt: Option<String>,
    pub main: ForecastMain,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherForecast {
    pub current: CurrentWeather,
    #[serde(default)]
    pub forecast: Vec<ForecastEntry>,
}

impl WeatherForecast {
    /// Overwrite temperature and humidity with the current readings
    pub fn fill_inputs(&self, inputs: &mut CropInputs) {
        inputs.temperature = self.current.temp;
        inputs.humidity = self.current.humidity;
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

pub struct PredictionClient {
    client: Client,
    predict_url: Url,
    weather_url: Url,
    config: ClientConfig,
}

impl PredictionClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| Error::ConfigError(format!("invalid backend URL {}: {}", config.base_url, e)))?;
        let endpoint = |path: &str| {
            base.join(path)
                .map_err(|e| Error::ConfigError(format!("invalid backend URL {}: {}", config.base_url, e)))
        };
        let predict_url = endpoint("predict")?;
        let weather_url = endpoint("weather-forecast")?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, predict_url, weather_url, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn predict_url(&self) -> &Url {
        &self.predict_url
    }

    /// Ask the backend for the top three crops for `inputs`
    pub fn predict(&self, inputs: &CropInputs) -> Result<Vec<Prediction>> {
        log::debug!("POST {}", self.predict_url);
        let res = self.client.post(self.predict_url.clone()).json(inputs).send();
        let parsed: PredictResponse = self.read_json(res, "prediction")?;
        log::debug!("received {} predictions", parsed.top_3_recommended_crops.len());
        Ok(parsed.top_3_recommended_crops)
    }

    /// Current conditions and the 5-day forecast for `city`
    pub fn weather_forecast(&self, city: &str) -> Result<WeatherForecast> {
        let mut url = self.weather_url.clone();
        url.query_pairs_mut().append_pair("city", city.trim());
        log::debug!("GET {}", url);
        let res = self.client.get(url).send();
        let forecast: WeatherForecast = self.read_json(res, "weather")?;
        log::debug!(
            "weather for {}: {} C, {}% humidity, {} forecast steps",
            city,
            forecast.current.temp,
            forecast.current.humidity,
            forecast.forecast.len()
        );
        Ok(forecast)
    }

    fn read_json<T: DeserializeOwned>(
        &self,
        res: reqwest::Result<reqwest::blocking::Response>,
        what: &str,
    ) -> Result<T> {
        let res = res.map_err(|e| {
            log::error!("{} request failed: {}", what, e);
            Error::NetworkError(format!("could not connect to the backend: {}", e))
        })?;

        let status = res.status();
        let body = res
            .text()
            .map_err(|e| Error::NetworkError(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| match b.detail {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("unknown error").to_string());
            return Err(Error::NetworkError(format!("backend returned {}: {}", status.as_u16(), detail)));
        }

        serde_json::from_str(&body).map_err(|e| Error::NetworkError(format!("malformed {} response: {}", what, e)))
    }
}
