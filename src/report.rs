//! Results view markup.
//!
//! Builds the crop results panel that gets exported: input parameters, the
//! best match, the alternatives, a confidence chart and the pro tip. The
//! markup carries the screen styling (light text on a dark card); the print
//! rules in `capture` are what make it readable on paper.

use crate::capture::DEFAULT_TARGET_ID;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Chart colours, in prediction order
pub const CHART_COLORS: [&str; 3] = ["#10b981", "#3b82f6", "#f97316"];

/// Soil and climate parameters as sent to the prediction backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropInputs {
    #[serde(rename = "N")]
    pub n: i64,
    #[serde(rename = "P")]
    pub p: i64,
    #[serde(rename = "K")]
    pub k: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub rainfall: f64,
    #[serde(default)]
    pub city: Option<String>,
}

impl CropInputs {
    /// Labelled rows of the input table; the city goes in the title instead
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Nitrogen (N)", self.n.to_string()),
            ("Phosphorous (P)", self.p.to_string()),
            ("Potassium (K)", self.k.to_string()),
            ("Temperature (°C)", self.temperature.to_string()),
            ("Humidity (%)", self.humidity.to_string()),
            ("Soil pH", self.ph.to_string()),
            ("Rainfall (mm/year)", self.rainfall.to_string()),
        ]
    }

    /// The city, if one was given and is not blank
    pub fn city_label(&self) -> Option<&str> {
        self.city.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }
}

/// One ranked recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub crop: String,
    /// Formatted like `"87.50%"`
    pub confidence: String,
}

impl Prediction {
    pub fn confidence_percent(&self) -> Option<f64> {
        parse_percent(&self.confidence)
    }
}

/// `"87.50%"` → `87.5`
pub fn parse_percent(value: &str) -> Option<f64> {
    let v = value.trim();
    v.strip_suffix('%').unwrap_or(v).trim().parse().ok()
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// The results panel for one prediction round
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView {
    pub inputs: Option<CropInputs>,
    pub predictions: Vec<Prediction>,
}

impl ResultsView {
    pub fn new(inputs: Option<CropInputs>, predictions: Vec<Prediction>) -> Self {
        Self { inputs, predictions }
    }

    /// Label for the output file name
    pub fn label(&self) -> Option<&str> {
        self.inputs.as_ref().and_then(CropInputs::city_label)
    }

    /// Chart shares of each prediction, as whole percentages of the total
    pub fn chart_shares(&self) -> Vec<(String, f64)> {
        let values: Vec<f64> = self
            .predictions
            .iter()
            .map(|p| p.confidence_percent().unwrap_or(0.0))
            .collect();
        let total: f64 = values.iter().sum();
        self.predictions
            .iter()
            .zip(values)
            .map(|(p, v)| {
                let share = if total > 0.0 { v / total * 100.0 } else { 0.0 };
                (p.crop.clone(), share)
            })
            .collect()
    }

    /// Render the full panel as an HTML document
    pub fn render_html(&self) -> Result<String> {
        let Some((top, others)) = self.predictions.split_first() else {
            return Err(Error::Other("no predictions to render".into()));
        };

        // Writing into a String cannot fail.
        let mut h = String::new();
        let _ = write!(
            h,
            r#"<!DOCTYPE html><html><head><title>Crop Recommendation Report</title></head><body style="background-color: #0f172a">"#
        );
        let _ = write!(
            h,
            r#"<div id="{}" class="predictions-list" style="background-color: #1e293b; color: rgba(255, 255, 255, 0.9); box-shadow: 0 8px 32px rgba(0, 0, 0, 0.3)">"#,
            DEFAULT_TARGET_ID
        );
        h.push_str(r#"<button class="export-button">Export Results to PDF</button>"#);

        if let Some(inputs) = &self.inputs {
            h.push_str(r#"<div class="user-input-container">"#);
            let _ = write!(
                h,
                r#"<h3 class="user-input-title">Your Input Parameters ({})</h3><div class="user-input-grid">"#,
                escape(inputs.city_label().unwrap_or("N/A"))
            );
            for (label, value) in inputs.rows() {
                let _ = write!(
                    h,
                    r#"<div class="input-item"><div class="input-label">{}</div><div class="input-value" style="color: #ffffff">{}</div></div>"#,
                    escape(label),
                    escape(&value)
                );
            }
            h.push_str("</div></div>");
        }

        h.push_str("<h2>Recommendations</h2>");
        let _ = write!(
            h,
            r#"<div class="top-pick" style="background: linear-gradient(135deg, #10b981 0%, #059669 100%); color: #ffffff"><span class="top-label">Best Match</span><h3>{}</h3><p class="confidence">{}</p><div style="background: rgba(255, 255, 255, 0.15)">Perfect conditions detected for optimal growth</div></div>"#,
            escape(&top.crop),
            escape(&top.confidence)
        );

        if !others.is_empty() {
            h.push_str(r#"<h4 class="other-options-title">Alternative Options:</h4><ul class="other-options-list">"#);
            for pick in others {
                let _ = write!(
                    h,
                    r#"<li class="other-option-item" style="background: rgba(255, 255, 255, 0.1)"><span class="crop-name">{}</span> <span class="crop-confidence">{}</span></li>"#,
                    escape(&pick.crop),
                    escape(&pick.confidence)
                );
            }
            h.push_str("</ul>");
        }

        // Bars are `figure`s so the text print rules (which match every div)
        // leave their fill alone.
        h.push_str(r#"<div class="chart-container"><h4 class="chart-title">Prediction Confidence</h4>"#);
        for (i, (crop, share)) in self.chart_shares().into_iter().enumerate() {
            let color = CHART_COLORS[i % CHART_COLORS.len()];
            let _ = write!(
                h,
                r#"<div class="chart-row"><span class="recharts-legend-item-text" style="color: {color}">{} ({:.0}%)</span><figure class="chart-bar" style="background-color: {color}; width: {:.0}%"></figure></div>"#,
                escape(&crop),
                share,
                share.max(1.0),
                color = color
            );
        }
        h.push_str("</div>");

        h.push_str(
            r#"<div class="pro-tip" style="background: rgba(255, 255, 255, 0.1); color: rgba(255, 255, 255, 0.8)"><strong>Pro Tip:</strong> Consider local market demand and your farming experience when making final decisions.</div>"#,
        );
        h.push_str("</div></body></html>");
        Ok(h)
    }
}
