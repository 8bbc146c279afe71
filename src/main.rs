use agrireport::capture::DEFAULT_TARGET_ID;
use agrireport::{
    new_rasterizer, CaptureRegion, CropInputs, ExportConfig, ExportOutcome, ExportState, Exporter, PageGeometry,
    Prediction, ResultsView, Viewport,
};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "agrireport", version, about = "Export crop recommendation results to PDF")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Export a saved HTML results view
    Export {
        #[arg(long)]
        html: PathBuf,
        /// Id of the element to capture
        #[arg(long, default_value = DEFAULT_TARGET_ID)]
        target: String,
        /// Label for the file name
        #[arg(long)]
        city: Option<String>,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Fetch predictions from the backend and export the results view
    ///
    /// When the input names a city, temperature and humidity are taken from
    /// the backend's current weather for it and may be left out of the file.
    #[cfg(feature = "client")]
    Predict {
        /// JSON file with the soil and climate parameters
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        api: String,
        #[arg(long, default_value_t = 30000)]
        timeout_ms: u64,
        /// Keep temperature and humidity from the input file
        #[arg(long)]
        no_weather: bool,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Export a results view built from saved predictions
    Render {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        predictions: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct OutputArgs {
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Layout width in CSS pixels
    #[arg(long, default_value_t = 800)]
    width: u32,
    /// Device pixels per CSS pixel
    #[arg(long, default_value_t = 2.0)]
    scale: f32,
    /// Page margin in millimetres
    #[arg(long, default_value_t = 10.0)]
    margin: f64,
    /// Font file for text rendering
    #[arg(long)]
    font: Option<PathBuf>,
}

impl OutputArgs {
    fn to_config(&self) -> Result<ExportConfig> {
        let config = ExportConfig {
            output_dir: self.out_dir.clone(),
            viewport: Viewport { width: self.width },
            pixel_ratio: self.scale,
            geometry: PageGeometry { margin: self.margin, ..PageGeometry::A4_PORTRAIT },
            font_path: self.font.clone(),
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

/// Saved predictions: either the bare list or the backend response as-is
#[derive(Deserialize)]
#[serde(untagged)]
enum SavedPredictions {
    List(Vec<Prediction>),
    Response { top_3_recommended_crops: Vec<Prediction> },
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn export_html(html: &str, target: &str, label: Option<&str>, config: ExportConfig) -> Result<()> {
    let mut region = CaptureRegion::from_html(html, target)?;
    let rasterizer = new_rasterizer(&config)?;
    let exporter = Exporter::new(rasterizer, config);
    let state = ExportState::new();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("starting runtime")?;
    let outcome = runtime.block_on(exporter.export(&state, Some(&mut region), label))?;

    match outcome {
        ExportOutcome::Saved(report) => {
            println!(
                "Saved {} ({} page{}, {}x{} px)",
                report.path.display(),
                report.page_count,
                if report.page_count == 1 { "" } else { "s" },
                report.raster_size.0,
                report.raster_size.1
            );
            Ok(())
        }
        ExportOutcome::Busy => bail!("an export is already in progress"),
    }
}

fn export_view(view: &ResultsView, config: ExportConfig) -> Result<()> {
    let html = view.render_html()?;
    export_html(&html, DEFAULT_TARGET_ID, view.label(), config)
}

/// Fill temperature and humidity from the city's current weather. A failed
/// lookup keeps whatever the file had.
#[cfg(feature = "client")]
fn fill_weather(client: &agrireport::PredictionClient, raw: &mut serde_json::Value) {
    let Some(fields) = raw.as_object_mut() else {
        return;
    };
    let city = match fields.get("city").and_then(|c| c.as_str()).map(str::trim) {
        Some(c) if !c.is_empty() => c.to_string(),
        _ => return,
    };
    match client.weather_forecast(&city) {
        Ok(weather) => {
            log::info!(
                "weather for {}: {} C, {}% humidity",
                city,
                weather.current.temp,
                weather.current.humidity
            );
            fields.insert("temperature".into(), weather.current.temp.into());
            fields.insert("humidity".into(), weather.current.humidity.into());
        }
        Err(e) => log::warn!("could not fetch weather for {}: {}", city, e),
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Export { html, target, city, output } => {
            let markup = std::fs::read_to_string(&html).with_context(|| format!("reading {}", html.display()))?;
            export_html(&markup, &target, city.as_deref(), output.to_config()?)
        }
        #[cfg(feature = "client")]
        Command::Predict { input, api, timeout_ms, no_weather, output } => {
            let config = output.to_config()?;
            let client = agrireport::PredictionClient::new(agrireport::ClientConfig {
                base_url: api,
                timeout_ms,
                ..Default::default()
            })?;
            let mut raw: serde_json::Value = read_json(&input)?;
            if !no_weather {
                fill_weather(&client, &mut raw);
            }
            let inputs: CropInputs =
                serde_json::from_value(raw).with_context(|| format!("parsing {}", input.display()))?;
            let predictions = client.predict(&inputs)?;
            for p in &predictions {
                log::info!("{}: {}", p.crop, p.confidence);
            }
            export_view(&ResultsView::new(Some(inputs), predictions), config)
        }
        Command::Render { input, predictions, output } => {
            let config = output.to_config()?;
            let inputs: CropInputs = read_json(&input)?;
            let predictions = match read_json::<SavedPredictions>(&predictions)? {
                SavedPredictions::List(list) => list,
                SavedPredictions::Response { top_3_recommended_crops } => top_3_recommended_crops,
            };
            export_view(&ResultsView::new(Some(inputs), predictions), config)
        }
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}
