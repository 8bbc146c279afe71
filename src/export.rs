//! The "export current view to document" operation.
//!
//! One linear async function with two suspension points: rasterization (run
//! on a blocking task) and the file write. The caller owns the in-flight flag
//! (`ExportState`) and passes it in; while an export holds it, further calls
//! return `ExportOutcome::Busy` without doing anything.

use crate::capture::CaptureRegion;
use crate::document::ExportDocument;
use crate::dom::{NodeIndex, StyledTree};
use crate::paginate::report_file_name;
use crate::rendering::{RasterImage, Rasterizer};
use crate::{Error, ExportConfig, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// In-flight flag for one export control
#[derive(Debug, Default)]
pub struct ExportState {
    in_flight: AtomicBool,
}

impl ExportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claim the flag; `None` when another export already holds it.
    pub fn try_begin(&self) -> Option<InFlight<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight { state: self })
    }
}

/// Clears the in-flight flag when dropped
#[derive(Debug)]
pub struct InFlight<'a> {
    state: &'a ExportState,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.in_flight.store(false, Ordering::Release);
    }
}

/// Inline properties overridden on the live capture root while rasterizing
const LIVE_OVERRIDES: &[(&str, &str)] = &[("background-color", "#ffffff"), ("box-shadow", "none")];

/// Forces a plain white, shadowless root on the live tree and puts the
/// original declarations back on drop.
struct LiveStyleGuard<'a> {
    tree: &'a mut StyledTree,
    root: NodeIndex,
    saved: Vec<(&'static str, Option<String>)>,
}

impl<'a> LiveStyleGuard<'a> {
    fn apply(tree: &'a mut StyledTree, root: NodeIndex) -> Self {
        let style = &mut tree.node_mut(root).style;
        let saved = LIVE_OVERRIDES
            .iter()
            .map(|&(prop, value)| {
                let old = style.get(prop).map(str::to_string);
                style.set(prop, value);
                (prop, old)
            })
            .collect();
        Self { tree, root, saved }
    }

    fn tree(&self) -> &StyledTree {
        self.tree
    }
}

impl Drop for LiveStyleGuard<'_> {
    fn drop(&mut self) {
        let style = &mut self.tree.node_mut(self.root).style;
        for (prop, old) in self.saved.drain(..).rev() {
            match old {
                Some(value) => style.set(prop, &value),
                None => {
                    style.remove(prop);
                }
            }
        }
    }
}

/// Summary of a saved export
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub page_count: usize,
    /// Height of the fitted image in millimetres
    pub scaled_height: f64,
    pub raster_size: (u32, u32),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    Saved(ExportReport),
    /// Another export held the in-flight flag; nothing was done
    Busy,
}

/// Runs exports with one rasterizer backend and one configuration
pub struct Exporter<R> {
    rasterizer: Arc<R>,
    config: ExportConfig,
}

impl<R: Rasterizer + 'static> Exporter<R> {
    pub fn new(rasterizer: R, config: ExportConfig) -> Self {
        Self { rasterizer: Arc::new(rasterizer), config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    pub fn file_name_for(&self, label: Option<&str>) -> String {
        report_file_name(&self.config.file_prefix, label, &self.config.fallback_label)
    }

    /// Export the region to `<output_dir>/<prefix>_<label>.pdf`.
    ///
    /// Errors are logged before being returned. The flag is always released
    /// and the live styles always restored, whatever the outcome.
    pub async fn export(
        &self,
        state: &ExportState,
        region: Option<&mut CaptureRegion>,
        label: Option<&str>,
    ) -> Result<ExportOutcome> {
        let Some(region) = region else {
            let err = Error::MissingTarget("capture handle is not attached".into());
            log::error!("Export error: {}", err);
            return Err(err);
        };
        let Some(_in_flight) = state.try_begin() else {
            log::debug!("export already in flight; ignoring request");
            return Ok(ExportOutcome::Busy);
        };

        let result = self.run(region, label).await;
        if let Err(e) = &result {
            log::error!("Error exporting PDF: {}", e);
        }
        result.map(ExportOutcome::Saved)
    }

    async fn run(&self, region: &mut CaptureRegion, label: Option<&str>) -> Result<ExportReport> {
        let root = region.root();
        let image = {
            let prepared = region.prepare_clone(&self.config.overrides);
            let guard = LiveStyleGuard::apply(region.tree_mut(), root);
            let prepared = merge_live_root(prepared, guard.tree(), root);
            self.rasterize(prepared, root).await?
        };

        let file_name = self.file_name_for(label);
        let document = ExportDocument::new(file_name.clone(), image, self.config.geometry)?;
        let bytes = document.to_pdf_bytes()?;

        tokio::fs::create_dir_all(&self.config.output_dir).await?;
        let path = self.config.output_dir.join(&file_name);
        tokio::fs::write(&path, bytes).await?;

        log::info!("saved {} ({} pages)", path.display(), document.page_count());
        Ok(ExportReport {
            path,
            page_count: document.page_count(),
            scaled_height: document.pagination().scaled_height(),
            raster_size: (document.image().width(), document.image().height()),
        })
    }

    async fn rasterize(&self, tree: StyledTree, root: NodeIndex) -> Result<RasterImage> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let options = self.config.raster_options();
        tokio::task::spawn_blocking(move || rasterizer.rasterize(&tree, root, &options))
            .await
            .map_err(|e| Error::RenderError(format!("rasterizer task failed: {}", e)))?
    }
}

// The clone is taken from the live tree, so it must see the live root's
// temporary white background. Print rules never match the root itself.
fn merge_live_root(mut prepared: StyledTree, live: &StyledTree, root: NodeIndex) -> StyledTree {
    prepared.node_mut(root).style = live.node(root).style.clone();
    prepared
}
