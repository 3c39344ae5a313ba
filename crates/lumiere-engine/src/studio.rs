use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lumiere_contracts::catalog::{StylePreset, POSE_COUNT};
use lumiere_contracts::intake::{decode_data_url, UploadSlot};

use crate::error::StudioError;
use crate::orchestrator::{
    BatchInput, BatchObserver, BatchOutcome, CancelToken, GeneratedResult, Orchestrator,
    PoseFailure,
};

const GENERIC_GENERATION_ERROR: &str = "An error occurred during generation.";

/// Session state behind the presentation shell: two upload slots, the style
/// picker, the gallery and the full-size preview.
pub struct Studio {
    pub portrait: UploadSlot,
    pub products: UploadSlot,
    style: StylePreset,
    results: Vec<GeneratedResult>,
    progress: f64,
    is_generating: bool,
    generation_error: Option<String>,
    selected: Option<String>,
    orchestrator: Orchestrator,
}

impl Studio {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            portrait: UploadSlot::portrait(),
            products: UploadSlot::products(),
            style: StylePreset::default(),
            results: Vec::new(),
            progress: 0.0,
            is_generating: false,
            generation_error: None,
            selected: None,
            orchestrator,
        }
    }

    pub fn style(&self) -> StylePreset {
        self.style
    }

    pub fn set_style(&mut self, style: StylePreset) {
        self.style = style;
    }

    pub fn results(&self) -> &[GeneratedResult] {
        &self.results
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn progress_percent(&self) -> u32 {
        (self.progress * 100.0).round() as u32
    }

    pub fn is_generating(&self) -> bool {
        self.is_generating
    }

    pub fn generation_error(&self) -> Option<&str> {
        self.generation_error.as_deref()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn can_generate(&self) -> bool {
        !self.portrait.is_empty() && !self.products.is_empty() && !self.is_generating
    }

    /// Placeholder tiles still owed to the gallery while a batch runs.
    pub fn pending_count(&self) -> usize {
        if self.is_generating {
            POSE_COUNT.saturating_sub(self.results.len())
        } else {
            0
        }
    }

    /// Runs one batch, filling the gallery as results arrive.
    ///
    /// Missing uploads refuse the batch without touching the previous gallery.
    /// Any error that escapes the per-pose boundary is recorded as the
    /// session's generation error and returned.
    pub fn generate(
        &mut self,
        observer: &mut dyn BatchObserver,
        cancel: &CancelToken,
    ) -> Result<BatchOutcome> {
        let Some(portrait) = self.portrait.first() else {
            return Err(StudioError::MissingPortrait.into());
        };
        if self.products.is_empty() {
            return Err(StudioError::MissingProducts.into());
        }
        let input = BatchInput {
            portrait: Some(portrait.data_url.clone()),
            products: self.products.data_urls(),
            style: self.style,
        };

        self.is_generating = true;
        self.progress = 0.0;
        self.results.clear();
        self.generation_error = None;
        self.selected = None;

        let mut gallery = GalleryFeed {
            results: &mut self.results,
            progress: &mut self.progress,
            inner: observer,
        };
        let outcome = self.orchestrator.run(&input, &mut gallery, cancel);
        match &outcome {
            Ok(done) => self.progress = done.progress,
            Err(err) => {
                let message = err.to_string();
                self.generation_error = Some(if message.trim().is_empty() {
                    GENERIC_GENERATION_ERROR.to_string()
                } else {
                    message
                });
            }
        }
        self.is_generating = false;
        outcome
    }

    /// Opens the full-size preview for one result.
    pub fn select(&mut self, id: &str) -> Result<&GeneratedResult> {
        let result = self.find(id)?;
        self.selected = Some(result.id.clone());
        self.find(id)
    }

    pub fn selected(&self) -> Option<&GeneratedResult> {
        let id = self.selected.as_deref()?;
        self.results.iter().find(|result| result.id == id)
    }

    pub fn close_preview(&mut self) {
        self.selected = None;
    }

    /// Saves one result as `lumiere-editorial-<id>.png` under `dir`.
    pub fn download(&self, id: &str, dir: &Path) -> Result<PathBuf> {
        let result = self.find(id)?;
        write_result_image(&result.id, &result.data_url, dir)
    }

    fn find(&self, id: &str) -> Result<&GeneratedResult> {
        self.results
            .iter()
            .find(|result| result.id == id)
            .ok_or_else(|| StudioError::UnknownResult(id.to_string()).into())
    }
}

pub fn download_file_name(id: &str) -> String {
    format!("lumiere-editorial-{id}.png")
}

pub fn write_result_image(id: &str, data_url: &str, dir: &Path) -> Result<PathBuf> {
    let bytes =
        decode_data_url(data_url).with_context(|| format!("result {id} is not a data url"))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(download_file_name(id));
    std::fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Appends to the studio gallery before handing each event to the caller's
/// observer.
struct GalleryFeed<'a> {
    results: &'a mut Vec<GeneratedResult>,
    progress: &'a mut f64,
    inner: &'a mut dyn BatchObserver,
}

impl BatchObserver for GalleryFeed<'_> {
    fn on_pose_started(&mut self, index: usize, pose: &str) -> Result<()> {
        self.inner.on_pose_started(index, pose)
    }

    fn on_result(&mut self, result: &GeneratedResult, progress: f64) -> Result<()> {
        self.results.push(result.clone());
        *self.progress = progress;
        self.inner.on_result(result, progress)
    }

    fn on_failure(&mut self, failure: &PoseFailure, progress: f64) -> Result<()> {
        *self.progress = progress;
        self.inner.on_failure(failure, progress)
    }
}
