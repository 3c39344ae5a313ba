use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use lumiere_contracts::catalog::{StylePreset, POSES, POSE_COUNT};
use lumiere_contracts::events::EventWriter;
use serde_json::json;

use crate::config::GenerationSettings;
use crate::error::StudioError;
use crate::prompt::composed_prompt;
use crate::provider::{
    error_chain_text, map_object, prompt_fingerprint, FashionRequest, ImageProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchState {
    #[default]
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedResult {
    pub id: String,
    pub data_url: String,
    pub prompt: String,
    pub pose_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoseFailure {
    pub pose_index: usize,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub results: Vec<GeneratedResult>,
    pub failures: Vec<PoseFailure>,
    pub attempted: usize,
    pub progress: f64,
    pub cancelled: bool,
}

/// Inputs for one batch. Payloads are data URLs or bare base64.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub portrait: Option<String>,
    pub products: Vec<String>,
    pub style: StylePreset,
}

/// Shared stop flag, checked before each pose. A call already in flight is
/// allowed to settle.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Incremental batch callbacks. An `Err` from a callback aborts the batch.
pub trait BatchObserver {
    fn on_pose_started(&mut self, _index: usize, _pose: &str) -> Result<()> {
        Ok(())
    }

    fn on_result(&mut self, _result: &GeneratedResult, _progress: f64) -> Result<()> {
        Ok(())
    }

    fn on_failure(&mut self, _failure: &PoseFailure, _progress: f64) -> Result<()> {
        Ok(())
    }
}

pub struct NoopObserver;

impl BatchObserver for NoopObserver {}

pub struct Orchestrator {
    provider: Arc<dyn ImageProvider>,
    settings: GenerationSettings,
    events: Option<EventWriter>,
    state: BatchState,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        settings: GenerationSettings,
        events: Option<EventWriter>,
    ) -> Self {
        Self {
            provider,
            settings,
            events,
            state: BatchState::Idle,
        }
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Runs all poses in order, one request at a time.
    ///
    /// Missing inputs are refused before anything runs. A failing pose is
    /// logged and skipped; only observer or event-log errors end the batch
    /// early, and the state returns to `Idle` either way.
    pub fn run(
        &mut self,
        input: &BatchInput,
        observer: &mut dyn BatchObserver,
        cancel: &CancelToken,
    ) -> Result<BatchOutcome> {
        let portrait = input
            .portrait
            .as_deref()
            .filter(|payload| !payload.trim().is_empty())
            .ok_or(StudioError::MissingPortrait)?;
        if input.products.is_empty() {
            return Err(StudioError::MissingProducts.into());
        }

        self.state = BatchState::Running;
        let outcome = self.run_poses(portrait, input, observer, cancel);
        self.state = BatchState::Idle;
        outcome
    }

    fn run_poses(
        &self,
        portrait: &str,
        input: &BatchInput,
        observer: &mut dyn BatchObserver,
        cancel: &CancelToken,
    ) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        self.emit(
            "batch_started",
            json!({
                "style": input.style.key(),
                "provider": self.provider.name(),
                "model": self.settings.model,
                "poses": POSE_COUNT,
                "products": input.products.len(),
            }),
        )?;

        for (index, pose) in POSES.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome.cancelled = true;
                self.emit(
                    "batch_cancelled",
                    json!({ "pose_index": index, "remaining": POSE_COUNT - index }),
                )?;
                break;
            }

            observer.on_pose_started(index, pose)?;
            self.emit("pose_started", json!({ "pose_index": index }))?;

            let request = FashionRequest {
                portrait: portrait.to_string(),
                products: input.products.clone(),
                style: input.style,
                pose: (*pose).to_string(),
                settings: self.settings.clone(),
            };
            let attempt = self
                .provider
                .generate(&request)
                .with_context(|| format!("pose {} generation failed", index + 1));
            outcome.attempted += 1;
            outcome.progress = (index + 1) as f64 / POSE_COUNT as f64;

            match attempt {
                Ok(payload) => {
                    let prompt = composed_prompt(input.style, pose);
                    let result = GeneratedResult {
                        id: format!("gen-{}-{}", chrono::Utc::now().timestamp_millis(), index),
                        data_url: payload.data_url,
                        prompt,
                        pose_index: index,
                    };
                    self.emit(
                        "result_created",
                        json!({
                            "id": result.id,
                            "pose_index": index,
                            "prompt": result.prompt,
                            "prompt_fingerprint": prompt_fingerprint(&result.prompt),
                            "provider_mime_type": payload.provider_mime_type,
                        }),
                    )?;
                    observer.on_result(&result, outcome.progress)?;
                    outcome.results.push(result);
                }
                Err(err) => {
                    let failure = PoseFailure {
                        pose_index: index,
                        error: error_chain_text(&err, 2048),
                    };
                    self.emit(
                        "generation_failed",
                        json!({
                            "pose_index": index,
                            "provider": self.provider.name(),
                            "model": self.settings.model,
                            "error": failure.error,
                        }),
                    )?;
                    observer.on_failure(&failure, outcome.progress)?;
                    outcome.failures.push(failure);
                }
            }

            self.emit(
                "progress_update",
                json!({
                    "progress": outcome.progress,
                    "percent": (outcome.progress * 100.0).round() as u64,
                }),
            )?;
        }

        self.emit(
            "batch_finished",
            json!({
                "attempted": outcome.attempted,
                "results": outcome.results.len(),
                "failures": outcome.failures.len(),
                "cancelled": outcome.cancelled,
            }),
        )?;
        Ok(outcome)
    }

    fn emit(&self, event_type: &str, payload: serde_json::Value) -> Result<()> {
        if let Some(events) = &self.events {
            events.emit(event_type, map_object(payload))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use anyhow::{bail, Result};
    use lumiere_contracts::catalog::{StylePreset, POSES};
    use lumiere_contracts::events::{read_event_types, EventWriter};

    use super::{
        BatchInput, BatchObserver, BatchState, CancelToken, GeneratedResult, NoopObserver,
        Orchestrator, PoseFailure,
    };
    use crate::config::GenerationSettings;
    use crate::error::StudioError;
    use crate::provider::{FashionRequest, GeneratedPayload, ImageProvider};

    /// Fails on the listed pose indices, records every pose it sees.
    struct ScriptedProvider {
        fail_on: HashSet<usize>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        fn new(fail_on: &[usize]) -> Arc<Self> {
            Arc::new(Self {
                fail_on: fail_on.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
        }
    }

    impl ImageProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate(&self, request: &FashionRequest) -> Result<GeneratedPayload> {
            let index = POSES
                .iter()
                .position(|pose| *pose == request.pose)
                .unwrap_or(usize::MAX);
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(request.pose.clone());
            }
            if self.fail_on.contains(&index) {
                return Err(StudioError::NoImageReturned.into());
            }
            Ok(GeneratedPayload {
                data_url: format!("data:image/png;base64,UE9TRQ{index}"),
                provider_mime_type: Some("image/png".to_string()),
            })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        progress: Vec<f64>,
        results: Vec<usize>,
        failures: Vec<usize>,
        cancel_after_results: Option<(usize, CancelToken)>,
    }

    impl BatchObserver for RecordingObserver {
        fn on_result(&mut self, result: &GeneratedResult, progress: f64) -> Result<()> {
            self.results.push(result.pose_index);
            self.progress.push(progress);
            if let Some((limit, token)) = &self.cancel_after_results {
                if self.results.len() >= *limit {
                    token.cancel();
                }
            }
            Ok(())
        }

        fn on_failure(&mut self, failure: &PoseFailure, progress: f64) -> Result<()> {
            self.failures.push(failure.pose_index);
            self.progress.push(progress);
            Ok(())
        }
    }

    fn settings() -> GenerationSettings {
        GenerationSettings {
            model: "scripted-image".to_string(),
            aspect_ratio: "3:4".to_string(),
            image_size: "4K".to_string(),
        }
    }

    fn input(products: usize) -> BatchInput {
        BatchInput {
            portrait: Some("data:image/jpeg;base64,UE9SVA==".to_string()),
            products: (0..products)
                .map(|idx| format!("data:image/jpeg;base64,UFJPRA{idx}"))
                .collect(),
            style: StylePreset::Minimalist,
        }
    }

    #[test]
    fn full_batch_calls_every_pose_in_order() -> Result<()> {
        let provider = ScriptedProvider::new(&[]);
        let mut orchestrator = Orchestrator::new(provider.clone(), settings(), None);
        let mut observer = RecordingObserver::default();
        let outcome = orchestrator.run(&input(2), &mut observer, &CancelToken::new())?;

        assert_eq!(provider.calls(), POSES.to_vec());
        assert_eq!(outcome.results.len(), 10);
        assert_eq!(outcome.attempted, 10);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.progress, 1.0);
        assert_eq!(orchestrator.state(), BatchState::Idle);

        let distinct: HashSet<&str> = outcome.results.iter().map(|r| r.prompt.as_str()).collect();
        assert_eq!(distinct.len(), 10);
        for (idx, result) in outcome.results.iter().enumerate() {
            assert_eq!(result.pose_index, idx);
            assert!(result
                .prompt
                .starts_with("Minimalist Studio, clean background, soft lighting | "));
            assert!(result.prompt.ends_with(POSES[idx]));
            assert!(result.id.starts_with("gen-"));
            assert!(result.id.ends_with(&format!("-{idx}")));
        }
        for (idx, progress) in observer.progress.iter().enumerate() {
            assert_eq!(*progress, (idx + 1) as f64 / 10.0);
        }
        Ok(())
    }

    #[test]
    fn failed_poses_are_skipped_without_aborting() -> Result<()> {
        let provider = ScriptedProvider::new(&[3, 7]);
        let mut orchestrator = Orchestrator::new(provider.clone(), settings(), None);
        let mut observer = RecordingObserver::default();
        let outcome = orchestrator.run(&input(2), &mut observer, &CancelToken::new())?;

        assert_eq!(provider.calls().len(), 10);
        assert_eq!(outcome.results.len(), 8);
        assert_eq!(
            outcome.results.iter().map(|r| r.pose_index).collect::<Vec<_>>(),
            vec![0, 1, 2, 4, 5, 6, 8, 9]
        );
        assert_eq!(
            outcome.failures.iter().map(|f| f.pose_index).collect::<Vec<_>>(),
            vec![3, 7]
        );
        assert!(outcome.failures[0].error.contains("pose 4 generation failed"));
        assert!(outcome.failures[0].error.contains("no image generated in response"));
        assert_eq!(observer.failures, vec![3, 7]);
        assert_eq!(outcome.progress, 1.0);
        assert_eq!(observer.progress.len(), 10);
        assert_eq!(orchestrator.state(), BatchState::Idle);
        Ok(())
    }

    #[test]
    fn every_pose_failing_still_completes() -> Result<()> {
        let all: Vec<usize> = (0..10).collect();
        let provider = ScriptedProvider::new(&all);
        let mut orchestrator = Orchestrator::new(provider, settings(), None);
        let outcome = orchestrator.run(&input(1), &mut NoopObserver, &CancelToken::new())?;
        assert!(outcome.results.is_empty());
        assert_eq!(outcome.failures.len(), 10);
        assert_eq!(outcome.progress, 1.0);
        Ok(())
    }

    #[test]
    fn missing_inputs_refuse_to_start() {
        let provider = ScriptedProvider::new(&[]);
        let mut orchestrator = Orchestrator::new(provider.clone(), settings(), None);

        let mut no_portrait = input(1);
        no_portrait.portrait = None;
        let err = orchestrator
            .run(&no_portrait, &mut NoopObserver, &CancelToken::new())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<StudioError>(),
            Some(&StudioError::MissingPortrait)
        );

        let err = orchestrator
            .run(&input(0), &mut NoopObserver, &CancelToken::new())
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<StudioError>(),
            Some(&StudioError::MissingProducts)
        );
        assert!(provider.calls().is_empty());
        assert_eq!(orchestrator.state(), BatchState::Idle);
    }

    #[test]
    fn cancel_stops_before_next_pose() -> Result<()> {
        let provider = ScriptedProvider::new(&[]);
        let mut orchestrator = Orchestrator::new(provider.clone(), settings(), None);
        let cancel = CancelToken::new();
        let mut observer = RecordingObserver {
            cancel_after_results: Some((4, cancel.clone())),
            ..RecordingObserver::default()
        };
        let outcome = orchestrator.run(&input(1), &mut observer, &cancel)?;
        assert!(outcome.cancelled);
        assert_eq!(outcome.results.len(), 4);
        assert_eq!(provider.calls().len(), 4);
        assert_eq!(outcome.progress, 0.4);
        assert_eq!(orchestrator.state(), BatchState::Idle);
        Ok(())
    }

    #[test]
    fn observer_error_ends_batch_and_resets_state() {
        struct Exploding(usize);
        impl BatchObserver for Exploding {
            fn on_result(&mut self, _result: &GeneratedResult, _progress: f64) -> Result<()> {
                self.0 += 1;
                if self.0 == 2 {
                    bail!("disk full");
                }
                Ok(())
            }
        }

        let provider = ScriptedProvider::new(&[]);
        let mut orchestrator = Orchestrator::new(provider.clone(), settings(), None);
        let err = orchestrator
            .run(&input(1), &mut Exploding(0), &CancelToken::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert_eq!(provider.calls().len(), 2);
        assert_eq!(orchestrator.state(), BatchState::Idle);
    }

    #[test]
    fn batch_events_are_logged_in_order() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let events = EventWriter::new(&path, "session-1");
        let provider = ScriptedProvider::new(&[1]);
        let mut orchestrator = Orchestrator::new(provider, settings(), Some(events));
        orchestrator.run(&input(1), &mut NoopObserver, &CancelToken::new())?;

        let types = read_event_types(&path)?;
        assert_eq!(types.first().map(String::as_str), Some("batch_started"));
        assert_eq!(types.last().map(String::as_str), Some("batch_finished"));
        assert_eq!(types.iter().filter(|t| *t == "pose_started").count(), 10);
        assert_eq!(types.iter().filter(|t| *t == "result_created").count(), 9);
        assert_eq!(types.iter().filter(|t| *t == "progress_update").count(), 10);
        let failed = types
            .iter()
            .position(|t| t == "generation_failed")
            .expect("missing generation_failed");
        assert_eq!(types[failed - 1], "pose_started");
        Ok(())
    }
}
