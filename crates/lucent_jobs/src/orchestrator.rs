//! The job orchestrator: submission, the job table, and the single worker.
//!
//! `JobService` accepts jobs without blocking, hands them to one background
//! worker thread over a channel, and exposes snapshot reads of the job table.
//! A fingerprint hit at submission time completes the job synchronously from
//! the result cache. Worker-side failures mark the single job `Failed` and
//! keep the loop alive.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use burn::tensor::activation::softmax;
use burn::tensor::backend::AutodiffBackend;
use parking_lot::Mutex;
use uuid::Uuid;

use lucent_core::{ExplainError, Result, Settings};
use lucent_explain::{capture, feature_maps, gradcam, AssetStore, GradcamReport};
use lucent_models::{preprocess, ClassLabels, ModelCache, ModelRegistry};

use crate::fingerprint::{fingerprint, FingerprintInput};
use crate::job::{ClassScore, ExplainParams, JobRecord, JobResult, JobStatus, Timings};
use crate::result_cache::ResultCache;

/// Input staged at submission, consumed exactly once by the worker.
struct StagedJob {
    model_id: String,
    image: Vec<u8>,
    params: ExplainParams,
    cam_layers: Vec<String>,
    fingerprint: String,
}

enum WorkerMsg {
    Job(String),
    Shutdown,
}

type JobTable = Mutex<HashMap<String, JobRecord>>;

/// Asynchronous explanation-job service with a single background worker.
pub struct JobService<B: AutodiffBackend> {
    jobs: Arc<JobTable>,
    staged: Arc<Mutex<HashMap<String, StagedJob>>>,
    results: Arc<ResultCache>,
    registry: Arc<ModelRegistry<B>>,
    sender: Sender<WorkerMsg>,
    ack: Receiver<()>,
    worker: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
}

impl<B: AutodiffBackend> JobService<B> {
    /// Start the service and its worker thread.
    pub fn new(
        settings: &Settings,
        registry: Arc<ModelRegistry<B>>,
        device: B::Device,
    ) -> Result<Self> {
        let store = AssetStore::new(&settings.storage_dir)?;
        let labels = match &settings.labels_path {
            Some(path) => ClassLabels::from_json_file(path).unwrap_or_else(|err| {
                tracing::warn!(%err, "label file unavailable, using synthetic names");
                ClassLabels::empty()
            }),
            None => ClassLabels::empty(),
        };

        let jobs: Arc<JobTable> = Arc::new(Mutex::new(HashMap::new()));
        let staged = Arc::new(Mutex::new(HashMap::new()));
        let results = Arc::new(ResultCache::new(settings.result_cache_capacity));

        let (sender, receiver) = mpsc::channel();
        let (ack_tx, ack_rx) = mpsc::channel();

        let worker = Worker {
            jobs: jobs.clone(),
            staged: staged.clone(),
            results: results.clone(),
            registry: registry.clone(),
            models: ModelCache::new(
                registry.clone(),
                device.clone(),
                settings.model_cache_capacity(),
            ),
            device,
            store,
            labels,
        };
        let handle = std::thread::Builder::new()
            .name("lucent-worker".to_string())
            .spawn(move || worker.run(receiver, ack_tx))
            .map_err(ExplainError::Io)?;

        Ok(Self {
            jobs,
            staged,
            results,
            registry,
            sender,
            ack: ack_rx,
            worker: Some(handle),
            shutdown_timeout: settings.shutdown_timeout(),
        })
    }

    /// Submit an explanation job. Returns the job id without blocking on the
    /// worker; a result-cache hit completes the job synchronously.
    pub fn submit(&self, model_id: &str, image: Vec<u8>, params: ExplainParams) -> Result<String> {
        params.validate()?;
        let config = self
            .registry
            .get_config(model_id)
            .ok_or_else(|| ExplainError::ModelUnavailable(model_id.to_string()))?;

        let cam_layers = params
            .cam_layers
            .clone()
            .unwrap_or_else(|| config.default_cam_layers());
        let key = fingerprint(&FingerprintInput {
            image: &image,
            model_id,
            prediction_top_k: prediction_top_k(params.top_k, config.n_classes),
            explain_top_k: params.top_k,
            layers: &cam_layers,
            include_gradcam: params.include_gradcam,
            feature_map_limit: params.feature_map_limit,
        });

        let id = Uuid::new_v4().to_string();
        let mut record = JobRecord::queued(id.clone(), model_id.to_string());

        if let Some(result) = self.results.get(&key) {
            tracing::info!(job = %id, model_id, "result cache hit, completing synchronously");
            record.status = JobStatus::Succeeded;
            record.progress = 100;
            record.message = Some("served from result cache".to_string());
            record.result = Some(result);
            self.jobs.lock().insert(id.clone(), record);
            return Ok(id);
        }

        self.jobs.lock().insert(id.clone(), record);
        self.staged.lock().insert(
            id.clone(),
            StagedJob {
                model_id: model_id.to_string(),
                image,
                params,
                cam_layers,
                fingerprint: key,
            },
        );
        self.sender
            .send(WorkerMsg::Job(id.clone()))
            .map_err(|_| ExplainError::Internal("worker is not running".to_string()))?;
        tracing::info!(job = %id, model_id, "job queued");
        Ok(id)
    }

    /// Snapshot of one job.
    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.lock().get(job_id).cloned()
    }

    /// Snapshot of all jobs, newest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.jobs.lock().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records
    }

    /// Poll a job until it reaches a terminal state or `timeout` elapses.
    /// Returns the last snapshot either way; `None` for unknown ids.
    pub fn wait(&self, job_id: &str, timeout: Duration) -> Option<JobRecord> {
        let deadline = Instant::now() + timeout;
        loop {
            let record = self.get(job_id)?;
            if record.status.is_terminal() || Instant::now() >= deadline {
                return Some(record);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Stop the worker: enqueue the sentinel, wait a bounded interval for the
    /// acknowledgement, abandon the thread if it never comes.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        let _ = self.sender.send(WorkerMsg::Shutdown);
        match self.ack.recv_timeout(self.shutdown_timeout) {
            Ok(()) => {
                let _ = handle.join();
                tracing::info!("worker stopped");
            }
            Err(_) => {
                tracing::warn!("worker did not acknowledge shutdown in time, abandoning");
            }
        }
    }
}

impl<B: AutodiffBackend> Drop for JobService<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Prediction list size: at least 5 entries when the head allows it, never
/// fewer than the requested explanation top-k.
fn prediction_top_k(requested: usize, n_classes: usize) -> usize {
    requested.max(5).min(n_classes)
}

fn update_job(jobs: &JobTable, job_id: &str, apply: impl FnOnce(&mut JobRecord)) {
    if let Some(record) = jobs.lock().get_mut(job_id) {
        apply(record);
    }
}

fn progress(jobs: &JobTable, job_id: &str, percent: u8, message: &str) {
    tracing::debug!(job = %job_id, percent, message, "progress");
    update_job(jobs, job_id, |record| {
        record.progress = percent;
        record.message = Some(message.to_string());
    });
}

struct Worker<B: AutodiffBackend> {
    jobs: Arc<JobTable>,
    staged: Arc<Mutex<HashMap<String, StagedJob>>>,
    results: Arc<ResultCache>,
    registry: Arc<ModelRegistry<B>>,
    models: ModelCache<B>,
    device: B::Device,
    store: AssetStore,
    labels: ClassLabels,
}

impl<B: AutodiffBackend> Worker<B> {
    fn run(mut self, receiver: Receiver<WorkerMsg>, ack: Sender<()>) {
        while let Ok(msg) = receiver.recv() {
            let job_id = match msg {
                WorkerMsg::Shutdown => break,
                WorkerMsg::Job(id) => id,
            };
            // Staged input is consumed exactly once, success or not.
            let Some(staged) = self.staged.lock().remove(&job_id) else {
                tracing::warn!(job = %job_id, "job has no staged input, skipping");
                continue;
            };
            match self.process(&job_id, staged) {
                Ok(result) => {
                    update_job(&self.jobs, &job_id, |record| {
                        record.status = JobStatus::Succeeded;
                        record.progress = 100;
                        record.message = None;
                        record.result = Some(result);
                    });
                    tracing::info!(job = %job_id, "job succeeded");
                }
                Err(err) => {
                    tracing::error!(job = %job_id, %err, "job failed");
                    update_job(&self.jobs, &job_id, |record| {
                        record.status = JobStatus::Failed;
                        record.message = Some(err.to_string());
                    });
                }
            }
        }
        let _ = ack.send(());
    }

    fn process(&mut self, job_id: &str, staged: StagedJob) -> Result<JobResult> {
        let total_start = Instant::now();
        update_job(&self.jobs, job_id, |record| {
            record.status = JobStatus::Running;
            record.progress = 0;
            record.message = Some("starting".to_string());
        });

        let config = self
            .registry
            .get_config(&staged.model_id)
            .cloned()
            .ok_or_else(|| ExplainError::ModelUnavailable(staged.model_id.clone()))?;
        let device = self.device.clone();
        let model = self.models.get_or_load(&staged.model_id)?;
        progress(&self.jobs, job_id, 10, "model ready");

        let preprocess_start = Instant::now();
        let (input, cropped) = preprocess::prepare_input::<B>(&staged.image, &config, &device)?;
        let input_asset = self.store.save_rgb(&format!("{job_id}/input.png"), &cropped)?;
        let preprocess_ms = preprocess_start.elapsed().as_millis() as u64;
        progress(&self.jobs, job_id, 20, "preprocessed");

        let forward_start = Instant::now();
        let resolved = capture::resolve_layers(&config.layers_to_hook, model)?;
        let mut warnings = resolved.warnings.clone();
        let outcome = capture::run_capture(model, input.clone(), &resolved.layers)?;

        let probabilities: Vec<f32> = softmax(outcome.logits.clone(), 1)
            .inner()
            .into_data()
            .to_vec()
            .map_err(|e| ExplainError::Internal(format!("probability readback failed: {e:?}")))?;
        let mut ranked: Vec<usize> = (0..probabilities.len()).collect();
        ranked.sort_by(|&a, &b| {
            probabilities[b]
                .partial_cmp(&probabilities[a])
                .unwrap_or(Ordering::Equal)
        });
        let topk: Vec<ClassScore> = ranked
            .iter()
            .take(prediction_top_k(staged.params.top_k, model.n_classes()))
            .map(|&class_id| ClassScore {
                class_id,
                label: self.labels.name(class_id),
                probability: probabilities[class_id],
            })
            .collect();
        let forward_ms = forward_start.elapsed().as_millis() as u64;
        progress(&self.jobs, job_id, 40, "prediction ready");

        let serialize_start = Instant::now();
        let mut layers = Vec::new();
        for path in &resolved.layers {
            let name = path.canonical();
            let Some(tap) = outcome.taps.get(&name) else {
                continue;
            };
            match feature_maps::extract_layer(
                tap,
                &name,
                config.stage(&name),
                staged.params.feature_map_limit,
                &self.store,
                job_id,
            ) {
                Ok(Some(report)) => layers.push(report),
                Ok(None) => {}
                // A broken layer degrades to a warning; the rest still render.
                Err(err) => {
                    tracing::warn!(job = %job_id, layer = %name, %err, "feature maps failed");
                    warnings.push(format!("layer '{name}': {err}"));
                }
            }
        }
        progress(&self.jobs, job_id, 60, "feature maps rendered");

        let mut gradcam_report = GradcamReport::default();
        if staged.params.include_gradcam {
            let cam_resolved = capture::resolve_layers(&staged.cam_layers, model)?;
            warnings.extend(cam_resolved.warnings.iter().cloned());
            let layer_order: Vec<String> =
                cam_resolved.layers.iter().map(|p| p.canonical()).collect();
            let legacy_layer = layer_order.last().cloned();

            for score in topk.iter().take(staged.params.top_k) {
                let class_id = score.class_id;
                match capture::class_capture(
                    model,
                    input.clone(),
                    &cam_resolved.layers,
                    class_id,
                ) {
                    Ok(class_capture) => gradcam::render_class(
                        &class_capture,
                        &layer_order,
                        class_id,
                        &cropped,
                        legacy_layer.as_deref(),
                        &self.store,
                        job_id,
                        &mut gradcam_report,
                    ),
                    // A broken class degrades to a warning as well.
                    Err(err) => {
                        tracing::warn!(job = %job_id, class_id, %err, "class capture failed");
                        gradcam_report
                            .warnings
                            .push(format!("class {class_id}: {err}"));
                    }
                }
            }
        }
        progress(&self.jobs, job_id, 80, "overlays rendered");

        let serialize_ms = serialize_start.elapsed().as_millis() as u64;
        let result = JobResult {
            topk,
            layers,
            gradcam: gradcam_report,
            input_asset,
            warnings,
            timings: Timings {
                preprocess_ms,
                forward_ms,
                serialize_ms,
                total_ms: total_start.elapsed().as_millis() as u64,
            },
        };
        self.results.put(staged.fingerprint, result.clone());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use lucent_core::backend::Inspect;
    use lucent_models::zoo::ResNetMiniConfig;
    use lucent_models::{ModelConfig, Normalization};

    fn tiny_registry() -> Arc<ModelRegistry<Inspect>> {
        let mut registry = ModelRegistry::new();
        registry.register(
            ModelConfig {
                id: "tiny".to_string(),
                display_name: "Tiny".to_string(),
                input_size: [32, 32],
                normalization: Normalization {
                    mean: [0.5; 3],
                    std: [0.5; 3],
                },
                layers_to_hook: vec![
                    "conv1".to_string(),
                    "layer1".to_string(),
                    "layer2".to_string(),
                ],
                layer_stages: [("conv1".to_string(), "stem".to_string())]
                    .into_iter()
                    .collect(),
                n_classes: 6,
            },
            |device| {
                Box::new(
                    ResNetMiniConfig::new()
                        .with_n_classes(6)
                        .with_width(2)
                        .init::<Inspect>(device),
                )
            },
        );
        Arc::new(registry)
    }

    fn service(dir: &tempfile::TempDir) -> JobService<Inspect> {
        let settings = Settings {
            storage_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        JobService::new(&settings, tiny_registry(), Default::default()).unwrap()
    }

    fn gray_png(size: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(size, size, Rgb([128, 128, 128]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut bytes),
                image::ImageFormat::Png,
            )
            .unwrap();
        bytes
    }

    #[test]
    fn test_submit_rejects_invalid_params() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        let params = ExplainParams {
            top_k: 0,
            ..Default::default()
        };
        assert!(matches!(
            service.submit("tiny", gray_png(32), params),
            Err(ExplainError::Validation(_))
        ));
    }

    #[test]
    fn test_submit_rejects_unknown_model() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        assert!(matches!(
            service.submit("nope", gray_png(32), ExplainParams::default()),
            Err(ExplainError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_decode_failure_marks_job_failed() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        let id = service
            .submit("tiny", b"not an image".to_vec(), ExplainParams::default())
            .unwrap();
        let record = service.wait(&id, Duration::from_secs(30)).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.message.is_some());
    }

    #[test]
    fn test_end_to_end_job() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        let params = ExplainParams {
            top_k: 2,
            ..Default::default()
        };
        let id = service.submit("tiny", gray_png(32), params).unwrap();

        let record = service.wait(&id, Duration::from_secs(120)).unwrap();
        assert_eq!(record.status, JobStatus::Succeeded);
        assert_eq!(record.progress, 100);

        let result = record.result.unwrap();
        // 6 classes, request 2 -> prediction list still shows 5.
        assert_eq!(result.topk.len(), 5);
        assert!(!result.layers.is_empty());
        assert!(result.layers.iter().all(|l| !l.top_channels.is_empty()));
        assert!(!result.gradcam.overlays.is_empty());
        assert!(!result.gradcam.legacy_cams.is_empty());

        let store = AssetStore::new(dir.path()).unwrap();
        for layer in &result.layers {
            for channel in &layer.top_channels {
                let file = store.resolve(&channel.asset.path);
                assert!(file.is_file(), "missing {}", channel.asset.path);
                assert!(std::fs::metadata(file).unwrap().len() > 0);
            }
        }
        for overlay in result
            .gradcam
            .overlays
            .iter()
            .chain(result.gradcam.legacy_cams.iter())
        {
            assert!(store.resolve(&overlay.asset.path).is_file());
        }
    }

    #[test]
    fn test_resubmission_is_synchronous_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        let image = gray_png(32);

        let first = service
            .submit("tiny", image.clone(), ExplainParams::default())
            .unwrap();
        let first_record = service.wait(&first, Duration::from_secs(120)).unwrap();
        assert_eq!(first_record.status, JobStatus::Succeeded);

        // Identical submission completes without touching the worker.
        let second = service.submit("tiny", image, ExplainParams::default()).unwrap();
        let second_record = service.get(&second).unwrap();
        assert_eq!(second_record.status, JobStatus::Succeeded);
        assert_eq!(second_record.progress, 100);

        let a = serde_json::to_string(&first_record.result).unwrap();
        let b = serde_json::to_string(&second_record.result).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unresolvable_layer_is_warning_not_failure() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        let params = ExplainParams {
            top_k: 1,
            cam_layers: Some(vec!["layer2".to_string(), "bogus".to_string()]),
            ..Default::default()
        };
        let id = service.submit("tiny", gray_png(32), params).unwrap();

        let record = service.wait(&id, Duration::from_secs(120)).unwrap();
        assert_eq!(record.status, JobStatus::Succeeded);
        let result = record.result.unwrap();
        assert!(result.warnings.iter().any(|w| w.contains("bogus")));
        assert!(!result.gradcam.overlays.is_empty());
    }

    #[test]
    fn test_staged_input_cleaned_up_after_processing() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(&dir);
        let id = service
            .submit("tiny", b"junk".to_vec(), ExplainParams::default())
            .unwrap();
        let _ = service.wait(&id, Duration::from_secs(30)).unwrap();
        assert!(service.staged.lock().is_empty());
    }
}
