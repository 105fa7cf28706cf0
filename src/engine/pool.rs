//! Model pool
//!
//! Compiles the detector and landmarker models lazily on first use and
//! unloads whichever has sat idle past the configured timeout, so a quiet
//! service holds no model memory.

use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use openvino::{CompiledModel, Core};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::config::InferenceConfig;

/// OpenVINO `Core` usable across threads
///
/// The C++ runtime is thread-safe; the Rust bindings just leave the handle
/// without Send + Sync.
pub struct SafeCore(Core);
unsafe impl Send for SafeCore {}
unsafe impl Sync for SafeCore {}

impl Deref for SafeCore {
    type Target = Core;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for SafeCore {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Shared compiled-model handle usable across threads
#[derive(Clone)]
pub struct SafeCompiledModel(pub Arc<CompiledModel>);
unsafe impl Send for SafeCompiledModel {}
unsafe impl Sync for SafeCompiledModel {}

impl SafeCompiledModel {
    /// Create an inference request
    ///
    /// `create_infer_request` takes `&mut self` in the bindings even though
    /// the underlying call is thread-safe, so go through the raw pointer.
    pub fn create_infer_request(&self) -> Result<openvino::InferRequest> {
        unsafe {
            let ptr = Arc::as_ptr(&self.0) as *mut CompiledModel;
            (*ptr).create_infer_request().map_err(|e| e.into())
        }
    }
}

/// A compiled model plus when it was last fetched
struct LoadedModel {
    compiled: SafeCompiledModel,
    last_used: Instant,
}

/// The two models the pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    Detector,
    Landmarker,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Detector => "detector",
            ModelType::Landmarker => "landmarker",
        }
    }
}

/// One pool slot: where the model lives on disk and, once compiled, the
/// cached handle
struct ModelSlot {
    model_type: ModelType,
    path: String,
    cache: RwLock<Option<LoadedModel>>,
}

impl ModelSlot {
    fn new(model_type: ModelType, path: &str) -> Self {
        Self {
            model_type,
            path: path.to_string(),
            cache: RwLock::new(None),
        }
    }

    /// Refresh the access time and clone the handle if the model is resident
    fn fetch(&self) -> Option<SafeCompiledModel> {
        if self.cache.read().is_none() {
            return None;
        }

        let mut guard = self.cache.write();
        guard.as_mut().map(|loaded| {
            loaded.last_used = Instant::now();
            loaded.compiled.clone()
        })
    }

    fn idle_longer_than(&self, timeout: Duration) -> bool {
        self.cache
            .read()
            .as_ref()
            .map(|loaded| loaded.last_used.elapsed() > timeout)
            .unwrap_or(false)
    }

    fn unload(&self) {
        let mut guard = self.cache.write();
        if guard.take().is_some() {
            info!("Unloading idle model: {}", self.model_type.as_str());
        }
    }
}

/// Lazy-loading model pool with idle auto-unload
pub struct ModelPool {
    core: Arc<RwLock<SafeCore>>,
    device: String,
    idle_timeout: Duration,
    slots: [ModelSlot; 2],
    shutdown: Notify,
}

impl ModelPool {
    /// Create a pool over the configured inference device
    pub fn new(
        config: &InferenceConfig,
        detector_path: &str,
        landmarker_path: &str,
    ) -> Result<Self> {
        let core = Core::new()?;

        Ok(Self {
            core: Arc::new(RwLock::new(SafeCore(core))),
            device: config.device.clone(),
            idle_timeout: Duration::from_secs(config.model_idle_timeout),
            slots: [
                ModelSlot::new(ModelType::Detector, detector_path),
                ModelSlot::new(ModelType::Landmarker, landmarker_path),
            ],
            shutdown: Notify::new(),
        })
    }

    fn slot(&self, model_type: ModelType) -> &ModelSlot {
        match model_type {
            ModelType::Detector => &self.slots[0],
            ModelType::Landmarker => &self.slots[1],
        }
    }

    /// Fetch a compiled model, loading it on first use
    pub fn get_model(&self, model_type: ModelType) -> Result<SafeCompiledModel> {
        let slot = self.slot(model_type);

        // Fast path: model already resident
        if let Some(compiled) = slot.fetch() {
            return Ok(compiled);
        }

        let mut cache = slot.cache.write();

        // Another caller may have loaded it while we waited on the lock
        if let Some(ref mut loaded) = *cache {
            loaded.last_used = Instant::now();
            return Ok(loaded.compiled.clone());
        }

        info!("Loading model: {} from {}", model_type.as_str(), slot.path);
        let start = Instant::now();

        // Core methods take &mut self in the bindings
        let mut core = self.core.write();
        let model = core.read_model_from_file(&slot.path, "")?;
        let compiled = SafeCompiledModel(Arc::new(
            core.compile_model(&model, self.device.as_str().into())?,
        ));

        info!("Model {} loaded in {:?}", model_type.as_str(), start.elapsed());

        *cache = Some(LoadedModel {
            compiled: compiled.clone(),
            last_used: Instant::now(),
        });

        Ok(compiled)
    }

    /// Loaded flag per model, for health and metrics
    pub fn get_status(&self) -> Vec<(ModelType, bool)> {
        self.slots
            .iter()
            .map(|slot| (slot.model_type, slot.cache.read().is_some()))
            .collect()
    }

    fn cleanup_idle_models(&self) {
        for slot in &self.slots {
            if slot.idle_longer_than(self.idle_timeout) {
                slot.unload();
            }
        }
    }

    /// Run the idle sweep until shutdown is signalled
    pub async fn start_cleanup_task(self: Arc<Self>) {
        let check_interval = Duration::from_secs(60);

        loop {
            tokio::select! {
                _ = tokio::time::sleep(check_interval) => {
                    debug!("Running model cleanup check");
                    self.cleanup_idle_models();
                }
                _ = self.shutdown.notified() => {
                    info!("Model pool cleanup task shutting down");
                    break;
                }
            }
        }
    }

    /// Signal the cleanup task to stop
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

impl Drop for ModelPool {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_as_str() {
        assert_eq!(ModelType::Detector.as_str(), "detector");
        assert_eq!(ModelType::Landmarker.as_str(), "landmarker");
    }
}
