use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::errors::{ClassifyError, Result};
use crate::model::{FallbackModel, ModelSource, OnnxModel, RuntimeOptions};
use crate::taxonomy::verify_taxonomy;
use crate::traits::WasteClassificationModel;

/// Builds a model from its source. Swappable for tests and other runtimes.
pub type ModelFactory =
    dyn Fn(&ModelSource) -> Result<Arc<dyn WasteClassificationModel>> + Send + Sync;

/// A loaded model, or the fallback that stands in for it.
#[derive(Clone)]
pub enum ModelHandle {
    Ready(Arc<dyn WasteClassificationModel>),
    Degraded {
        model: FallbackModel,
        reason: Arc<str>,
    },
}

impl ModelHandle {
    pub fn degraded(reason: impl Into<Arc<str>>) -> Self {
        Self::Degraded {
            model: FallbackModel,
            reason: reason.into(),
        }
    }

    pub fn model(&self) -> &dyn WasteClassificationModel {
        match self {
            Self::Ready(model) => model.as_ref(),
            Self::Degraded { model, .. } => model,
        }
    }

    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn degraded_reason(&self) -> Option<&str> {
        match self {
            Self::Ready(_) => None,
            Self::Degraded { reason, .. } => Some(&**reason),
        }
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(model) => f
                .debug_struct("Ready")
                .field("input_size", &model.input_size())
                .field("num_classes", &model.num_classes())
                .finish(),
            Self::Degraded { reason, .. } => {
                f.debug_struct("Degraded").field("reason", reason).finish()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    FailedFallback,
}

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// How many times a caller re-checks an in-flight load before giving up.
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    /// When false, no real load is attempted and every caller gets the fallback.
    pub inference_enabled: bool,
    pub runtime: RuntimeOptions,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            poll_attempts: 50,
            poll_interval: Duration::from_millis(100),
            inference_enabled: true,
            runtime: RuntimeOptions::default(),
        }
    }
}

struct Slot {
    state: LoadState,
    handle: Option<ModelHandle>,
}

/// Loads the classification model once and hands the same handle to every caller.
///
/// Construct one per process and share it (`Arc<ModelLoader>`). Concurrent
/// callers arriving while a load is in flight wait for it instead of starting
/// their own.
pub struct ModelLoader {
    source: ModelSource,
    config: LoaderConfig,
    factory: Box<ModelFactory>,
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl ModelLoader {
    /// Loader backed by ONNX Runtime.
    pub fn new(source: ModelSource, config: LoaderConfig) -> Self {
        let runtime = config.runtime;
        Self::with_factory(source, config, move |source: &ModelSource| {
            let model = OnnxModel::load(source, runtime)?;
            Ok(Arc::new(model) as Arc<dyn WasteClassificationModel>)
        })
    }

    pub fn with_factory<F>(source: ModelSource, config: LoaderConfig, factory: F) -> Self
    where
        F: Fn(&ModelSource) -> Result<Arc<dyn WasteClassificationModel>> + Send + Sync + 'static,
    {
        Self {
            source,
            config,
            factory: Box::new(factory),
            slot: Mutex::new(Slot {
                state: LoadState::Unloaded,
                handle: None,
            }),
            ready: Condvar::new(),
        }
    }

    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    pub fn state(&self) -> LoadState {
        self.slot.lock().state
    }

    /// The cached handle, without triggering a load.
    pub fn current(&self) -> Option<ModelHandle> {
        self.slot.lock().handle.clone()
    }

    /// Returns the model handle, loading it on first use.
    ///
    /// Load failures never surface here: they produce a degraded handle. The
    /// only error is [`ClassifyError::LoadTimeout`], raised when another
    /// caller's load does not finish within the polling budget.
    pub fn load(&self) -> Result<ModelHandle> {
        let mut slot = self.slot.lock();
        if let Some(handle) = &slot.handle {
            return Ok(handle.clone());
        }

        if slot.state == LoadState::Loading {
            debug!("model load already in flight, waiting");
            for _ in 0..self.config.poll_attempts {
                self.ready.wait_for(&mut slot, self.config.poll_interval);
                if let Some(handle) = &slot.handle {
                    return Ok(handle.clone());
                }
                if slot.state == LoadState::Unloaded {
                    break;
                }
            }
            if slot.state == LoadState::Loading {
                error!(attempts = self.config.poll_attempts, "timed out waiting for model load");
                return Err(ClassifyError::LoadTimeout {
                    attempts: self.config.poll_attempts,
                });
            }
        }

        slot.state = LoadState::Loading;
        drop(slot);

        let _in_flight = InFlight { loader: self };
        let handle = self.build_handle();

        let mut slot = self.slot.lock();
        slot.state = if handle.is_degraded() {
            LoadState::FailedFallback
        } else {
            LoadState::Ready
        };
        slot.handle = Some(handle.clone());
        self.ready.notify_all();
        Ok(handle)
    }

    fn build_handle(&self) -> ModelHandle {
        if !self.config.inference_enabled {
            info!("inference runtime disabled, using fallback model");
            return ModelHandle::degraded("inference runtime unavailable");
        }

        match (self.factory)(&self.source) {
            Ok(model) => {
                if let Err(e) = verify_taxonomy(model.num_classes()) {
                    error!(error = %e, "model taxonomy does not match recommendation table");
                }
                info!(
                    source = %self.source,
                    input_size = model.input_size(),
                    num_classes = model.num_classes(),
                    "model loaded"
                );
                ModelHandle::Ready(model)
            }
            Err(e) => {
                warn!(source = %self.source, error = %e, "model load failed, using fallback model");
                ModelHandle::degraded(e.to_string())
            }
        }
    }
}

/// Resets an abandoned load (the factory panicked) so waiters can take over.
struct InFlight<'a> {
    loader: &'a ModelLoader,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut slot = self.loader.slot.lock();
        if slot.state == LoadState::Loading && slot.handle.is_none() {
            slot.state = LoadState::Unloaded;
            self.loader.ready.notify_all();
        }
    }
}
