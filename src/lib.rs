pub mod batch;
pub mod config;
pub mod errors;
pub mod input;
pub mod loader;
pub mod mapper;
pub mod model;
pub mod predictor;
pub mod preprocess;
pub mod service;
pub mod taxonomy;
pub mod tensor;
pub mod traits;

pub mod mocks;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;

use image::DynamicImage;
use serde::Serialize;
use tracing::{debug, error, info, warn};

pub use config::{ClassifierConfig, Config};
pub use errors::{ClassifyError, InputError, Result};
pub use input::ImageInput;
pub use loader::{LoadState, LoaderConfig, ModelHandle, ModelLoader};
pub use mapper::{fallback_result, map_to_result, ClassificationResult, ResultSource, TopResult};
pub use model::{FallbackModel, ModelSource, OnnxModel, RuntimeOptions};
pub use service::ClassificationService;
pub use taxonomy::{Locale, Method, WasteClass};
pub use tensor::TensorLedger;
pub use traits::*;

#[cfg(test)]
pub use mocks::*;

use errors::error_chain;
use mapper::RecommendationMapper;

/// Number of ranked alternatives attached to each result.
pub const TOP_RESULTS: usize = 3;

/// Snapshot of the loader for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub state: LoadState,
    pub degraded: bool,
    pub degraded_reason: Option<String>,
    pub input_size: Option<u32>,
    pub num_classes: Option<usize>,
    pub class_keys: Vec<&'static str>,
}

/// Runs the whole pipeline: validate, load, preprocess, predict, map.
///
/// Bad input is the only thing reported as an error. Every failure after the
/// image is accepted turns into [`fallback_result`], so callers always get
/// something to show.
pub struct Classifier {
    loader: Arc<ModelLoader>,
    config: ClassifierConfig,
    mapper: RecommendationMapper,
    ledger: Arc<TensorLedger>,
}

impl Classifier {
    pub fn new(loader: Arc<ModelLoader>, config: ClassifierConfig) -> Self {
        let mapper = RecommendationMapper::new(config.low_confidence_threshold);
        Self {
            loader,
            config,
            mapper,
            ledger: TensorLedger::new(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn loader(&self) -> &Arc<ModelLoader> {
        &self.loader
    }

    /// Tensor accounting for everything this classifier allocated.
    pub fn ledger(&self) -> &Arc<TensorLedger> {
        &self.ledger
    }

    pub fn classify(&self, input: &ImageInput, locale: Locale) -> Result<ClassificationResult> {
        input.validate(self.config.max_file_size)?;
        let image = input.decode()?;
        debug!(
            mime = input.mime(),
            size = input.size(),
            width = image.width(),
            height = image.height(),
            "image accepted"
        );
        Ok(self.classify_image(&image, locale))
    }

    pub fn classify_bytes(
        &self,
        bytes: impl Into<Vec<u8>>,
        mime: &str,
        locale: Locale,
    ) -> Result<ClassificationResult> {
        self.classify(&ImageInput::from_bytes(bytes, mime), locale)
    }

    pub fn classify_data_url(&self, data_url: &str, locale: Locale) -> Result<ClassificationResult> {
        let input = ImageInput::from_data_url(data_url, self.config.max_file_size)?;
        self.classify(&input, locale)
    }

    pub fn classify_path(&self, path: &Path, locale: Locale) -> Result<ClassificationResult> {
        let input = ImageInput::from_path(path)?;
        self.classify(&input, locale)
    }

    /// Classifies an already decoded image. Never fails, even when the model
    /// or its loader panics.
    pub fn classify_image(&self, image: &DynamicImage, locale: Locale) -> ClassificationResult {
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_pipeline(image, locale))) {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(error = %error_chain(&e), "classification failed, returning fallback result");
                fallback_result(locale)
            }
            Err(payload) => {
                error!(
                    panic = panic_message(payload.as_ref()),
                    "classification panicked, returning fallback result"
                );
                fallback_result(locale)
            }
        }
    }

    fn run_pipeline(&self, image: &DynamicImage, locale: Locale) -> Result<ClassificationResult> {
        let handle = self.loader.load()?;
        let model = handle.model();

        let tensor = preprocess::preprocess(image, model.input_size(), &self.ledger)?;
        let prediction = predictor::predict(model, tensor)?;

        let mut result = self
            .mapper
            .map(prediction.class_index, prediction.confidence, locale);
        result.top_results = predictor::top_k(&prediction.probabilities, TOP_RESULTS)
            .into_iter()
            .map(|(class_index, score)| TopResult {
                class: WasteClass::from_index(class_index),
                class_index,
                confidence: predictor::confidence_percent(score),
            })
            .collect();
        result.probabilities = prediction.probabilities;
        if handle.is_degraded() && result.source == ResultSource::Model {
            result.source = ResultSource::DegradedModel;
        }
        Ok(result)
    }

    /// Loads the model ahead of the first request. Returns whether the real
    /// model is in use; failures are logged, not raised.
    pub fn preload(&self) -> bool {
        match self.loader.load() {
            Ok(handle) if !handle.is_degraded() => {
                info!("model preloaded");
                true
            }
            Ok(handle) => {
                warn!(
                    reason = handle.degraded_reason().unwrap_or_default(),
                    "model preload fell back"
                );
                false
            }
            Err(e) => {
                warn!(error = %e, "model preload failed");
                false
            }
        }
    }

    pub fn model_info(&self) -> ModelInfo {
        let handle = self.loader.current();
        ModelInfo {
            state: self.loader.state(),
            degraded: handle.as_ref().is_some_and(ModelHandle::is_degraded),
            degraded_reason: handle
                .as_ref()
                .and_then(|h| h.degraded_reason().map(str::to_string)),
            input_size: handle.as_ref().map(|h| h.model().input_size()),
            num_classes: handle.as_ref().map(|h| h.model().num_classes()),
            class_keys: WasteClass::ALL.iter().map(|c| c.key()).collect(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use std::thread;
    use std::time::Duration;

    fn mock_classifier(model: MockClassificationModel) -> Classifier {
        let model: Arc<dyn WasteClassificationModel> = Arc::new(model);
        let loader = ModelLoader::with_factory(
            ModelSource::Local("mock.onnx".into()),
            LoaderConfig::default(),
            move |_| Ok(Arc::clone(&model)),
        );
        Classifier::new(Arc::new(loader), ClassifierConfig::default())
    }

    fn jpeg_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 30, Rgb([150, 110, 70])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_classify_with_mock() -> Result<()> {
        let classifier = mock_classifier(MockClassificationModel::new(32));
        let result = classifier.classify_bytes(jpeg_bytes(), "image/jpeg", Locale::Id)?;

        assert_eq!(result.predicted_class, Some(WasteClass::Cardboard));
        assert_eq!(result.method, Method::Recycle);
        assert_eq!(result.confidence, 80);
        assert_eq!(result.source, ResultSource::Model);
        assert_eq!(result.probabilities.len(), WasteClass::COUNT);
        assert_eq!(classifier.ledger().live(), 0);
        Ok(())
    }

    #[test]
    fn test_validation_happens_before_load() {
        let classifier = mock_classifier(MockClassificationModel::new(32));
        let err = classifier
            .classify_bytes(b"plain text".to_vec(), "text/plain", Locale::En)
            .unwrap_err();
        assert!(err.is_input_error());
        assert_eq!(classifier.loader().state(), LoadState::Unloaded);
    }

    #[test]
    fn test_inference_failure_returns_fallback() -> Result<()> {
        let classifier = mock_classifier(MockClassificationModel::failing(32, "shape mismatch"));
        let result = classifier.classify_bytes(jpeg_bytes(), "image/jpeg", Locale::En)?;
        assert_eq!(result.source, ResultSource::Fallback);
        assert_eq!(result.confidence, 50);
        assert_eq!(result.method, Method::Reduce);
        assert_eq!(classifier.ledger().live(), 0);
        Ok(())
    }

    struct PanickingModel;

    impl WasteClassificationModel for PanickingModel {
        fn input_size(&self) -> u32 {
            16
        }

        fn num_classes(&self) -> usize {
            WasteClass::COUNT
        }

        fn predict(&self, _tensor: ndarray::ArrayView4<f32>) -> Result<Vec<f32>> {
            panic!("runtime aborted mid-inference");
        }
    }

    #[test]
    fn test_panicking_model_returns_fallback() -> Result<()> {
        let model: Arc<dyn WasteClassificationModel> = Arc::new(PanickingModel);
        let loader = ModelLoader::with_factory(
            ModelSource::Local("panics.onnx".into()),
            LoaderConfig::default(),
            move |_| Ok(Arc::clone(&model)),
        );
        let classifier = Classifier::new(Arc::new(loader), ClassifierConfig::default());

        let result = classifier.classify_bytes(jpeg_bytes(), "image/jpeg", Locale::En)?;
        assert_eq!(result.source, ResultSource::Fallback);
        assert_eq!(result.confidence, 50);
        assert_eq!(classifier.ledger().live(), 0);
        Ok(())
    }

    #[test]
    fn test_panicking_loader_returns_fallback() -> Result<()> {
        let loader = ModelLoader::with_factory(
            ModelSource::Local("panics.onnx".into()),
            LoaderConfig::default(),
            |_| panic!("runtime crashed while loading"),
        );
        let classifier = Classifier::new(Arc::new(loader), ClassifierConfig::default());

        let result = classifier.classify_bytes(jpeg_bytes(), "image/jpeg", Locale::Id)?;
        assert_eq!(result.source, ResultSource::Fallback);
        assert_eq!(classifier.loader().state(), LoadState::Unloaded);
        Ok(())
    }

    #[test]
    fn test_load_wait_timeout_returns_fallback() -> Result<()> {
        let config = LoaderConfig {
            poll_attempts: 2,
            poll_interval: Duration::from_millis(10),
            ..LoaderConfig::default()
        };
        let loader = Arc::new(ModelLoader::with_factory(
            ModelSource::Local("slow.onnx".into()),
            config,
            |_| {
                thread::sleep(Duration::from_millis(400));
                Ok(Arc::new(MockClassificationModel::new(32)) as Arc<dyn WasteClassificationModel>)
            },
        ));
        let classifier = Classifier::new(Arc::clone(&loader), ClassifierConfig::default());

        let first = {
            let loader = Arc::clone(&loader);
            thread::spawn(move || loader.load())
        };
        while loader.state() != LoadState::Loading {
            thread::yield_now();
        }

        let result = classifier.classify_bytes(jpeg_bytes(), "image/jpeg", Locale::En)?;
        assert_eq!(result.source, ResultSource::Fallback);
        assert_eq!(result.confidence, 50);

        assert!(first.join().unwrap().is_ok());
        let result = classifier.classify_bytes(jpeg_bytes(), "image/jpeg", Locale::En)?;
        assert_eq!(result.source, ResultSource::Model);
        assert_eq!(result.predicted_class, Some(WasteClass::Cardboard));
        Ok(())
    }

    #[test]
    fn test_top_results_ranked() -> Result<()> {
        let mut scores = vec![0.01; WasteClass::COUNT];
        scores[WasteClass::Plastic.index()] = 0.6;
        scores[WasteClass::Metal.index()] = 0.25;
        scores[WasteClass::Paper.index()] = 0.1;
        let classifier = mock_classifier(MockClassificationModel::with_scores(32, scores));

        let result = classifier.classify_bytes(jpeg_bytes(), "image/jpeg", Locale::En)?;
        let ranked: Vec<_> = result
            .top_results
            .iter()
            .map(|r| (r.class, r.confidence))
            .collect();
        assert_eq!(
            ranked,
            vec![
                (Some(WasteClass::Plastic), 60),
                (Some(WasteClass::Metal), 25),
                (Some(WasteClass::Paper), 10),
            ]
        );
        assert!(fallback_result(Locale::En).top_results.is_empty());
        Ok(())
    }

    #[test]
    fn test_model_info() {
        let classifier = mock_classifier(MockClassificationModel::new(32));
        let info = classifier.model_info();
        assert_eq!(info.state, LoadState::Unloaded);
        assert_eq!(info.input_size, None);
        assert_eq!(info.class_keys.len(), WasteClass::COUNT);

        assert!(classifier.preload());
        let info = classifier.model_info();
        assert_eq!(info.state, LoadState::Ready);
        assert_eq!(info.input_size, Some(32));
        assert!(!info.degraded);
    }
}
