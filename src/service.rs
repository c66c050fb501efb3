use std::sync::Arc;

use tokio::task;
use tokio::time::timeout;
use tracing::warn;

use crate::errors::{ClassifyError, Result};
use crate::input::ImageInput;
use crate::mapper::{fallback_result, ClassificationResult};
use crate::taxonomy::Locale;
use crate::Classifier;

/// Async front of [`Classifier`] for callers living on a tokio runtime.
///
/// Decoding and inference run on the blocking pool. When the classifier has
/// an inference timeout configured, a pass that overruns it is abandoned and
/// the caller gets the fallback result.
#[derive(Clone)]
pub struct ClassificationService {
    classifier: Arc<Classifier>,
}

impl ClassificationService {
    pub fn new(classifier: Arc<Classifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Arc<Classifier> {
        &self.classifier
    }

    pub async fn preload(&self) -> bool {
        let classifier = Arc::clone(&self.classifier);
        task::spawn_blocking(move || classifier.preload())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "preload task failed");
                false
            })
    }

    pub async fn classify(&self, input: ImageInput, locale: Locale) -> Result<ClassificationResult> {
        input.validate(self.classifier.config().max_file_size)?;

        let image = task::spawn_blocking(move || input.decode())
            .await
            .map_err(|e| ClassifyError::Configuration {
                message: format!("decode task failed: {e}"),
            })??;

        let classifier = Arc::clone(&self.classifier);
        let inference = task::spawn_blocking(move || classifier.classify_image(&image, locale));

        let joined = match self.classifier.config().inference_timeout {
            Some(limit) => match timeout(limit, inference).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(?limit, "inference timed out, returning fallback result");
                    return Ok(fallback_result(locale));
                }
            },
            None => inference.await,
        };

        Ok(joined.unwrap_or_else(|e| {
            warn!(error = %e, "inference task failed, returning fallback result");
            fallback_result(locale)
        }))
    }

    pub async fn classify_data_url(
        &self,
        data_url: &str,
        locale: Locale,
    ) -> Result<ClassificationResult> {
        let input = ImageInput::from_data_url(data_url, self.classifier.config().max_file_size)?;
        self.classify(input, locale).await
    }
}
