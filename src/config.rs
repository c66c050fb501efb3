use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::Result;
use crate::input::DEFAULT_MAX_FILE_SIZE;
use crate::loader::LoaderConfig;
use crate::mapper::LOW_CONFIDENCE_THRESHOLD;
use crate::model::{ModelSource, RuntimeOptions};
use crate::taxonomy::Locale;

#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Image files or directories to classify
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Model location: a path, a file:// URL or an http(s):// URL
    #[arg(short, long, default_value = "models/waste-classifier.onnx")]
    pub model: String,

    #[arg(short, long, default_value = "en")]
    pub locale: Locale,

    /// Largest accepted image, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FILE_SIZE)]
    pub max_file_size: usize,

    #[arg(long, default_value_t = LOW_CONFIDENCE_THRESHOLD, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub low_confidence_threshold: u8,

    #[arg(long, default_value_t = 50)]
    pub load_poll_attempts: u32,

    #[arg(long, default_value_t = 100)]
    pub load_poll_interval_ms: u64,

    /// Upper bound on a single classification; unset means no limit
    #[arg(long)]
    pub inference_timeout_ms: Option<u64>,

    /// Skip loading the model and answer with the fallback model
    #[arg(long)]
    pub no_inference: bool,

    /// Worker threads for batch classification (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// ONNX Runtime intra-op threads
    #[arg(long, default_value_t = 1)]
    pub intra_threads: usize,

    /// GPU device for the CUDA/TensorRT execution providers
    #[arg(short, long, default_value_t = 0)]
    pub device_id: i32,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl Config {
    pub fn model_source(&self) -> Result<ModelSource> {
        ModelSource::parse(&self.model)
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            poll_attempts: self.load_poll_attempts,
            poll_interval: Duration::from_millis(self.load_poll_interval_ms),
            inference_enabled: !self.no_inference,
            runtime: RuntimeOptions {
                intra_threads: self.intra_threads,
                device_id: self.device_id,
            },
        }
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            max_file_size: self.max_file_size,
            low_confidence_threshold: self.low_confidence_threshold,
            inference_timeout: self.inference_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Settings the classification pipeline itself reads.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub max_file_size: usize,
    pub low_confidence_threshold: u8,
    /// Only enforced by the async service; the blocking path has no deadline.
    pub inference_timeout: Option<Duration>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            low_confidence_threshold: LOW_CONFIDENCE_THRESHOLD,
            inference_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["waste-classify", "photo.jpg"]).unwrap();
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);

        let loader = config.loader_config();
        assert_eq!(loader.poll_attempts, 50);
        assert_eq!(loader.poll_interval, Duration::from_millis(100));
        assert!(loader.inference_enabled);

        let classifier = config.classifier_config();
        assert_eq!(classifier.low_confidence_threshold, 40);
        assert!(classifier.inference_timeout.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::try_parse_from([
            "waste-classify",
            "--locale",
            "id",
            "--no-inference",
            "--inference-timeout-ms",
            "250",
            "--model",
            "https://example.com/waste.onnx",
            "a.jpg",
            "dir",
        ])
        .unwrap();
        assert_eq!(config.locale, Locale::Id);
        assert_eq!(config.inputs.len(), 2);
        assert!(!config.loader_config().inference_enabled);
        assert_eq!(
            config.classifier_config().inference_timeout,
            Some(Duration::from_millis(250))
        );
        assert!(matches!(config.model_source(), Ok(ModelSource::Remote(_))));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::try_parse_from(["waste-classify", "--locale", "fr", "a.jpg"]).is_err());
        assert!(Config::try_parse_from([
            "waste-classify",
            "--low-confidence-threshold",
            "101",
            "a.jpg"
        ])
        .is_err());
        assert!(Config::try_parse_from(["waste-classify"]).is_err());
    }
}
