use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::taxonomy::{Locale, Localized, Method, Recommendation, WasteClass};

/// Predictions under this confidence are flagged but still returned.
pub const LOW_CONFIDENCE_THRESHOLD: u8 = 40;

/// Confidence reported by the generic fallback result.
pub const FALLBACK_CONFIDENCE: u8 = 50;

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultSource {
    /// The real model classified the image.
    Model,
    /// The fallback model answered because the real one failed to load.
    DegradedModel,
    /// The model picked an index the recommendation table does not know.
    UnknownClass,
    /// The pipeline failed and the generic result was substituted.
    Fallback,
}

/// User-facing text in the requested locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizedView {
    pub label: String,
    pub category: String,
    pub description: String,
    pub disposal: String,
    pub recommendation: String,
    pub method: String,
    pub environmental_impact: String,
}

/// A ranked alternative from the same forward pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopResult {
    /// `None` when the index has no table entry.
    pub class: Option<WasteClass>,
    pub class_index: usize,
    pub confidence: u8,
}

/// Classification outcome handed to callers.
///
/// The bilingual field pairs (`type`/`typeId`, ...) keep the wire names
/// downstream consumers already read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    #[serde(rename = "type")]
    pub waste_type: String,
    pub type_id: String,
    pub category: String,
    pub category_id: String,
    pub confidence: u8,
    pub description: String,
    pub description_id: String,
    pub disposal: String,
    pub disposal_id: String,
    pub recommendation: String,
    pub recommendation_id: String,
    pub method: Method,
    pub environmental_impact: String,
    pub environmental_impact_id: String,
    pub predicted_class: Option<WasteClass>,
    #[serde(default)]
    pub probabilities: Vec<f32>,
    /// Best classes first, empty for the generic fallback.
    #[serde(default)]
    pub top_results: Vec<TopResult>,
    pub low_confidence: bool,
    pub locale: Locale,
    pub localized: LocalizedView,
    pub source: ResultSource,
}

impl ClassificationResult {
    /// True when the answer did not come from a working model.
    pub const fn is_degraded(&self) -> bool {
        matches!(
            self.source,
            ResultSource::DegradedModel | ResultSource::Fallback
        )
    }
}

static OTHER: Recommendation = Recommendation {
    label: Localized::new("Other Waste", "Sampah Lainnya"),
    category: Localized::new("Unclassified", "Tidak Terklasifikasi"),
    description: Localized::new(
        "This item does not match any known waste class",
        "Barang ini tidak cocok dengan kelas sampah yang dikenal",
    ),
    disposal: Localized::new(
        "Check local waste guidelines before disposal",
        "Periksa panduan pengelolaan sampah setempat sebelum membuang",
    ),
    recommendation: Localized::new(
        "Inspect the item manually or ask a waste bank for guidance",
        "Periksa barang secara manual atau tanyakan ke bank sampah",
    ),
    method: Method::Check,
};

static UNKNOWN_WASTE: Recommendation = Recommendation {
    label: Localized::new("Unknown Waste", "Sampah Tidak Dikenal"),
    category: Localized::new("General Waste", "Sampah Umum"),
    description: Localized::new(
        "Unable to classify this waste accurately",
        "Tidak dapat mengklasifikasi sampah ini dengan akurat",
    ),
    disposal: Localized::new(
        "Place in general waste bin",
        "Masukkan ke tempat sampah umum",
    ),
    recommendation: Localized::new(
        "Consider manual sorting or ask waste management professionals",
        "Pertimbangkan pemisahan manual atau tanya profesional pengelolaan sampah",
    ),
    method: Method::Reduce,
};

fn environmental_impact(label: &Localized) -> (String, String) {
    (
        format!(
            "By properly managing {}, you help reduce pollution and protect the environment.",
            label.en
        ),
        format!(
            "Dengan mengelola {} dengan benar, Anda membantu mengurangi polusi dan menjaga lingkungan.",
            label.id
        ),
    )
}

fn build(
    entry: &Recommendation,
    confidence: u8,
    locale: Locale,
    predicted_class: Option<WasteClass>,
    source: ResultSource,
) -> ClassificationResult {
    let (impact_en, impact_id) = environmental_impact(&entry.label);
    let localized = LocalizedView {
        label: entry.label.get(locale).to_string(),
        category: entry.category.get(locale).to_string(),
        description: entry.description.get(locale).to_string(),
        disposal: entry.disposal.get(locale).to_string(),
        recommendation: entry.recommendation.get(locale).to_string(),
        method: entry.method.label().get(locale).to_string(),
        environmental_impact: match locale {
            Locale::En => impact_en.clone(),
            Locale::Id => impact_id.clone(),
        },
    };

    ClassificationResult {
        waste_type: entry.label.en.to_string(),
        type_id: entry.label.id.to_string(),
        category: entry.category.en.to_string(),
        category_id: entry.category.id.to_string(),
        confidence: confidence.min(100),
        description: entry.description.en.to_string(),
        description_id: entry.description.id.to_string(),
        disposal: entry.disposal.en.to_string(),
        disposal_id: entry.disposal.id.to_string(),
        recommendation: entry.recommendation.en.to_string(),
        recommendation_id: entry.recommendation.id.to_string(),
        method: entry.method,
        environmental_impact: impact_en,
        environmental_impact_id: impact_id,
        predicted_class,
        probabilities: Vec::new(),
        top_results: Vec::new(),
        low_confidence: false,
        locale,
        localized,
        source,
    }
}

/// Joins a predicted class index against the recommendation table.
#[derive(Debug, Clone, Copy)]
pub struct RecommendationMapper {
    pub low_confidence_threshold: u8,
}

impl Default for RecommendationMapper {
    fn default() -> Self {
        Self {
            low_confidence_threshold: LOW_CONFIDENCE_THRESHOLD,
        }
    }
}

impl RecommendationMapper {
    pub const fn new(low_confidence_threshold: u8) -> Self {
        Self {
            low_confidence_threshold,
        }
    }

    /// Never fails: an index outside the table maps to the "other" entry.
    pub fn map(&self, class_index: usize, confidence: u8, locale: Locale) -> ClassificationResult {
        let mut result = match WasteClass::from_index(class_index) {
            Some(class) => build(
                class.recommendation(),
                confidence,
                locale,
                Some(class),
                ResultSource::Model,
            ),
            None => {
                warn!(
                    class_index,
                    table_size = WasteClass::COUNT,
                    "class index has no recommendation entry"
                );
                build(&OTHER, confidence, locale, None, ResultSource::UnknownClass)
            }
        };

        if result.confidence < self.low_confidence_threshold {
            warn!(
                confidence = result.confidence,
                class = %result.waste_type,
                "low confidence prediction"
            );
            result.low_confidence = true;
        }
        result
    }
}

/// [`RecommendationMapper::map`] with the default low-confidence threshold.
pub fn map_to_result(class_index: usize, confidence: u8, locale: Locale) -> ClassificationResult {
    RecommendationMapper::default().map(class_index, confidence, locale)
}

/// The generic answer substituted when the pipeline fails.
pub fn fallback_result(locale: Locale) -> ClassificationResult {
    build(
        &UNKNOWN_WASTE,
        FALLBACK_CONFIDENCE,
        locale,
        None,
        ResultSource::Fallback,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardboard_in_indonesian() {
        let result = map_to_result(WasteClass::Cardboard.index(), 87, Locale::Id);
        assert_eq!(result.method, Method::Recycle);
        assert_eq!(result.type_id, "Kardus");
        assert_eq!(result.localized.label, "Kardus");
        assert_eq!(result.localized.disposal, result.disposal_id);
        assert!(!result.disposal_id.is_empty());
        assert_eq!(result.predicted_class, Some(WasteClass::Cardboard));
        assert_eq!(result.localized.method, "Daur Ulang");
        assert_eq!(result.source, ResultSource::Model);
        assert!(!result.low_confidence);
    }

    #[test]
    fn test_out_of_range_maps_to_other() {
        let result = map_to_result(99, 70, Locale::En);
        assert_eq!(result.method, Method::Check);
        assert_eq!(result.source, ResultSource::UnknownClass);
        assert_eq!(result.predicted_class, None);
        assert_eq!(result.confidence, 70);
    }

    #[test]
    fn test_low_confidence_flagged_not_blocked() {
        let result = map_to_result(WasteClass::Plastic.index(), 39, Locale::En);
        assert!(result.low_confidence);
        assert_eq!(result.waste_type, "Plastic");

        let result = map_to_result(WasteClass::Plastic.index(), 40, Locale::En);
        assert!(!result.low_confidence);

        let strict = RecommendationMapper::new(90);
        assert!(strict.map(WasteClass::Plastic.index(), 80, Locale::En).low_confidence);
    }

    #[test]
    fn test_fallback_result_is_distinguishable() {
        let fallback = fallback_result(Locale::En);
        assert_eq!(fallback.waste_type, "Unknown Waste");
        assert_eq!(fallback.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(fallback.method, Method::Reduce);
        assert_eq!(fallback.source, ResultSource::Fallback);
        assert!(fallback.is_degraded());

        let genuine = map_to_result(WasteClass::Trash.index(), 95, Locale::En);
        assert!(!genuine.is_degraded());
    }

    #[test]
    fn test_wire_field_names() {
        let result = map_to_result(WasteClass::Metal.index(), 64, Locale::En);
        let json = serde_json::to_value(&result).unwrap();
        for field in [
            "type",
            "typeId",
            "category",
            "categoryId",
            "confidence",
            "description",
            "descriptionId",
            "disposal",
            "disposalId",
            "recommendation",
            "recommendationId",
            "method",
        ] {
            assert!(json.get(field).is_some(), "missing `{field}`");
        }
        assert_eq!(json["method"], "recycle");
        assert_eq!(json["predictedClass"], "metal");
        assert_eq!(json["source"], "model");
        assert_eq!(json["confidence"], 64);
    }

    #[test]
    fn test_environmental_impact_mentions_type() {
        let result = map_to_result(WasteClass::GreenGlass.index(), 80, Locale::Id);
        assert!(result.environmental_impact.contains("Green Glass"));
        assert!(result.environmental_impact_id.contains("Kaca Hijau"));
        assert_eq!(result.localized.environmental_impact, result.environmental_impact_id);
    }

    #[test]
    fn test_all_indices_all_locales_complete() {
        for index in 0..WasteClass::COUNT {
            for locale in Locale::ALL {
                let result = map_to_result(index, 55, locale);
                assert!(result.confidence <= 100);
                assert!(!result.waste_type.is_empty());
                assert!(!result.localized.recommendation.is_empty());
            }
        }
    }
}
