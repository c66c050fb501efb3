use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ClassifyError, Result};

/// Display language of user-facing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Id,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Id];

    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Id => "id",
        }
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "id" => Ok(Self::Id),
            other => Err(format!("unsupported locale `{other}`, expected `en` or `id`")),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Text available in every supported locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Localized {
    pub en: &'static str,
    pub id: &'static str,
}

impl Localized {
    pub const fn new(en: &'static str, id: &'static str) -> Self {
        Self { en, id }
    }

    pub const fn get(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => self.en,
            Locale::Id => self.id,
        }
    }
}

/// Coarse handling strategy for a waste class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Recycle,
    Compost,
    Reduce,
    Reuse,
    Special,
    Check,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Recycle => "recycle",
            Self::Compost => "compost",
            Self::Reduce => "reduce",
            Self::Reuse => "reuse",
            Self::Special => "special",
            Self::Check => "check",
        }
    }

    pub const fn label(self) -> Localized {
        match self {
            Self::Recycle => Localized::new("Recycle", "Daur Ulang"),
            Self::Compost => Localized::new("Compost", "Kompos"),
            Self::Reduce => Localized::new("Reduce", "Kurangi"),
            Self::Reuse => Localized::new("Reuse", "Gunakan Kembali"),
            Self::Special => Localized::new("Special Handling", "Penanganan Khusus"),
            Self::Check => Localized::new("Check Manually", "Periksa Manual"),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The class taxonomy, in model output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WasteClass {
    Battery,
    Biological,
    BrownGlass,
    Cardboard,
    Clothes,
    GreenGlass,
    Metal,
    Paper,
    Plastic,
    Shoes,
    Trash,
    WhiteGlass,
}

impl WasteClass {
    pub const ALL: [WasteClass; 12] = [
        WasteClass::Battery,
        WasteClass::Biological,
        WasteClass::BrownGlass,
        WasteClass::Cardboard,
        WasteClass::Clothes,
        WasteClass::GreenGlass,
        WasteClass::Metal,
        WasteClass::Paper,
        WasteClass::Plastic,
        WasteClass::Shoes,
        WasteClass::Trash,
        WasteClass::WhiteGlass,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::Biological => "biological",
            Self::BrownGlass => "brown-glass",
            Self::Cardboard => "cardboard",
            Self::Clothes => "clothes",
            Self::GreenGlass => "green-glass",
            Self::Metal => "metal",
            Self::Paper => "paper",
            Self::Plastic => "plastic",
            Self::Shoes => "shoes",
            Self::Trash => "trash",
            Self::WhiteGlass => "white-glass",
        }
    }

    pub fn recommendation(self) -> &'static Recommendation {
        &RECOMMENDATIONS[self as usize]
    }
}

impl FromStr for WasteClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|class| class.key() == s)
            .ok_or_else(|| format!("unknown waste class `{s}`"))
    }
}

impl fmt::Display for WasteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Disposal guidance for one waste class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recommendation {
    pub label: Localized,
    pub category: Localized,
    pub description: Localized,
    pub disposal: Localized,
    pub recommendation: Localized,
    pub method: Method,
}

/// Indexed by `WasteClass as usize`.
static RECOMMENDATIONS: [Recommendation; WasteClass::COUNT] = [
    Recommendation {
        label: Localized::new("Battery", "Baterai"),
        category: Localized::new("Hazardous Waste", "Limbah Berbahaya"),
        description: Localized::new(
            "Electronic battery that requires special disposal",
            "Baterai elektronik yang memerlukan pembuangan khusus",
        ),
        disposal: Localized::new(
            "Take to designated battery collection point",
            "Bawa ke titik pengumpulan baterai yang ditentukan",
        ),
        recommendation: Localized::new(
            "Never throw batteries in regular trash. Take to electronics store or hazardous waste facility.",
            "Jangan pernah membuang baterai ke tempat sampah biasa. Bawa ke toko elektronik atau fasilitas limbah berbahaya.",
        ),
        method: Method::Special,
    },
    Recommendation {
        label: Localized::new("Organic Waste", "Sampah Organik"),
        category: Localized::new("Compostable", "Dapat Dikompos"),
        description: Localized::new(
            "Biodegradable organic matter",
            "Bahan organik yang dapat terurai",
        ),
        disposal: Localized::new(
            "Place in green organic waste bin",
            "Masukkan ke tempat sampah organik hijau",
        ),
        recommendation: Localized::new(
            "Compost this organic waste or use for biogas production. Great for soil enrichment.",
            "Kompos sampah organik ini atau gunakan untuk produksi biogas. Bagus untuk pengayaan tanah.",
        ),
        method: Method::Compost,
    },
    Recommendation {
        label: Localized::new("Brown Glass", "Kaca Coklat"),
        category: Localized::new("Recyclable Glass", "Kaca Daur Ulang"),
        description: Localized::new(
            "Brown colored glass container",
            "Wadah kaca berwarna coklat",
        ),
        disposal: Localized::new(
            "Place in brown glass recycling bin",
            "Masukkan ke tempat sampah kaca coklat",
        ),
        recommendation: Localized::new(
            "Clean the glass and remove caps. Brown glass can be recycled indefinitely.",
            "Bersihkan kaca dan lepas tutupnya. Kaca coklat dapat didaur ulang tanpa batas.",
        ),
        method: Method::Recycle,
    },
    Recommendation {
        label: Localized::new("Cardboard", "Kardus"),
        category: Localized::new("Recyclable Paper", "Kertas Daur Ulang"),
        description: Localized::new(
            "Corrugated cardboard material",
            "Bahan kardus bergelombang",
        ),
        disposal: Localized::new(
            "Flatten and place in paper recycling bin",
            "Ratakan dan masukkan ke tempat sampah daur ulang kertas",
        ),
        recommendation: Localized::new(
            "Remove tape and flatten cardboard. One of the most recyclable materials.",
            "Lepas selotip dan ratakan kardus. Salah satu bahan yang paling mudah didaur ulang.",
        ),
        method: Method::Recycle,
    },
    Recommendation {
        label: Localized::new("Clothing", "Pakaian"),
        category: Localized::new("Textile Waste", "Limbah Tekstil"),
        description: Localized::new("Fabric and textile materials", "Bahan kain dan tekstil"),
        disposal: Localized::new(
            "Donate or take to textile recycling center",
            "Donasikan atau bawa ke pusat daur ulang tekstil",
        ),
        recommendation: Localized::new(
            "Donate if in good condition, or take to textile recycling facility.",
            "Donasikan jika masih bagus, atau bawa ke fasilitas daur ulang tekstil.",
        ),
        method: Method::Reuse,
    },
    Recommendation {
        label: Localized::new("Green Glass", "Kaca Hijau"),
        category: Localized::new("Recyclable Glass", "Kaca Daur Ulang"),
        description: Localized::new(
            "Green colored glass container",
            "Wadah kaca berwarna hijau",
        ),
        disposal: Localized::new(
            "Place in green glass recycling bin",
            "Masukkan ke tempat sampah kaca hijau",
        ),
        recommendation: Localized::new(
            "Clean the glass and remove caps. Green glass maintains quality through recycling.",
            "Bersihkan kaca dan lepas tutupnya. Kaca hijau mempertahankan kualitas melalui daur ulang.",
        ),
        method: Method::Recycle,
    },
    Recommendation {
        label: Localized::new("Metal", "Logam"),
        category: Localized::new("Recyclable Metal", "Logam Daur Ulang"),
        description: Localized::new("Metal cans and containers", "Kaleng dan wadah logam"),
        disposal: Localized::new(
            "Place in metal recycling bin",
            "Masukkan ke tempat sampah daur ulang logam",
        ),
        recommendation: Localized::new(
            "Rinse containers and remove labels. Metal has high recycling value.",
            "Bilas wadah dan lepas label. Logam memiliki nilai daur ulang tinggi.",
        ),
        method: Method::Recycle,
    },
    Recommendation {
        label: Localized::new("Paper", "Kertas"),
        category: Localized::new("Recyclable Paper", "Kertas Daur Ulang"),
        description: Localized::new("Clean paper materials", "Bahan kertas bersih"),
        disposal: Localized::new(
            "Place in paper recycling bin",
            "Masukkan ke tempat sampah daur ulang kertas",
        ),
        recommendation: Localized::new(
            "Keep paper clean and dry. Remove any plastic coating before recycling.",
            "Jaga kertas tetap bersih dan kering. Lepas lapisan plastik sebelum didaur ulang.",
        ),
        method: Method::Recycle,
    },
    Recommendation {
        label: Localized::new("Plastic", "Plastik"),
        category: Localized::new("Recyclable Plastic", "Plastik Daur Ulang"),
        description: Localized::new("Plastic containers and bottles", "Wadah dan botol plastik"),
        disposal: Localized::new(
            "Place in plastic recycling bin",
            "Masukkan ke tempat sampah daur ulang plastik",
        ),
        recommendation: Localized::new(
            "Clean containers and check recycling number. Remove caps and labels.",
            "Bersihkan wadah dan periksa nomor daur ulang. Lepas tutup dan label.",
        ),
        method: Method::Recycle,
    },
    Recommendation {
        label: Localized::new("Shoes", "Sepatu"),
        category: Localized::new("Textile/Leather Waste", "Limbah Tekstil/Kulit"),
        description: Localized::new("Footwear and shoe materials", "Alas kaki dan bahan sepatu"),
        disposal: Localized::new(
            "Donate or take to shoe recycling program",
            "Donasikan atau bawa ke program daur ulang sepatu",
        ),
        recommendation: Localized::new(
            "Donate if wearable, or find specialized shoe recycling programs.",
            "Donasikan jika masih bisa dipakai, atau cari program daur ulang sepatu khusus.",
        ),
        method: Method::Reuse,
    },
    Recommendation {
        label: Localized::new("General Waste", "Sampah Umum"),
        category: Localized::new("Non-Recyclable", "Tidak Dapat Didaur Ulang"),
        description: Localized::new(
            "Mixed waste that cannot be recycled",
            "Sampah campuran yang tidak dapat didaur ulang",
        ),
        disposal: Localized::new(
            "Place in general waste bin",
            "Masukkan ke tempat sampah umum",
        ),
        recommendation: Localized::new(
            "Try to minimize general waste. Consider if any parts can be separated for recycling.",
            "Coba kurangi sampah umum. Pertimbangkan apakah ada bagian yang bisa dipisah untuk didaur ulang.",
        ),
        method: Method::Reduce,
    },
    Recommendation {
        label: Localized::new("Clear Glass", "Kaca Bening"),
        category: Localized::new("Recyclable Glass", "Kaca Daur Ulang"),
        description: Localized::new(
            "Clear/white glass container",
            "Wadah kaca bening/putih",
        ),
        disposal: Localized::new(
            "Place in clear glass recycling bin",
            "Masukkan ke tempat sampah kaca bening",
        ),
        recommendation: Localized::new(
            "Clean thoroughly and remove all caps. Clear glass has the highest recycling value.",
            "Bersihkan dengan teliti dan lepas semua tutup. Kaca bening memiliki nilai daur ulang tertinggi.",
        ),
        method: Method::Recycle,
    },
];

/// Checks that a model's output length matches the recommendation table.
pub fn verify_taxonomy(output_len: usize) -> Result<()> {
    if output_len == WasteClass::COUNT {
        Ok(())
    } else {
        Err(ClassifyError::Configuration {
            message: format!(
                "model produces {output_len} scores but the recommendation table has {} classes",
                WasteClass::COUNT
            ),
        })
    }
}
