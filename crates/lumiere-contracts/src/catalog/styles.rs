use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StylePreset {
    #[default]
    Minimalist,
    Streetwear,
    AvantGarde,
    Vintage,
    Luxury,
}

impl StylePreset {
    pub const ALL: [StylePreset; 5] = [
        StylePreset::Minimalist,
        StylePreset::Streetwear,
        StylePreset::AvantGarde,
        StylePreset::Vintage,
        StylePreset::Luxury,
    ];

    /// Full aesthetic descriptor blended into the generation instruction.
    pub fn descriptor(self) -> &'static str {
        match self {
            StylePreset::Minimalist => "Minimalist Studio, clean background, soft lighting",
            StylePreset::Streetwear => "Urban Street Style, city background, natural light, candid",
            StylePreset::AvantGarde => {
                "Avant-Garde, surreal elements, dramatic high-contrast lighting"
            }
            StylePreset::Vintage => "Vintage 90s Editorial, film grain, flash photography",
            StylePreset::Luxury => "Luxury Glamour, golden hour, opulent setting",
        }
    }

    /// Picker label: the descriptor up to its first comma.
    pub fn label(self) -> &'static str {
        let descriptor = self.descriptor();
        descriptor
            .split_once(',')
            .map(|(head, _)| head)
            .unwrap_or(descriptor)
    }

    pub fn key(self) -> &'static str {
        match self {
            StylePreset::Minimalist => "minimalist",
            StylePreset::Streetwear => "streetwear",
            StylePreset::AvantGarde => "avant-garde",
            StylePreset::Vintage => "vintage",
            StylePreset::Luxury => "luxury",
        }
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown style '{0}' (expected one of: {keys})", keys = style_keys())]
pub struct UnknownStyle(pub String);

fn style_keys() -> String {
    StylePreset::ALL.map(StylePreset::key).join(", ")
}

impl FromStr for StylePreset {
    type Err = UnknownStyle;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let normalized = trimmed.to_ascii_lowercase().replace(['_', ' '], "-");
        StylePreset::ALL
            .into_iter()
            .find(|style| style.key() == normalized || style.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownStyle(raw.to_string()))
    }
}
