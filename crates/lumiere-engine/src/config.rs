use std::time::Duration;

use anyhow::{bail, Result};
use lumiere_contracts::models::{ModelSelector, ModelSpec};

use crate::credentials::non_empty_env;
use crate::provider::ImageProviderRegistry;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_ASPECT_RATIO: &str = "3:4";
pub const DEFAULT_IMAGE_SIZE: &str = "4K";

const SIZE_TIERS: [&str; 3] = ["1K", "2K", "4K"];

/// Studio settings resolved from the environment, then overridden by flags.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioConfig {
    pub api_base: String,
    pub model: Option<String>,
    pub aspect_ratio: String,
    pub image_size: String,
    pub request_timeout: Option<Duration>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: None,
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            request_timeout: None,
        }
    }
}

impl StudioConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            api_base: lookup("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_base),
            model: lookup("LUMIERE_IMAGE_MODEL"),
            aspect_ratio: lookup("LUMIERE_ASPECT_RATIO").unwrap_or(defaults.aspect_ratio),
            image_size: lookup("LUMIERE_IMAGE_SIZE").unwrap_or(defaults.image_size),
            request_timeout: lookup("LUMIERE_REQUEST_TIMEOUT")
                .and_then(|value| value.trim().parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64),
        }
    }
}

/// Per-request knobs forwarded to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationSettings {
    pub model: String,
    pub aspect_ratio: String,
    pub image_size: String,
}

#[derive(Debug, Clone)]
pub struct ResolvedGeneration {
    pub model: ModelSpec,
    pub settings: GenerationSettings,
    pub fallback_reason: Option<String>,
    pub warnings: Vec<String>,
}

/// Picks the image model and clamps the size tier to what it supports.
pub fn resolve_generation(
    config: &StudioConfig,
    providers: &ImageProviderRegistry,
) -> Result<ResolvedGeneration> {
    let selector = ModelSelector::new(None);
    let selection = selector
        .select(config.model.as_deref(), "image")
        .map_err(anyhow::Error::msg)?;
    let mut model = selection.model;
    let mut fallback_reason = selection.fallback_reason;

    if providers.get(&model.provider).is_none() {
        let Some(fallback) = selector
            .registry
            .by_capability("image")
            .into_iter()
            .find(|candidate| providers.get(&candidate.provider).is_some())
        else {
            bail!(
                "no image providers registered (available: [{}])",
                providers.names().join(", ")
            );
        };
        let reason = format!(
            "Provider '{}' for model '{}' unavailable; using '{}'.",
            model.provider, model.name, fallback.name
        );
        fallback_reason = Some(match fallback_reason {
            Some(existing) => format!("{existing} {reason}"),
            None => reason,
        });
        model = fallback;
    }

    let mut warnings = Vec::new();
    let image_size =
        resolve_image_size_tier(&config.image_size, model.max_image_size.as_deref(), &mut warnings);
    let aspect_ratio = config.aspect_ratio.trim();
    let aspect_ratio = if aspect_ratio.is_empty() {
        DEFAULT_ASPECT_RATIO
    } else {
        aspect_ratio
    };

    Ok(ResolvedGeneration {
        settings: GenerationSettings {
            model: model.name.clone(),
            aspect_ratio: aspect_ratio.to_string(),
            image_size,
        },
        model,
        fallback_reason,
        warnings,
    })
}

fn resolve_image_size_tier(
    raw: &str,
    max_tier: Option<&str>,
    warnings: &mut Vec<String>,
) -> String {
    let requested = raw.trim().to_ascii_uppercase();
    let requested_rank = match SIZE_TIERS.iter().position(|tier| *tier == requested) {
        Some(rank) => rank,
        None => {
            warnings.push(format!("Image size '{raw}' unsupported; using 2K."));
            1
        }
    };
    let max_rank = max_tier
        .and_then(|max| SIZE_TIERS.iter().position(|tier| *tier == max))
        .unwrap_or(SIZE_TIERS.len() - 1);
    if requested_rank > max_rank {
        warnings.push(format!(
            "Image size {} exceeds model limit; using {}.",
            SIZE_TIERS[requested_rank], SIZE_TIERS[max_rank]
        ));
        return SIZE_TIERS[max_rank].to_string();
    }
    SIZE_TIERS[requested_rank].to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use super::{resolve_generation, resolve_image_size_tier, StudioConfig};
    use crate::credentials::StaticCredentials;
    use crate::provider::{default_provider_registry, DryrunProvider, ImageProviderRegistry};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn from_lookup_applies_defaults_and_overrides() {
        let config = StudioConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, StudioConfig::default());
        assert_eq!(config.aspect_ratio, "3:4");
        assert_eq!(config.image_size, "4K");
        assert!(config.request_timeout.is_none());

        let config = StudioConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_BASE", "https://proxy.test/v1beta/"),
            ("LUMIERE_IMAGE_MODEL", "gemini-2.5-flash-image"),
            ("LUMIERE_REQUEST_TIMEOUT", "45"),
        ]));
        assert_eq!(config.api_base, "https://proxy.test/v1beta");
        assert_eq!(config.model.as_deref(), Some("gemini-2.5-flash-image"));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(45)));
    }

    #[test]
    fn size_tier_clamps_to_model_limit() {
        let mut warnings = Vec::new();
        assert_eq!(resolve_image_size_tier("4k", Some("4K"), &mut warnings), "4K");
        assert!(warnings.is_empty());
        assert_eq!(resolve_image_size_tier("4K", Some("1K"), &mut warnings), "1K");
        assert_eq!(resolve_image_size_tier("huge", None, &mut warnings), "2K");
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn resolve_defaults_to_pro_image_model() -> anyhow::Result<()> {
        let providers = default_provider_registry(
            &StudioConfig::default(),
            Arc::new(StaticCredentials(None)),
        );
        let resolved = resolve_generation(&StudioConfig::default(), &providers)?;
        assert_eq!(resolved.settings.model, "gemini-3-pro-image-preview");
        assert_eq!(resolved.settings.aspect_ratio, "3:4");
        assert_eq!(resolved.settings.image_size, "4K");
        assert_eq!(
            resolved.fallback_reason.as_deref(),
            Some("No model specified; using default.")
        );
        Ok(())
    }

    #[test]
    fn resolve_falls_back_to_registered_provider() -> anyhow::Result<()> {
        let mut providers = ImageProviderRegistry::new();
        providers.register(DryrunProvider);
        let config = StudioConfig {
            model: Some("gemini-3-pro-image-preview".to_string()),
            ..StudioConfig::default()
        };
        let resolved = resolve_generation(&config, &providers)?;
        assert_eq!(resolved.model.provider, "dryrun");
        assert_eq!(resolved.settings.image_size, "1K");
        assert!(resolved
            .fallback_reason
            .as_deref()
            .unwrap_or_default()
            .contains("Provider 'gemini'"));
        Ok(())
    }
}
