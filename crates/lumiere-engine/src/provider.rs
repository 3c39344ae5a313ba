use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lumiere_contracts::catalog::StylePreset;
use lumiere_contracts::intake::{encode_data_url, PRODUCT_CAPACITY};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::config::{GenerationSettings, StudioConfig};
use crate::credentials::CredentialProvider;
use crate::error::StudioError;
use crate::prompt::{build_instruction, inline_image_part};

/// One wrapper call: a portrait, 1-3 products, a style and a pose.
#[derive(Debug, Clone)]
pub struct FashionRequest {
    pub portrait: String,
    pub products: Vec<String>,
    pub style: StylePreset,
    pub pose: String,
    pub settings: GenerationSettings,
}

impl FashionRequest {
    /// Ordered request parts: portrait, each product, then the instruction.
    pub fn parts(&self) -> Result<Vec<Value>> {
        if self.portrait.trim().is_empty() {
            return Err(StudioError::MissingPortrait.into());
        }
        if self.products.is_empty() {
            return Err(StudioError::MissingProducts.into());
        }
        if self.products.len() > PRODUCT_CAPACITY {
            return Err(StudioError::TooManyProducts {
                max: PRODUCT_CAPACITY,
                got: self.products.len(),
            }
            .into());
        }
        let mut parts = Vec::with_capacity(self.products.len() + 2);
        parts.push(inline_image_part(&self.portrait));
        for product in &self.products {
            parts.push(inline_image_part(product));
        }
        parts.push(json!({ "text": build_instruction(self.style, &self.pose) }));
        Ok(parts)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPayload {
    /// `data:image/png;base64,...`
    pub data_url: String,
    pub provider_mime_type: Option<String>,
}

pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, request: &FashionRequest) -> Result<GeneratedPayload>;
}

#[derive(Default)]
pub struct ImageProviderRegistry {
    providers: BTreeMap<String, Arc<dyn ImageProvider>>,
}

impl ImageProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ImageProvider + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageProvider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub fn default_provider_registry(
    config: &StudioConfig,
    credentials: Arc<dyn CredentialProvider>,
) -> ImageProviderRegistry {
    let mut providers = ImageProviderRegistry::new();
    providers.register(DryrunProvider);
    providers.register(GeminiProvider::new(config, credentials));
    providers
}

/// Offline provider: a flat 3:4 PNG whose colour is derived from the prompt.
pub struct DryrunProvider;

impl DryrunProvider {
    const WIDTH: u32 = 96;
    const HEIGHT: u32 = 128;
}

impl ImageProvider for DryrunProvider {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &FashionRequest) -> Result<GeneratedPayload> {
        let parts = request.parts()?;
        let instruction = parts
            .last()
            .and_then(|part| part.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let (r, g, b) = color_from_prompt(instruction);
        let image = RgbImage::from_pixel(Self::WIDTH, Self::HEIGHT, Rgb([r, g, b]));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut bytes, ImageFormat::Png)
            .context("dryrun image encode failed")?;
        Ok(GeneratedPayload {
            data_url: encode_data_url("image/png", bytes.get_ref()),
            provider_mime_type: Some("image/png".to_string()),
        })
    }
}

pub struct GeminiProvider {
    api_base: String,
    request_timeout: Option<Duration>,
    credentials: Arc<dyn CredentialProvider>,
    http: HttpClient,
}

impl GeminiProvider {
    pub fn new(config: &StudioConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout,
            credentials,
            http: HttpClient::new(),
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(request: &FashionRequest) -> Result<Value> {
        Ok(json!({
            "contents": [{
                "role": "user",
                "parts": request.parts()?,
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": request.settings.aspect_ratio,
                    "imageSize": request.settings.image_size,
                },
            },
        }))
    }

    /// First inline image of the first candidate, as `(data, mime_type)`.
    fn extract_first_image(response_payload: &Value) -> Option<(String, Option<String>)> {
        let parts = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)?;
        parts.iter().find_map(|part| {
            let inline = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)?;
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .filter(|data| !data.is_empty())?;
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .map(str::to_string);
            Some((data.to_string(), mime_type))
        })
    }
}

impl ImageProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    // One shot per call; a fresh credential lookup every time so a key chosen
    // mid-session is picked up.
    fn generate(&self, request: &FashionRequest) -> Result<GeneratedPayload> {
        let Some(api_key) = self.credentials.credential() else {
            return Err(StudioError::MissingCredential.into());
        };
        let endpoint = self.endpoint_for_model(&request.settings.model);
        let payload = Self::build_payload(request)?;

        let mut call = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", api_key)
            .json(&payload);
        if let Some(timeout) = self.request_timeout {
            call = call.timeout(timeout);
        }
        let response = call
            .send()
            .with_context(|| format!("Gemini request failed ({endpoint})"))?;
        let response_payload = response_json_or_error("Gemini", response)?;

        let Some((data, mime_type)) = Self::extract_first_image(&response_payload) else {
            return Err(StudioError::NoImageReturned.into());
        };
        Ok(GeneratedPayload {
            data_url: format!("data:image/png;base64,{data}"),
            provider_mime_type: mime_type,
        })
    }
}

fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().map(|existing| existing == trimmed).unwrap_or(false) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let digest = Sha256::digest(prompt.as_bytes());
    (digest[0], digest[1], digest[2])
}

/// Short stable hash used to correlate a result with its instruction in logs.
pub(crate) fn prompt_fingerprint(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..4])
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
