use lumiere_contracts::catalog::StylePreset;
use lumiere_contracts::intake::split_data_url;
use serde_json::{json, Value};

const DEFAULT_INPUT_MIME: &str = "image/jpeg";

/// Provenance string stored on each result: `"<style> | <pose>"`.
pub fn composed_prompt(style: StylePreset, pose: &str) -> String {
    format!("{} | {}", style.descriptor(), pose)
}

/// Art-direction instruction sent after the reference images.
pub fn build_instruction(style: StylePreset, pose: &str) -> String {
    let style = style.descriptor();
    format!(
        "You are a visionary fashion director and photographer.

INPUTS:
1. Model Reference (first image): use it strictly for the model's FACE, HAIR, SKIN TONE and BODY PROPORTIONS.
   - CRITICAL: the facial identity must remain consistent with this image.
   - IGNORE the clothes the model is wearing in this image. You are replacing them.
2. Product References (subsequent images): these are the MANDATORY HERO ITEMS the model is wearing.
   - CRITICAL: preserve exact details, logos, textures and cuts of these items. Do not invent different versions.

GENERATION TASK:
Create a cohesive, high-fashion editorial image.
1. Dress the model: fit the Product References onto the model in the specified pose.
2. Complete the styling: generate a new outfit for the rest of the body (pants, shoes, accessories, outerwear) that complements the hero products.
   - The generated clothing must match the requested \"{style}\" aesthetic.
   - Do not leave the model in mismatched or casual clothes from the original photo. The entire outfit must be cohesive.

ART DIRECTION:
- Pose: {pose}
- Aesthetic: {style}
- Framing: 3:4 portrait editorial frame.
- Quality: photorealistic, highest available resolution, highly detailed textures, dramatic editorial lighting.
"
    )
}

/// Inline image part with any `data:<mime>;base64,` prefix stripped.
pub fn inline_image_part(payload: &str) -> Value {
    let parts = split_data_url(payload);
    json!({
        "inlineData": {
            "mimeType": parts.mime_type.unwrap_or(DEFAULT_INPUT_MIME),
            "data": parts.payload,
        }
    })
}
