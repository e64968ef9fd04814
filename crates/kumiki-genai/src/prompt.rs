//! Image prompt enhancement.

use kumiki_models::{ImageGenerationParams, ImageStyle};

fn style_descriptor(style: ImageStyle) -> &'static str {
    match style {
        ImageStyle::Photorealistic => {
            "photorealistic, high quality photograph, professional photography"
        }
        ImageStyle::Illustration => "digital illustration, artistic style, clean and modern",
        ImageStyle::Anime => "anime style, japanese animation, manga art",
        ImageStyle::Sketch => "pencil sketch, hand drawn, artistic sketch",
    }
}

fn aspect_descriptor(aspect_ratio: &str) -> Option<&'static str> {
    match aspect_ratio {
        "16:9" => Some("widescreen format, horizontal orientation"),
        "9:16" => Some("vertical format, portrait orientation"),
        "1:1" => Some("square format"),
        "4:3" => Some("standard format"),
        _ => None,
    }
}

/// Append style and framing descriptors to the user's prompt.
pub fn enhance_prompt(params: &ImageGenerationParams) -> String {
    let mut parts = vec![params.prompt.as_str(), style_descriptor(params.style)];
    if let Some(aspect) = aspect_descriptor(&params.aspect_ratio) {
        parts.push(aspect);
    }
    format!("{}.", parts.join(". "))
}
