//! HTML building blocks for markup-rendered scenes.
//!
//! Every document is sized to the viewport with a full-bleed background
//! layer underneath absolutely positioned elements.

use std::path::Path;

use kumiki_models::{
    Background, BackgroundKind, Coordinate, ImageFit, Position, Resolution, TextContent,
};

/// Background used when a scene declares none.
pub const DEFAULT_BACKGROUND: &str = "#000000";

/// Escape text for element content; newlines become `<br>`.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape a value placed inside a double-quoted attribute or CSS string.
fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// CSS `background` value.
///
/// `image_url` replaces the declared value of an image background, e.g. with
/// a data URI for a local file.
pub fn background_value(background: Option<&Background>, image_url: Option<&str>) -> String {
    let Some(bg) = background else {
        return DEFAULT_BACKGROUND.to_string();
    };
    match bg.kind {
        BackgroundKind::Color | BackgroundKind::Gradient => bg.value.clone(),
        BackgroundKind::Image => {
            let url = image_url.unwrap_or(&bg.value);
            format!("url(\"{}\") center/cover no-repeat", escape_attr(url))
        }
    }
}

/// Complete page for a `viewport`-sized screenshot.
pub fn document(viewport: Resolution, background: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<style>
* {{ margin: 0; padding: 0; box-sizing: border-box; }}
html, body {{ width: {w}px; height: {h}px; overflow: hidden; }}
body {{ position: relative; }}
.scene-background {{ position: absolute; top: 0; left: 0; width: 100%; height: 100%; background: {bg}; }}
.layer {{ position: absolute; top: 0; left: 0; width: 100%; height: 100%; }}
</style>
</head>
<body>
<div class="scene-background"></div>
{body}
</body>
</html>"#,
        w = viewport.width,
        h = viewport.height,
        bg = background,
        body = body,
    )
}

/// Absolute placement; centered axes use a translate so the element's own
/// midpoint sits on the frame's midpoint.
pub fn position_styles(position: &Position) -> Vec<String> {
    let mut styles = vec!["position: absolute".to_string()];
    let mut translate = (false, false);

    match position.x {
        Coordinate::Pixels(x) => styles.push(format!("left: {}px", x)),
        Coordinate::Anchor(_) => {
            styles.push("left: 50%".to_string());
            translate.0 = true;
        }
    }
    match position.y {
        Coordinate::Pixels(y) => styles.push(format!("top: {}px", y)),
        Coordinate::Anchor(_) => {
            styles.push("top: 50%".to_string());
            translate.1 = true;
        }
    }

    match translate {
        (true, true) => styles.push("transform: translate(-50%, -50%)".to_string()),
        (true, false) => styles.push("transform: translateX(-50%)".to_string()),
        (false, true) => styles.push("transform: translateY(-50%)".to_string()),
        (false, false) => {}
    }
    styles
}

pub fn text_element(content: &TextContent) -> String {
    let style = &content.style;
    let mut styles = position_styles(&content.position);
    styles.extend([
        format!("font-family: '{}', sans-serif", escape_attr(&style.font_family)),
        format!("font-size: {}px", style.font_size),
        format!("color: {}", escape_attr(&style.color)),
        format!(
            "font-weight: {}",
            escape_attr(style.font_weight.as_deref().unwrap_or("normal"))
        ),
        format!(
            "text-align: {}",
            style.text_align.unwrap_or_default().as_str()
        ),
        "line-height: 1.5".to_string(),
        "white-space: pre-wrap".to_string(),
        "word-wrap: break-word".to_string(),
        "max-width: 90%".to_string(),
    ]);
    format!(
        r#"<div style="{}">{}</div>"#,
        styles.join("; "),
        escape_html(&content.text)
    )
}

fn fit_styles(fit: ImageFit) -> &'static [&'static str] {
    match fit {
        ImageFit::Cover => &["width: 100%", "height: 100%", "object-fit: cover"],
        ImageFit::Contain => &["object-fit: contain"],
        ImageFit::Fill => &["width: 100%", "height: 100%", "object-fit: fill"],
    }
}

pub fn image_element(src: &str, fit: ImageFit, position: &Position) -> String {
    let mut styles = position_styles(position);
    styles.extend(fit_styles(fit).iter().map(|s| s.to_string()));
    styles.push("max-width: 100%".to_string());
    styles.push("max-height: 100%".to_string());
    format!(
        r#"<img src="{}" style="{}" alt="" />"#,
        escape_attr(src),
        styles.join("; ")
    )
}

/// Full-frame wrapper for one composite layer.
pub fn layer(inner: &str, z_index: i32, opacity: f64) -> String {
    format!(
        r#"<div class="layer" style="z-index: {}; opacity: {};">{}</div>"#,
        z_index,
        opacity.clamp(0.0, 1.0),
        inner
    )
}

/// Image MIME type from the file extension, PNG when unknown.
pub fn image_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

/// `data:` URI for image bytes read from `path`.
pub fn data_uri(path: &Path, bytes: &[u8]) -> String {
    use base64::Engine;
    format!(
        "data:{};base64,{}",
        image_mime_type(path),
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
