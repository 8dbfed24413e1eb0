//! Cover image encoding and export helpers.

use base64::Engine;

const FALLBACK_MIME: &str = "image/png";

/// Encode raw image bytes as a displayable data URI.
///
/// The MIME type is sniffed from the payload; `declared` is used when the
/// bytes are not recognised.
pub fn encode_data_uri(bytes: &[u8], declared: Option<&str>) -> String {
    let mime = infer::get(bytes)
        .filter(|kind| kind.matcher_type() == infer::MatcherType::Image)
        .map(|kind| kind.mime_type().to_string())
        .or_else(|| declared.map(str::to_string))
        .unwrap_or_else(|| FALLBACK_MIME.to_string());
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Decode a `data:<mime>;base64,<payload>` reference.
pub fn decode_data_uri(data_uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = data_uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload)
        .ok()?;
    Some((mime.to_string(), bytes))
}

/// File name offered when the user downloads the cover.
pub fn cover_file_name(title: &str) -> String {
    let title = title.trim();
    let stem: String = if title.is_empty() {
        "track".to_string()
    } else {
        title
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                _ => c,
            })
            .collect()
    };
    format!("{}-cover.jpg", stem)
}

/// True when the declared content type names an image.
pub fn is_image_content_type(content_type: &str) -> bool {
    content_type.trim().to_ascii_lowercase().starts_with("image/")
}
