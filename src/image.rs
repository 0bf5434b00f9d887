use crate::cache::AttachmentCache;
use crate::error::Chat2PoeError;
use crate::models::poe::Attachment;
use crate::poe::PoeProvider;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Parse an inline `data:image/<subtype>[;params];base64,<payload>` reference
/// into decoded bytes and the raw subtype.
pub fn parse_image_data_url(image_url: &str) -> Result<(Vec<u8>, String), Chat2PoeError> {
    let rest = image_url
        .strip_prefix("data:image/")
        .ok_or_else(|| Chat2PoeError::InvalidImageEncoding(tail_of(image_url)))?;

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Chat2PoeError::InvalidImageEncoding(tail_of(image_url)))?;

    // The subtype runs until the first ';'; any parameters in between are
    // tolerated, but the header must declare base64 transport.
    let subtype = header.split(';').next().unwrap_or_default();
    if subtype.is_empty() || payload.is_empty() || !header.ends_with(";base64") {
        return Err(Chat2PoeError::InvalidImageEncoding(tail_of(image_url)));
    }

    let bytes = BASE64
        .decode(payload)
        .map_err(|e| Chat2PoeError::InvalidImageEncoding(format!("base64 decode failed: {e}")))?;
    Ok((bytes, subtype.to_string()))
}

/// Map MIME subtypes onto file extensions the upload endpoint recognizes.
fn normalize_image_format(image_format: &str) -> String {
    let lowered = image_format.to_ascii_lowercase();
    match lowered.as_str() {
        "jpeg" => "jpg".to_string(),
        "svg+xml" => "svg".to_string(),
        "x-icon" | "vnd.microsoft.icon" => "ico".to_string(),
        _ => lowered,
    }
}

/// Synthesize `img_<unix>_<6 random alnum>.<ext>` for an uploaded image.
fn generate_image_filename(image_format: &str) -> String {
    const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let mut rng = rand::thread_rng();
    let random: String = (0..6)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect();
    let extension = normalize_image_format(image_format);
    format!("img_{timestamp}_{random}.{extension}")
}

/// Last few characters of a source identifier, for logging without dumping
/// whole base64 payloads.
fn tail_of(image_url: &str) -> String {
    let tail: String = image_url
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{tail}")
}

/// Resolve an image source to an uploaded attachment, cache-assisted.
///
/// A cache hit never re-uploads. On a miss the inline data is decoded and
/// uploaded exactly once, and the resulting attachment is written back with
/// the configured TTL; the cache write is best-effort and a failure only
/// logs.
pub async fn resolve_image(
    image_url: &str,
    api_key: &str,
    provider: &dyn PoeProvider,
    cache: &dyn AttachmentCache,
    ttl: Duration,
) -> Result<Attachment, Chat2PoeError> {
    if let Some(cached) = cache.get(image_url) {
        tracing::info!("using cached attachment for image {}", tail_of(image_url));
        return Ok(cached);
    }

    tracing::info!("processing image from source {}", tail_of(image_url));
    let (bytes, image_format) = parse_image_data_url(image_url)?;
    let file_name = generate_image_filename(&image_format);
    let attachment = provider.upload(bytes, &file_name, api_key).await?;

    if !cache.set(image_url, &attachment, ttl) {
        tracing::warn!("failed to cache attachment for image {}", tail_of(image_url));
    }

    Ok(attachment)
}
