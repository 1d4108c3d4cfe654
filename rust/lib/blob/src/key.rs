//! Key naming and content types for uploaded images.

const TYPES: &[(&str, &str)] = &[
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("bmp", "image/bmp"),
];

/// File extension for an image content type, if it is one we store.
///
/// Only raster formats are stored; SVG can carry script and is refused.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence == "image/jpg" {
        return Some("jpg");
    }
    TYPES.iter().find(|(_, ct)| *ct == essence).map(|(ext, _)| *ext)
}

/// Content type to serve a stored key with, derived from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let ext = if ext == "jpeg" { "jpg".to_string() } else { ext };
    TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, ct)| *ct)
        .unwrap_or("application/octet-stream")
}

/// Fresh key `{namespace}/{uuid}.{ext}` for a new upload.
pub fn upload_key(namespace: &str, ext: &str) -> String {
    format!("{}/{}.{}", namespace, uuid::Uuid::new_v4().simple(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("IMAGE/JPEG; charset=binary"), Some("jpg"));
        assert_eq!(extension_for("image/jpg"), Some("jpg"));
        assert_eq!(extension_for("text/plain"), None);
        assert_eq!(extension_for("image/svg+xml"), None);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("tweets/a.png"), "image/png");
        assert_eq!(content_type_for("avatars/b.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
        assert_eq!(content_type_for("tweets/c.svg"), "application/octet-stream");
    }

    #[test]
    fn keys_are_unique_and_namespaced() {
        let a = upload_key("tweets", "png");
        let b = upload_key("tweets", "png");
        assert_ne!(a, b);
        assert!(a.starts_with("tweets/"));
        assert!(a.ends_with(".png"));
        assert!(!a.contains('-'));
    }
}
