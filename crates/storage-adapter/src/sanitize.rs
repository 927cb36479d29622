//! Upload name sanitisation

use uuid::Uuid;

/// Turns a client supplied file name into a safe plain name.
///
/// Directory components are stripped (both `/` and `\` count as
/// separators) and every character outside `[A-Za-z0-9_.-]` becomes `_`.
/// When nothing usable remains a random `image_<uuid>` name is generated,
/// with an extension derived from `content_type`.
///
/// ```
/// use storage_adapter::sanitize_filename;
///
/// assert_eq!(sanitize_filename(Some("../../etc/passwd"), "image/png"), "passwd");
/// assert_eq!(sanitize_filename(Some("my photo (1).jpg"), "image/jpeg"), "my_photo__1_.jpg");
/// ```
pub fn sanitize_filename(raw: Option<&str>, content_type: &str) -> String {
    let base = raw
        .unwrap_or("")
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or("");

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        generated_name(content_type)
    } else {
        cleaned
    }
}

fn generated_name(content_type: &str) -> String {
    let ext = if content_type.eq_ignore_ascii_case("image/png") {
        "png"
    } else {
        "jpg"
    };
    format!("image_{}.{}", Uuid::new_v4().simple(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_is_stripped() {
        for raw in ["../../etc/passwd", "..\\..\\windows\\win.ini", "/abs/path/x.png"] {
            let name = sanitize_filename(Some(raw), "image/png");
            assert!(!name.contains('/') && !name.contains('\\'), "{}", name);
            assert_ne!(name, "..");
        }
        assert_eq!(sanitize_filename(Some("a/b\\c.png"), "image/png"), "c.png");
    }

    #[test]
    fn test_empty_names_are_generated() {
        let png = sanitize_filename(None, "image/png");
        assert!(png.starts_with("image_") && png.ends_with(".png"));

        let jpg = sanitize_filename(Some("dir/"), "image/webp");
        assert!(jpg.starts_with("image_") && jpg.ends_with(".jpg"));

        assert!(sanitize_filename(Some(".."), "image/png").starts_with("image_"));
    }

    #[test]
    fn test_non_ascii_replaced() {
        assert_eq!(sanitize_filename(Some("café.png"), "image/png"), "caf_.png");
    }
}
