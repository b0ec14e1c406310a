//! Media type classification.

const XML_TYPES: [&str; 4] = [
    "text/xml",
    "application/xml",
    "text/xml-external-parsed-entity",
    "application/xml-external-parsed-entity",
];

const TEXT_TYPES: [&str; 1] = ["application/xml-dtd"];

/// How content of a given media type is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Xml,
    Html,
    Text,
    Multipart,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// `type/subtype`, lower-cased.
    pub essence: String,
    pub charset: Option<String>,
}

impl MediaType {
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split(';');
        let essence = parts.next()?.trim().to_ascii_lowercase();
        let (main, sub) = essence.split_once('/')?;
        if main.is_empty() || sub.is_empty() {
            return None;
        }
        let charset = parts.find_map(|p| {
            let (key, value) = p.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches('"').to_string())
        });
        Some(Self { essence, charset })
    }

    pub fn kind(&self) -> MediaKind {
        let essence = self.essence.as_str();
        if essence == "text/html" {
            MediaKind::Html
        } else if essence.ends_with("+xml") || XML_TYPES.contains(&essence) {
            MediaKind::Xml
        } else if essence.starts_with("text/") || TEXT_TYPES.contains(&essence) {
            MediaKind::Text
        } else if essence.starts_with("multipart/") {
            MediaKind::Multipart
        } else {
            MediaKind::Binary
        }
    }
}

/// Classify a raw Content-Type value; unparsable values are binary.
pub fn media_kind(value: &str) -> MediaKind {
    MediaType::parse(value)
        .map(|m| m.kind())
        .unwrap_or(MediaKind::Binary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(media_kind("text/html; charset=utf-8"), MediaKind::Html);
        assert_eq!(media_kind("application/atom+xml"), MediaKind::Xml);
        assert_eq!(media_kind("Application/XML"), MediaKind::Xml);
        assert_eq!(media_kind("text/plain"), MediaKind::Text);
        assert_eq!(media_kind("application/xml-dtd"), MediaKind::Text);
        assert_eq!(media_kind("multipart/mixed; boundary=x"), MediaKind::Multipart);
        assert_eq!(media_kind("image/png"), MediaKind::Binary);
        assert_eq!(media_kind("garbage"), MediaKind::Binary);
    }

    #[test]
    fn test_charset_parameter() {
        let m = MediaType::parse("text/plain; Charset=\"ISO-8859-1\"").unwrap();
        assert_eq!(m.essence, "text/plain");
        assert_eq!(m.charset.as_deref(), Some("ISO-8859-1"));
    }
}
