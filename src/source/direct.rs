use super::SourceResolver;

/// Single-URL mode: the identifier already is the media URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectResolver;

impl SourceResolver for DirectResolver {
    fn resolve(&self, identifier: &str, _credential: Option<&str>) -> Vec<String> {
        vec![identifier.to_string()]
    }

    fn view_url(&self, identifier: &str) -> Option<String> {
        Some(identifier.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_the_identifier_only() {
        let urls = DirectResolver.resolve("https://cdn.example.com/a.mp3", Some("ignored-key"));
        assert_eq!(urls, vec!["https://cdn.example.com/a.mp3".to_string()]);
    }
}
