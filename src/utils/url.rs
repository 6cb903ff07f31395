// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Resolve a potentially relative URL against a base URL string.
///
/// # Examples
/// ```
/// use promopilot::utils::url::resolve;
///
/// assert_eq!(
///     resolve("https://example.com/path/", "page.html"),
///     Some("https://example.com/path/page.html".to_string())
/// );
/// ```
pub fn resolve(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}

/// Extract the lowercased domain from a URL string.
///
/// # Examples
/// ```
/// use promopilot::utils::url::get_domain;
///
/// assert_eq!(
///     get_domain("https://Example.COM/path"),
///     Some("example.com".to_string())
/// );
/// ```
pub fn get_domain(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

/// Whether a URL uses an http(s) scheme.
pub fn is_http(url: &str) -> bool {
    matches!(
        Url::parse(url).map(|u| u.scheme().to_string()),
        Ok(scheme) if scheme == "http" || scheme == "https"
    )
}

/// Origin (scheme + host + port) of a URL, without a trailing slash.
pub fn origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let origin = match parsed.port() {
        Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
        None => format!("{}://{}", parsed.scheme(), host),
    };
    Some(origin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_absolute_url() {
        assert_eq!(
            resolve("https://example.com/path/", "https://other.com/page"),
            Some("https://other.com/page".to_string())
        );
    }

    #[test]
    fn test_resolve_absolute_path() {
        assert_eq!(
            resolve("https://example.com/path/", "/root.html"),
            Some("https://example.com/root.html".to_string())
        );
    }

    #[test]
    fn test_resolve_relative_path() {
        assert_eq!(
            resolve("https://example.com/path/index.html", "other.html"),
            Some("https://example.com/path/other.html".to_string())
        );
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://Example.COM/path"),
            Some("example.com".to_string())
        );
        assert_eq!(get_domain("not a url"), None);
    }

    #[test]
    fn test_is_http() {
        assert!(is_http("https://example.com"));
        assert!(is_http("http://example.com"));
        assert!(!is_http("ftp://example.com"));
        assert!(!is_http("javascript:void(0)"));
    }

    #[test]
    fn test_origin() {
        assert_eq!(
            origin("https://example.com/a/b?q=1"),
            Some("https://example.com".to_string())
        );
        assert_eq!(
            origin("http://example.com:8080/a"),
            Some("http://example.com:8080".to_string())
        );
    }
}
