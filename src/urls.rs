use url::Url;

/// Trims the input and assumes `https://` when no scheme was given.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let has_scheme = ["http://", "https://"].iter().any(|scheme| {
        trimmed
            .get(..scheme.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
    });
    if has_scheme {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// Lowercased host with any leading `www.` removed.
pub fn site_host(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

pub fn domain_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(site_host).filter(|host| !host.is_empty())
}

/// True when `candidate` is `domain` itself or one of its subdomains.
pub fn is_same_site(candidate: &str, domain: &str) -> bool {
    candidate == domain
        || candidate
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url(" http://example.com/a "), "http://example.com/a");
    }

    #[test]
    fn test_normalize_url_uppercase_scheme() {
        assert_eq!(normalize_url("HTTPS://Example.com"), "HTTPS://Example.com");
        assert_eq!(normalize_url("Http://example.com"), "Http://example.com");
        assert_eq!(normalize_url("héllo.example"), "https://héllo.example");
    }

    #[test]
    fn test_domain_of_strips_www() {
        assert_eq!(domain_of("https://WWW.Example.com/path").as_deref(), Some("example.com"));
        assert_eq!(domain_of("not a url"), None);
    }

    #[test]
    fn test_is_same_site() {
        assert!(is_same_site("example.com", "example.com"));
        assert!(is_same_site("blog.example.com", "example.com"));
        assert!(!is_same_site("notexample.com", "example.com"));
        assert!(!is_same_site("example.com.evil.io", "example.com"));
    }
}
