use url::Url;

/// Extracts the host (with an explicit port, if any) from a URL
///
/// The host is lowercased; `www.` is kept, because the forum serves different
/// cookies on the bare and `www` hosts and links must stay on the one the
/// session is logged in to.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use forum_archiver::url::extract_host;
///
/// let url = Url::parse("https://WWW.Example.com/path").unwrap();
/// assert_eq!(extract_host(&url), Some("www.example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(extract_host(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Returns true if `candidate` is served from the same host as `site`
pub fn is_same_host(candidate: &Url, site: &Url) -> bool {
    match (extract_host(candidate), extract_host(site)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// String form of [`is_same_host`]; unparseable URLs are never same-host
pub fn is_same_site(candidate: &str, site: &Url) -> bool {
    Url::parse(candidate)
        .map(|url| is_same_host(&url, site))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Url {
        Url::parse("https://www.thetechgame.com/").unwrap()
    }

    #[test]
    fn test_extract_simple_host() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_host_with_port() {
        let url = Url::parse("https://example.com:8443/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com:8443".to_string()));
    }

    #[test]
    fn test_default_port_is_dropped() {
        let url = Url::parse("https://example.com:443/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_uppercase_converted_to_lowercase() {
        let url = Url::parse("https://EXAMPLE.COM/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_no_host() {
        let url = Url::parse("mailto:someone@example.com").unwrap();
        assert_eq!(extract_host(&url), None);
    }

    #[test]
    fn test_same_site() {
        assert!(is_same_site(
            "https://www.thetechgame.com/Forums/t=1/topic.html",
            &site()
        ));
        assert!(is_same_site("https://WWW.THETECHGAME.COM/user", &site()));
    }

    #[test]
    fn test_other_hosts_are_not_same_site() {
        assert!(!is_same_site("https://thetechgame.com/", &site()));
        assert!(!is_same_site("https://cdn.thetechgame.com/a.png", &site()));
        assert!(!is_same_site("https://example.com/", &site()));
        assert!(!is_same_site("javascript:void(0)", &site()));
        assert!(!is_same_site("not a url", &site()));
    }
}
