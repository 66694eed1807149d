//! Address bar resolution
//!
//! - Full `http(s)://` URLs pass through
//! - Host-like text (`example.com`, `localhost:8080`, IP literals) gets `https://`
//! - `about:`, `file:` and `data:` pass through
//! - Anything else becomes a search

use std::net::IpAddr;

use url::Url;

pub const DEFAULT_SEARCH_ENGINE: &str = "https://www.google.com/search?q=%s";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Navigate(String),
    Search(String),
}

impl Resolution {
    /// The URL to hand to the backend either way.
    pub fn into_url(self) -> String {
        match self {
            Resolution::Navigate(url) | Resolution::Search(url) => url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AddressResolver {
    /// `%s` is replaced by the encoded query
    search_template: String,
}

impl AddressResolver {
    pub fn new(search_template: impl Into<String>) -> Self {
        Self {
            search_template: search_template.into(),
        }
    }

    pub fn search_template(&self) -> &str {
        &self.search_template
    }

    pub fn resolve(&self, input: &str) -> Resolution {
        let input = input.trim();
        if input.is_empty() {
            return Resolution::Navigate("about:blank".to_string());
        }

        match as_url(input) {
            Some(url) => Resolution::Navigate(url),
            None => Resolution::Search(self.search_url(input)),
        }
    }

    fn search_url(&self, query: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        self.search_template.replace("%s", &encoded)
    }
}

impl Default for AddressResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_ENGINE)
    }
}

fn as_url(input: &str) -> Option<String> {
    let lower = input.to_ascii_lowercase();

    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Url::parse(input).ok().map(|_| input.to_string());
    }
    if ["about:", "file:", "data:"].iter().any(|p| lower.starts_with(p)) {
        return Some(input.to_string());
    }
    if input.contains(char::is_whitespace) {
        return None;
    }

    let (host, rest) = split_host(input);
    let candidate = match parse_ip(host) {
        Some(IpAddr::V6(_)) if !host.starts_with('[') => format!("https://[{}]{}", host, rest),
        Some(_) => format!("https://{}{}", host, rest),
        None if is_hostname(host) => format!("https://{}{}", host, rest),
        None => return None,
    };

    Url::parse(&candidate).ok().map(|_| candidate)
}

/// Split at the first path, query or fragment delimiter.
fn split_host(input: &str) -> (&str, &str) {
    let cut = input.find(['/', '?', '#']).unwrap_or(input.len());
    input.split_at(cut)
}

fn parse_ip(host: &str) -> Option<IpAddr> {
    let bare = if let Some(bracketed) = host.strip_prefix('[') {
        bracketed.split(']').next().unwrap_or(bracketed)
    } else if host.matches(':').count() == 1 {
        // IPv4 with port
        host.split(':').next().unwrap_or(host)
    } else {
        host
    };
    bare.parse().ok()
}

/// `localhost[:port]` or a dotted name ending in an alphabetic TLD.
fn is_hostname(host: &str) -> bool {
    let name = host.split(':').next().unwrap_or(host);
    let port_ok = host
        .split_once(':')
        .map_or(true, |(_, port)| port.parse::<u16>().is_ok());
    if !port_ok {
        return false;
    }

    if name.eq_ignore_ascii_case("localhost") {
        return true;
    }

    let mut labels = name.split('.');
    let Some(tld) = labels.next_back() else {
        return false;
    };
    labels.next().is_some()
        && name.split('.').all(|label| !label.is_empty())
        && (2..=24).contains(&tld.len())
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn navigate(input: &str) -> String {
        match AddressResolver::default().resolve(input) {
            Resolution::Navigate(url) => url,
            Resolution::Search(url) => panic!("Expected navigation for {}, got search {}", input, url),
        }
    }

    #[test]
    fn test_full_urls_pass_through() {
        assert_eq!(navigate("https://example.com/a?b=c"), "https://example.com/a?b=c");
        assert_eq!(navigate("http://localhost:3000"), "http://localhost:3000");
        assert_eq!(navigate("about:blank"), "about:blank");
        assert_eq!(navigate("  "), "about:blank");
    }

    #[test]
    fn test_hosts_get_https() {
        assert_eq!(navigate("example.com"), "https://example.com");
        assert_eq!(navigate("docs.rs/tokio"), "https://docs.rs/tokio");
        assert_eq!(navigate("localhost:8080"), "https://localhost:8080");
        assert_eq!(navigate("192.168.1.10:8000/admin"), "https://192.168.1.10:8000/admin");
    }

    #[test]
    fn test_ipv6_hosts() {
        assert_eq!(navigate("::1"), "https://[::1]");
        assert_eq!(navigate("[::1]:8080"), "https://[::1]:8080");
        assert_eq!(navigate("2001:db8::1/path"), "https://[2001:db8::1]/path");
    }

    #[test]
    fn test_everything_else_searches() {
        let resolver = AddressResolver::default();

        assert_eq!(
            resolver.resolve("rust programming"),
            Resolution::Search("https://www.google.com/search?q=rust+programming".to_string())
        );
        assert_eq!(
            resolver.resolve("tokio"),
            Resolution::Search("https://www.google.com/search?q=tokio".to_string())
        );
        assert_eq!(
            resolver.resolve("version 1.2"),
            Resolution::Search("https://www.google.com/search?q=version+1.2".to_string())
        );
        assert!(matches!(resolver.resolve("a&b=c"), Resolution::Search(url) if url.ends_with("a%26b%3Dc")));
    }

    #[test]
    fn test_custom_search_engine() {
        let resolver = AddressResolver::new("https://duckduckgo.com/?q=%s");
        assert_eq!(
            resolver.resolve("hello world").into_url(),
            "https://duckduckgo.com/?q=hello+world"
        );
    }
}
