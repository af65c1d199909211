//! Outbound request headers.
//!
//! The collection API throttles obviously-scripted traffic more
//! aggressively, so the default provider rotates browser-like User-Agent,
//! Accept-Language, and Referer values per request. This is a resilience
//! tactic against one provider's current behavior, not a security
//! boundary, so it sits behind a trait and can be swapped for a static
//! provider without touching scheduling or retry logic.

use std::sync::Arc;

/// Default User-Agent when rotation is disabled and no custom value is set.
pub const USER_AGENT: &str = "metlink/0.3 (github.com/monokrome/metlink)";

/// Real browser user agents for rotation (updated Nov 2024).
pub const BROWSER_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    // Chrome on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Firefox on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
    // Safari on Mac
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    // Edge on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

const ACCEPT_LANGUAGES: &[&str] = &[
    "en-US,en;q=0.9",
    "en-US,en;q=0.8",
    "en-GB,en;q=0.9",
    "en-US,en;q=0.9,fr;q=0.5",
];

const REFERERS: &[&str] = &[
    "https://www.metmuseum.org/",
    "https://www.metmuseum.org/art/collection",
    "https://www.google.com/",
];

/// Supplies the header set for one outbound request.
pub trait HeaderProvider: Send + Sync {
    fn headers(&self) -> Vec<(String, String)>;
}

/// Rotating browser-like headers (the default).
#[derive(Debug, Default)]
pub struct BrowserHeaders;

impl HeaderProvider for BrowserHeaders {
    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), pick(BROWSER_USER_AGENTS).to_string()),
            ("Accept-Language".to_string(), pick(ACCEPT_LANGUAGES).to_string()),
            ("Referer".to_string(), pick(REFERERS).to_string()),
            ("Origin".to_string(), "https://www.metmuseum.org".to_string()),
        ]
    }
}

/// Fixed headers with a caller-supplied User-Agent.
#[derive(Debug)]
pub struct StaticHeaders {
    user_agent: String,
}

impl StaticHeaders {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl Default for StaticHeaders {
    fn default() -> Self {
        Self::new(USER_AGENT)
    }
}

impl HeaderProvider for StaticHeaders {
    fn headers(&self) -> Vec<(String, String)> {
        vec![
            ("Accept".to_string(), "application/json".to_string()),
            ("User-Agent".to_string(), self.user_agent.clone()),
        ]
    }
}

/// Resolve the provider from config.
/// - None: rotate browser-like headers
/// - Some(blank): fixed crate user agent, no rotation
/// - Some(custom): fixed custom user agent, no rotation
pub fn resolve_provider(user_agent: Option<&str>) -> Arc<dyn HeaderProvider> {
    match user_agent {
        None => Arc::new(BrowserHeaders),
        Some(custom) if custom.trim().is_empty() => Arc::new(StaticHeaders::default()),
        Some(custom) => Arc::new(StaticHeaders::new(custom)),
    }
}

fn pick<'a>(items: &'a [&'a str]) -> &'a str {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as usize)
        .unwrap_or(0);
    items[nanos % items.len()]
}
