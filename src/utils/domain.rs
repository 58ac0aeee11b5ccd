use std::sync::Arc;

use url::Url;

/// Hostname a page's time is attributed to.
pub type Domain = Arc<str>;

/// Schemes of the browser's own pages. Time spent there is never tracked.
const PRIVILEGED_SCHEMES: &[&str] = &[
    "chrome",
    "chrome-extension",
    "chrome-untrusted",
    "chrome-search",
    "devtools",
    "edge",
    "brave",
    "opera",
    "vivaldi",
    "about",
    "moz-extension",
    "view-source",
];

/// Maps a page url to the domain it should be tracked under. Returns `None` for anything that
/// can't be parsed, for browser internal pages and for urls without a host.
pub fn extract_domain(url: &str) -> Option<Domain> {
    let url = Url::parse(url).ok()?;
    if PRIVILEGED_SCHEMES.contains(&url.scheme()) {
        return None;
    }
    url.host_str()
        .filter(|host| !host.is_empty())
        .map(Domain::from)
}
