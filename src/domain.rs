/// URL and text helpers shared by the grouping pipeline
use url::Url;

use crate::tab_data::Tab;

/// Schemes whose pages can be grouped and read
const GROUPABLE_SCHEMES: [&str; 2] = ["http", "https"];

/// Parse a tab URL, returning None for anything unparseable
pub fn parse_url(url: &str) -> Option<Url> {
    Url::parse(url.trim()).ok()
}

/// True for ordinary web pages (http/https)
///
/// chrome://, chrome-extension://, about:, file:// and friends are
/// protected or internal and are never touched.
pub fn is_groupable_url(url: &str) -> bool {
    let trimmed = url.trim_start().to_ascii_lowercase();
    GROUPABLE_SCHEMES
        .iter()
        .any(|scheme| trimmed.starts_with(&format!("{}://", scheme)))
}

/// The canonical "valid tabs" view: web pages only
pub fn valid_tabs(tabs: &[Tab]) -> Vec<Tab> {
    tabs.iter()
        .filter(|tab| is_groupable_url(&tab.url))
        .cloned()
        .collect()
}

/// Lowercased hostname of a URL, without port
pub fn hostname(url: &str) -> Option<String> {
    parse_url(url)
        .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
        .filter(|host| !host.is_empty())
}

/// Key under which two tabs count as duplicates
///
/// Algorithm:
/// 1. Parse the URL and take its hostname (None if it doesn't parse)
/// 2. Lowercase and trim the title
/// 3. Join as "title|hostname"
///
/// Examples:
/// - ("Lakers win ", http://espn.com/a) → "lakers win|espn.com"
/// - ("Lakers Win", https://espn.com/b) → "lakers win|espn.com"
pub fn dedupe_key(tab: &Tab) -> Option<String> {
    let host = hostname(&tab.url)?;
    Some(format!("{}|{}", tab.title.trim().to_lowercase(), host))
}

/// Truncate to at most `max` characters, never splitting a char
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
