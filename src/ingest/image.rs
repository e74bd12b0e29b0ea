// src/ingest/image.rs
//! Cover-image lookup on the article page when the feed carries none.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (compatible; matchday-desk/0.1)";

fn meta_patterns() -> &'static [Regex] {
    static PATTERNS: OnceCell<Vec<Regex>> = OnceCell::new();
    PATTERNS.get_or_init(|| {
        // property/name before content, then the reversed attribute order
        [
            r#"(?is)<meta[^>]+(?:property|name)\s*=\s*["']og:image["'][^>]*content\s*=\s*["']([^"']+)["']"#,
            r#"(?is)<meta[^>]+content\s*=\s*["']([^"']+)["'][^>]*(?:property|name)\s*=\s*["']og:image["']"#,
            r#"(?is)<meta[^>]+(?:property|name)\s*=\s*["']twitter:image["'][^>]*content\s*=\s*["']([^"']+)["']"#,
            r#"(?is)<meta[^>]+content\s*=\s*["']([^"']+)["'][^>]*(?:property|name)\s*=\s*["']twitter:image["']"#,
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    })
}

/// First `og:image`, else `twitter:image`, from raw HTML.
pub fn extract_cover_image(html: &str) -> Option<String> {
    meta_patterns().iter().find_map(|re| {
        re.captures(html)
            .and_then(|c| c.get(1))
            .map(|m| html_escape::decode_html_entities(m.as_str().trim()).to_string())
            .filter(|u| u.starts_with("http"))
    })
}

/// Fetch `url` and look for a cover image. Any failure is `None`.
pub async fn scrape_cover_image(client: &reqwest::Client, url: &str) -> Option<String> {
    let resp = client
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        tracing::debug!(target: "ingest", %url, status = %resp.status(), "cover scrape non-2xx");
        return None;
    }
    let body = resp.text().await.ok()?;
    extract_cover_image(&body)
}
