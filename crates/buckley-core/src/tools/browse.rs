//! URL fetch tool
//!
//! Plain HTTP GET with a fixed 15 second timeout, hand-rolled HTML text
//! extraction, and up to ten absolutized links. No scripting, no sessions;
//! the browser_* tools cover interactive pages.

use regex::Regex;
use serde_json::{json, Value};
use std::time::Duration;

use crate::error::ToolError;
use crate::exec::ExecContext;
use crate::params::{int_param, required_str, string_param};
use crate::result::ToolResult;
use crate::tools::{BoxFuture, Tool};

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MAX_LENGTH: i64 = 4000;
const MAX_MAX_LENGTH: i64 = 20_000;
const MAX_LINKS: usize = 10;

/// Tool fetching a page and extracting readable text
#[derive(Default)]
pub struct BrowseUrl;

impl BrowseUrl {
    pub fn new() -> Self {
        Self
    }
}

/// Strip script/style blocks and tags, collapsing whitespace.
pub(crate) fn extract_text_from_html(html: &str) -> String {
    let script = Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("static regex");
    let style = Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("static regex");
    let script_stripped = script.replace_all(html, " ");
    let cleaned = style.replace_all(&script_stripped, " ");

    let mut text = String::with_capacity(cleaned.len());
    let mut in_tag = false;
    for c in cleaned.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            c if !in_tag => text.push(c),
            _ => {}
        }
    }

    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Contents of the first `<tag>...</tag>` pair, for simple tag selectors.
pub(crate) fn extract_tag(html: &str, tag: &str) -> Option<String> {
    let pattern = Regex::new(&format!(
        r"(?is)<{tag}[^>]*>(.*?)</{tag}>",
        tag = regex::escape(tag)
    ))
    .ok()?;
    pattern
        .captures(html)
        .map(|c| extract_text_from_html(&c[1]))
}

/// Up to [`MAX_LINKS`] href targets, absolutized against the page URL.
pub(crate) fn extract_links(html: &str, base: &url::Url) -> Vec<String> {
    let href = Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("static regex");
    let mut links = Vec::new();
    for captures in href.captures_iter(html) {
        let raw = &captures[1];
        if raw.starts_with('#') || raw.starts_with("javascript:") {
            continue;
        }
        if let Ok(absolute) = base.join(raw) {
            let absolute = absolute.to_string();
            if !links.contains(&absolute) {
                links.push(absolute);
            }
        }
        if links.len() >= MAX_LINKS {
            break;
        }
    }
    links
}

impl Tool for BrowseUrl {
    fn name(&self) -> &str {
        "browse_url"
    }

    fn description(&self) -> &str {
        "Fetch a URL and return its readable text plus up to ten links. \
         Optionally extract only one HTML tag (e.g. selector='title')."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http(s) URL to fetch"
                },
                "selector": {
                    "type": "string",
                    "description": "Tag name to extract instead of the whole page"
                },
                "max_length": {
                    "type": "integer",
                    "description": "Cap on returned text length (1-20000, default 4000)",
                    "default": 4000
                }
            },
            "required": ["url"]
        })
    }

    fn execute_with_context(
        &self,
        _ctx: ExecContext,
        params: Value,
    ) -> BoxFuture<'_, Result<ToolResult, ToolError>> {
        Box::pin(async move {
            let raw_url = required_str(&params, "url")?;
            let selector = string_param(&params, "selector");
            let max_length = int_param(&params, "max_length", DEFAULT_MAX_LENGTH)
                .clamp(1, MAX_MAX_LENGTH) as usize;

            let parsed = url::Url::parse(raw_url)
                .map_err(|e| ToolError::InvalidParams(format!("invalid URL: {}", e)))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ToolError::InvalidParams(
                    "only HTTP and HTTPS URLs are supported".into(),
                ));
            }

            let client = reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .user_agent("Buckley/1.0")
                .build()
                .map_err(|e| ToolError::ExecutionFailed(format!("client setup failed: {}", e)))?;

            let response = client
                .get(parsed.clone())
                .send()
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("fetch failed: {}", e)))?;

            let status = response.status();
            let final_url = response.url().to_string();
            if !status.is_success() {
                return Err(ToolError::ExecutionFailed(format!(
                    "HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("error")
                )));
            }

            let content_type = response
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
            let body = response
                .text()
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("read failed: {}", e)))?;

            let is_html = content_type.contains("text/html") || body.trim_start().starts_with('<');
            let (text, links) = if is_html {
                let text = if selector.is_empty() {
                    extract_text_from_html(&body)
                } else {
                    extract_tag(&body, &selector).ok_or_else(|| {
                        ToolError::NotFound(format!("no <{}> element found", selector))
                    })?
                };
                (text, extract_links(&body, &parsed))
            } else {
                (body, Vec::new())
            };

            let truncated = text.chars().count() > max_length;
            let final_text: String = text.chars().take(max_length).collect();

            Ok(ToolResult::ok()
                .with("url", raw_url)
                .with("final_url", final_url)
                .with("content_type", content_type)
                .with("text", final_text)
                .with("truncated", truncated)
                .with("links", links))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_strips_tags_and_scripts() {
        let html = "<html><head><script>var x = 1;</script><style>p{}</style></head>\
                    <body><h1>Title</h1><p>Hello &amp; welcome</p></body></html>";
        let text = extract_text_from_html(html);
        assert!(text.contains("Title"));
        assert!(text.contains("Hello & welcome"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("p{}"));
    }

    #[test]
    fn test_extract_tag() {
        let html = "<html><title>My Page</title><body>rest</body></html>";
        assert_eq!(extract_tag(html, "title").unwrap(), "My Page");
        assert!(extract_tag(html, "h1").is_none());
    }

    #[test]
    fn test_extract_links_absolutized_and_capped() {
        let base = url::Url::parse("https://example.com/docs/").unwrap();
        let mut html = String::from(r##"<a href="page.html">x</a><a href="#anchor">y</a>"##);
        for i in 0..20 {
            html.push_str(&format!(r#"<a href="/item/{}">z</a>"#, i));
        }
        let links = extract_links(&html, &base);
        assert_eq!(links.len(), MAX_LINKS);
        assert_eq!(links[0], "https://example.com/docs/page.html");
        assert_eq!(links[1], "https://example.com/item/0");
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let err = BrowseUrl::new()
            .execute(json!({"url": "not a url"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid URL"));
    }

    #[tokio::test]
    async fn test_non_http_scheme_rejected() {
        let err = BrowseUrl::new()
            .execute(json!({"url": "ftp://example.com/file"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP and HTTPS"));
    }
}
