//! URL construction for discovery endpoints.
//!
//! Pure functions; path segments taken from caller input are percent-encoded.

use mcprt_core::Page;
use url::Url;

const API_PREFIX: &str = "api/mcp";

/// Join `segments` onto the base URL path.
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    let base_path = url.path().trim_end_matches('/').to_string();
    let tail = segments
        .iter()
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    url.set_path(&format!("{base_path}/{API_PREFIX}/{tail}"));
    url.set_query(None);
    url
}

fn with_page(mut url: Url, page: Page) -> Url {
    url.query_pairs_mut()
        .append_pair("limit", &page.limit.to_string())
        .append_pair("offset", &page.offset.to_string());
    url
}

pub fn tool_search_url(base: &Url) -> Url {
    endpoint(base, &["tools", "search"])
}

pub fn server_search_url(base: &Url) -> Url {
    endpoint(base, &["servers", "search"])
}

pub fn server_info_url(base: &Url, server_name: &str) -> Url {
    endpoint(base, &["servers", server_name])
}

pub fn server_tools_url(base: &Url, server_name: &str, page: Page) -> Url {
    with_page(endpoint(base, &["servers", server_name, "tools"]), page)
}

pub fn tool_details_url(base: &Url, server_name: &str, tool_name: &str) -> Url {
    endpoint(base, &["servers", server_name, "tools", tool_name])
}

pub fn list_servers_url(base: &Url, page: Page) -> Url {
    with_page(endpoint(base, &["servers"]), page)
}

pub fn statistics_url(base: &Url) -> Url {
    endpoint(base, &["statistics"])
}

pub fn startup_config_url(base: &Url, server_name: &str) -> Url {
    endpoint(base, &["servers", server_name, "command"])
}
