//! List loops for the two paging styles HuaweiCloud APIs use

use serde_json::Value;

use super::client::ServiceClient;
use super::common::QueryParams;
use super::error::ApiError;
use super::pathsearch;

/// Follow `page_info.next_marker` until the service stops returning one
pub async fn list_by_marker(
    client: &ServiceClient,
    path: &str,
    items_expr: &str,
    limit: u32,
) -> Result<Vec<Value>, ApiError> {
    let mut items = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let page_path = QueryParams::new()
            .add("limit", limit)
            .add_optional("marker", marker.as_deref())
            .append_to(path);
        let page = client.get(&page_path).await?;

        items.extend(pathsearch::search_array(items_expr, &page));

        match pathsearch::search_string("page_info.next_marker", &page) {
            Some(next) if !next.is_empty() && marker.as_deref() != Some(next.as_str()) => {
                marker = Some(next)
            }
            _ => break,
        }
    }

    Ok(items)
}

/// Advance `offset` by the page size until a short or empty page arrives
pub async fn list_by_offset(
    client: &ServiceClient,
    path: &str,
    items_expr: &str,
    limit: u32,
) -> Result<Vec<Value>, ApiError> {
    let mut items = Vec::new();
    let mut offset = 0u32;

    loop {
        let page_path = QueryParams::new()
            .add("limit", limit)
            .add("offset", offset)
            .append_to(path);
        let page = client.get(&page_path).await?;

        let page_items = pathsearch::search_array(items_expr, &page);
        let count = page_items.len() as u32;
        items.extend(page_items);

        if count < limit || count == 0 {
            break;
        }
        offset += count;
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::client::{Client, RetryConfig};
    use mockito::{Matcher, Server};

    fn service(url: &str) -> ServiceClient {
        let client = Client::with_config("AK", "SK", None, false, RetryConfig::default()).unwrap();
        ServiceClient::new(client, url, "p1", "d1")
    }

    #[tokio::test]
    async fn marker_pages_are_concatenated() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/v1/items")
            .match_query(Matcher::Regex("^limit=2$".into()))
            .with_status(200)
            .with_body(r#"{"value": [{"id": "a"}, {"id": "b"}], "page_info": {"next_marker": "m2"}}"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v1/items")
            .match_query(Matcher::UrlEncoded("marker".into(), "m2".into()))
            .with_status(200)
            .with_body(r#"{"value": [{"id": "c"}], "page_info": {"next_marker": null}}"#)
            .create_async()
            .await;

        let items = list_by_marker(&service(&server.url()), "v1/items", "value", 2)
            .await
            .unwrap();

        let ids: Vec<_> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn offset_stops_on_short_page() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/v2/p1/apigw/instances/i1/envs")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("name".into(), "RELEASE".into()),
                Matcher::UrlEncoded("offset".into(), "0".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"envs": [{"id": "e1"}, {"id": "e2"}]}"#)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/v2/p1/apigw/instances/i1/envs")
            .match_query(Matcher::UrlEncoded("offset".into(), "2".into()))
            .with_status(200)
            .with_body(r#"{"envs": [{"id": "e3"}]}"#)
            .create_async()
            .await;

        let items = list_by_offset(
            &service(&server.url()),
            "v2/{project_id}/apigw/instances/i1/envs?name=RELEASE",
            "envs",
            2,
        )
        .await
        .unwrap();

        assert_eq!(items.len(), 3);
        first.assert_async().await;
        second.assert_async().await;
    }
}
