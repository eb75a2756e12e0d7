//! Client for the undocumented web-client API: a `browse` call over the
//! account's playlists feed with opaque continuation tokens, and a dedicated
//! `playlist/delete` action. Every request carries a client-context block
//! derived from the prepared headers; its shape is a wire contract, so every
//! field is reproduced even where nothing on our side reads it back.

use crate::api::{extract, guarded};
use crate::config::Endpoints;
use crate::error::Error;
use crate::headers::prepare::{DEFAULT_CLIENT_VERSION, PreparedHeaders};
use crate::headers::{CLIENT_NAME, CLIENT_VERSION, DEFAULT_ORIGIN, VISITOR_ID};
use crate::models::Playlist;
use serde_json::{Value, json};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Synthetic browse target for the account's "your playlists" feed.
const PLAYLISTS_BROWSE_ID: &str = "FEplaylist_aggregation";
const PLAYLISTS_FEED_PATH: &str = "/feed/playlists";
const DEFAULT_REGION: &str = "US";

#[derive(Debug, Clone)]
pub struct InnertubeClient {
    http: reqwest::Client,
    base_url: String,
}

impl InnertubeClient {
    pub fn new(endpoints: &Endpoints) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build().map_err(Error::from)?;
        Ok(Self {
            http,
            base_url: endpoints.innertube_base.trim_end_matches('/').to_string(),
        })
    }

    /// Browse the playlists feed, following continuation tokens until the
    /// response stops producing one. Records are de-duplicated by id across
    /// pages, first occurrence wins.
    pub async fn list(
        &self,
        prepared: &PreparedHeaders,
        cancel: &CancellationToken,
    ) -> Result<Vec<Playlist>, Error> {
        let context = client_context(prepared);
        let mut playlists = Vec::new();
        let mut seen = HashSet::new();
        let mut continuation: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let body = match &continuation {
                Some(token) => json!({ "context": context.clone(), "continuation": token }),
                None => json!({ "context": context.clone(), "browseId": PLAYLISTS_BROWSE_ID }),
            };
            let page = self.post_json("browse", prepared, &body, cancel).await?;
            pages += 1;
            match extract::scan_page(&page, &mut playlists, &mut seen) {
                Some(token) => {
                    if continuation.as_deref() == Some(token.as_str()) {
                        // upstream occasionally echoes the consumed token back
                        break;
                    }
                    continuation = Some(token);
                }
                None => break,
            }
        }

        tracing::debug!(pages, playlists = playlists.len(), "browse complete");
        Ok(playlists)
    }

    pub async fn delete(
        &self,
        id: &str,
        prepared: &PreparedHeaders,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let body = json!({ "context": client_context(prepared), "playlistId": id });
        self.post_json("playlist/delete", prepared, &body, cancel)
            .await?;
        Ok(())
    }

    async fn post_json(
        &self,
        path: &str,
        prepared: &PreparedHeaders,
        body: &Value,
        cancel: &CancellationToken,
    ) -> Result<Value, Error> {
        let url = format!("{}/{path}?prettyPrint=false", self.base_url);
        let headers = prepared.to_reqwest()?;
        let request = async {
            let resp = self
                .http
                .post(&url)
                .headers(headers)
                .json(body)
                .send()
                .await?;
            let status = resp.status();
            let text = resp.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };
        let (status, text) = guarded(cancel, request).await?;
        if !status.is_success() {
            return Err(Error::upstream(status.as_u16(), &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| Error::Unknown(format!("unexpected {path} response: {e}")))
    }
}

/// Display names for the numeric client-name header. Unrecognized codes fall
/// back to WEB.
fn client_name_for_code(code: &str) -> &'static str {
    match code.trim() {
        "1" => "WEB",
        "2" => "MWEB",
        "3" => "ANDROID",
        "5" => "IOS",
        "7" => "TVHTML5",
        "62" => "WEB_CREATOR",
        "67" => "WEB_REMIX",
        _ => "WEB",
    }
}

/// `hl`/`gl` from an Accept-Language value: first comma-delimited entry, with
/// the region taken from the two-letter subtag after the hyphen when present.
fn locale_from_accept_language(value: &str) -> (String, String) {
    let first = value
        .split(',')
        .next()
        .unwrap_or("")
        .split(';')
        .next()
        .unwrap_or("")
        .trim();
    if first.is_empty() {
        return ("en".to_string(), DEFAULT_REGION.to_string());
    }
    let region = first
        .split('-')
        .nth(1)
        .filter(|r| r.len() == 2)
        .map(|r| r.to_uppercase())
        .unwrap_or_else(|| DEFAULT_REGION.to_string());
    (first.to_string(), region)
}

fn client_context(prepared: &PreparedHeaders) -> Value {
    let version = prepared
        .get(CLIENT_VERSION)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_CLIENT_VERSION);
    let name_code = prepared.get(CLIENT_NAME).unwrap_or("1");
    let (hl, gl) = locale_from_accept_language(prepared.get("Accept-Language").unwrap_or(""));
    let origin = prepared
        .get("X-Origin")
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or(DEFAULT_ORIGIN);

    json!({
        "client": {
            "clientName": client_name_for_code(name_code),
            "clientVersion": version,
            "hl": hl,
            "gl": gl,
            "visitorData": prepared.get(VISITOR_ID).unwrap_or(""),
            "userAgent": prepared.get("User-Agent").unwrap_or(""),
            "originalUrl": format!("{}{PLAYLISTS_FEED_PATH}", origin.trim_end_matches('/')),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headers::{AUTHORIZATION, COOKIE, HeaderMap, prepare::prepare};

    fn prepared() -> PreparedHeaders {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, "SAPISIDHASH 1_a");
        map.insert(COOKIE, "SAPISID=x");
        prepare(&map).unwrap()
    }

    fn client(server: &mockito::Server) -> InnertubeClient {
        InnertubeClient::new(&Endpoints {
            official_base: server.url(),
            innertube_base: server.url(),
        })
        .unwrap()
    }

    fn page(ids: &[&str], token: Option<&str>) -> String {
        let mut contents: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "playlistRenderer": { "playlistId": id, "title": { "simpleText": id } } }))
            .collect();
        if let Some(token) = token {
            contents.push(json!({ "continuationItemRenderer": {
                "continuationEndpoint": { "continuationCommand": { "token": token } }
            }}));
        }
        json!({ "contents": contents }).to_string()
    }

    #[test]
    fn test_client_name_lookup() {
        assert_eq!(client_name_for_code("1"), "WEB");
        assert_eq!(client_name_for_code(" 67 "), "WEB_REMIX");
        assert_eq!(client_name_for_code("7"), "TVHTML5");
        assert_eq!(client_name_for_code("999"), "WEB");
        assert_eq!(client_name_for_code(""), "WEB");
    }

    #[test]
    fn test_locale_parsing() {
        assert_eq!(
            locale_from_accept_language("de-DE,de;q=0.9,en;q=0.8"),
            ("de-DE".to_string(), "DE".to_string())
        );
        assert_eq!(
            locale_from_accept_language("en"),
            ("en".to_string(), "US".to_string())
        );
        assert_eq!(
            locale_from_accept_language("en-US"),
            ("en-US".to_string(), "US".to_string())
        );
        assert_eq!(
            locale_from_accept_language(""),
            ("en".to_string(), "US".to_string())
        );
        // malformed region subtags fall back to the default
        assert_eq!(
            locale_from_accept_language("zh-Hant-TW"),
            ("zh-Hant-TW".to_string(), "US".to_string())
        );
    }

    #[test]
    fn test_client_context_reproduces_every_field() {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, "SAPISIDHASH 1_a");
        map.insert(COOKIE, "SAPISID=x");
        map.insert("X-Youtube-Client-Name", "67");
        map.insert("X-Youtube-Client-Version", "1.20250101.01.00");
        map.insert("X-Goog-Visitor-Id", "CgtWaXNpdG9y");
        map.insert("Accept-Language", "de-DE,de;q=0.9");
        map.insert("User-Agent", "Mozilla/5.0");
        map.insert("X-Origin", "https://www.youtube.com/");
        let ctx = client_context(&prepare(&map).unwrap());

        let client = &ctx["client"];
        assert_eq!(client["clientName"], "WEB_REMIX");
        assert_eq!(client["clientVersion"], "1.20250101.01.00");
        assert_eq!(client["hl"], "de-DE");
        assert_eq!(client["gl"], "DE");
        assert_eq!(client["visitorData"], "CgtWaXNpdG9y");
        assert_eq!(client["userAgent"], "Mozilla/5.0");
        assert_eq!(
            client["originalUrl"],
            "https://www.youtube.com/feed/playlists"
        );
    }

    #[test]
    fn test_client_context_defaults() {
        let ctx = client_context(&prepared());
        let client = &ctx["client"];
        assert_eq!(client["clientName"], "WEB");
        assert_eq!(client["clientVersion"], DEFAULT_CLIENT_VERSION);
        assert_eq!(client["hl"], "en");
        assert_eq!(client["gl"], "US");
        assert_eq!(client["visitorData"], "");
        assert_eq!(
            client["originalUrl"],
            "https://www.youtube.com/feed/playlists"
        );
    }

    #[tokio::test]
    async fn test_list_follows_continuations_and_dedups() {
        let mut server = mockito::Server::new_async().await;
        let m1 = server
            .mock("POST", "/browse")
            .match_query(mockito::Matcher::UrlEncoded(
                "prettyPrint".into(),
                "false".into(),
            ))
            .match_body(mockito::Matcher::PartialJson(
                json!({ "browseId": PLAYLISTS_BROWSE_ID }),
            ))
            .with_status(200)
            .with_body(page(&["PL1", "PL2"], Some("tok2")))
            .expect(1)
            .create_async()
            .await;
        let m2 = server
            .mock("POST", "/browse")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(
                json!({ "continuation": "tok2" }),
            ))
            .with_status(200)
            .with_body(page(&["PL1", "PL3"], None))
            .expect(1)
            .create_async()
            .await;

        let playlists = client(&server)
            .list(&prepared(), &CancellationToken::new())
            .await
            .unwrap();

        m1.assert_async().await;
        m2.assert_async().await;
        let ids: Vec<&str> = playlists.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["PL1", "PL2", "PL3"]);
    }

    #[tokio::test]
    async fn test_list_stops_on_echoed_token() {
        let mut server = mockito::Server::new_async().await;
        let _m1 = server
            .mock("POST", "/browse")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(
                json!({ "browseId": PLAYLISTS_BROWSE_ID }),
            ))
            .with_status(200)
            .with_body(page(&["PL1"], Some("tok")))
            .expect(1)
            .create_async()
            .await;
        let m2 = server
            .mock("POST", "/browse")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(
                json!({ "continuation": "tok" }),
            ))
            .with_status(200)
            .with_body(page(&["PL2"], Some("tok")))
            .expect(1)
            .create_async()
            .await;

        let playlists = client(&server)
            .list(&prepared(), &CancellationToken::new())
            .await
            .unwrap();
        m2.assert_async().await;
        assert_eq!(playlists.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_posts_playlist_id() {
        let mut server = mockito::Server::new_async().await;
        let m = server
            .mock("POST", "/playlist/delete")
            .match_query(mockito::Matcher::UrlEncoded(
                "prettyPrint".into(),
                "false".into(),
            ))
            .match_body(mockito::Matcher::PartialJson(
                json!({ "playlistId": "PL9" }),
            ))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        client(&server)
            .delete("PL9", &prepared(), &CancellationToken::new())
            .await
            .unwrap();
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_failure_surfaces_status() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/browse")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"message":"bad context"}}"#)
            .create_async()
            .await;

        let err = client(&server)
            .list(&prepared(), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            Error::Upstream { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "bad context");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
