//! Client for the documented REST API: paginated listing of the account's
//! playlists and deletion by id.

use crate::api::guarded;
use crate::config::Endpoints;
use crate::error::Error;
use crate::headers::prepare::PreparedHeaders;
use crate::models::{Playlist, PrivacyStatus};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

const PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone)]
pub struct OfficialClient {
    http: reqwest::Client,
    base_url: String,
}

/// Failure from the paginated list call, remembering how many pages had
/// already come back. Backend fallback only applies before the first page.
#[derive(Debug)]
pub struct ListError {
    pub error: Error,
    pub pages_fetched: usize,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    #[serde(default)]
    items: Vec<PlaylistResource>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistResource {
    id: String,
    snippet: Option<Snippet>,
    status: Option<Status>,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
    #[serde(rename = "publishedAt", default)]
    published_at: String,
    thumbnails: Option<Thumbnails>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(rename = "privacyStatus")]
    privacy_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(rename = "itemCount")]
    item_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Thumbnails {
    standard: Option<Thumbnail>,
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl OfficialClient {
    pub fn new(endpoints: &Endpoints) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build().map_err(Error::from)?;
        Ok(Self {
            http,
            base_url: endpoints.official_base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch every page of the "my playlists" collection, 50 records per
    /// page, following `nextPageToken` until it disappears.
    pub async fn list(
        &self,
        prepared: &PreparedHeaders,
        cancel: &CancellationToken,
    ) -> Result<Vec<Playlist>, ListError> {
        let mut playlists = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages_fetched = 0usize;

        loop {
            let page = self
                .fetch_page(prepared, page_token.as_deref(), cancel)
                .await
                .map_err(|error| ListError {
                    error,
                    pages_fetched,
                })?;
            pages_fetched += 1;
            playlists.extend(page.items.into_iter().map(to_playlist));
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(
            pages = pages_fetched,
            playlists = playlists.len(),
            "official list complete"
        );
        Ok(playlists)
    }

    pub async fn delete(
        &self,
        id: &str,
        prepared: &PreparedHeaders,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let url = format!(
            "{}/playlists?id={}",
            self.base_url,
            urlencoding::encode(id)
        );
        let headers = prepared.to_reqwest()?;
        let request = async {
            let resp = self.http.delete(&url).headers(headers).send().await?;
            let status = resp.status();
            let body = resp.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };
        let (status, body) = guarded(cancel, request).await?;
        if !status.is_success() {
            return Err(Error::upstream(status.as_u16(), &body));
        }
        Ok(())
    }

    async fn fetch_page(
        &self,
        prepared: &PreparedHeaders,
        page_token: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<PlaylistPage, Error> {
        let mut url = format!(
            "{}/playlists?part=snippet,contentDetails,status&mine=true&maxResults={PAGE_SIZE}",
            self.base_url
        );
        if let Some(token) = page_token {
            url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
        }
        let headers = prepared.to_reqwest()?;
        let request = async {
            let resp = self.http.get(&url).headers(headers).send().await?;
            let status = resp.status();
            let body = resp.text().await?;
            Ok::<_, reqwest::Error>((status, body))
        };
        let (status, body) = guarded(cancel, request).await?;
        if !status.is_success() {
            return Err(Error::upstream(status.as_u16(), &body));
        }
        serde_json::from_str(&body)
            .map_err(|e| Error::Unknown(format!("unexpected playlists response: {e}")))
    }
}

fn to_playlist(item: PlaylistResource) -> Playlist {
    let snippet = item.snippet.unwrap_or_default();
    let privacy = item
        .status
        .and_then(|s| s.privacy_status)
        .map(|s| PrivacyStatus::parse(&s))
        .unwrap_or(PrivacyStatus::Unknown);
    let item_count = item
        .content_details
        .and_then(|c| c.item_count)
        .unwrap_or(0);
    // highest available resolution wins
    let thumbnail_url = snippet.thumbnails.and_then(|t| {
        t.standard
            .or(t.high)
            .or(t.medium)
            .or(t.default)
            .map(|thumb| thumb.url)
    });

    Playlist {
        id: item.id,
        title: snippet.title,
        description: snippet.description,
        channel_title: snippet.channel_title,
        privacy,
        item_count,
        updated_at: snippet.published_at,
        thumbnail_url,
    }
}
