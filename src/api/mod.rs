//! The adapter façade. Callers hand in raw headers; the façade classifies
//! them, prepares the wire form, dispatches to the matching backend client
//! and falls back from the official to the internal API exactly once when
//! the official path rejects the credentials outright.

use crate::error::Error;
use crate::headers::prepare::{PreparedHeaders, prepare};
use crate::headers::{Backend, HeaderMap, classify, select_backend};
use crate::models::Playlist;
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub mod extract;
pub mod innertube;
pub mod official;

use innertube::InnertubeClient;
use official::OfficialClient;

#[derive(Debug, Clone)]
pub struct PlaylistAdapter {
    official: OfficialClient,
    innertube: InnertubeClient,
}

/// Outcome of a sequential batch delete: how many ids were deleted before
/// the run ended, and the error that ended it early, if any.
#[derive(Debug)]
pub struct BatchReport {
    pub completed: usize,
    pub error: Option<Error>,
}

impl BatchReport {
    pub fn cancelled(&self) -> bool {
        matches!(self.error, Some(Error::Cancelled))
    }
}

impl PlaylistAdapter {
    pub fn new(endpoints: &crate::config::Endpoints) -> Result<Self, Error> {
        Ok(Self {
            official: OfficialClient::new(endpoints)?,
            innertube: InnertubeClient::new(endpoints)?,
        })
    }

    /// List the account's playlists. Official-path order is whatever the
    /// upstream returned; internal-path order is discovery order with
    /// duplicates dropped.
    pub async fn list_playlists(
        &self,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<Vec<Playlist>, Error> {
        let (backend, prepared) = self.gate(headers)?;
        match backend {
            Backend::Official => match self.official.list(&prepared, cancel).await {
                Ok(playlists) => Ok(playlists),
                Err(fail) if fail.pages_fetched == 0 && fail.error.auth_rejected() => {
                    tracing::warn!(
                        "official API rejected the credentials, retrying via the web client API"
                    );
                    self.innertube.list(&prepared, cancel).await
                }
                Err(fail) => Err(fail.error),
            },
            Backend::Internal => self.innertube.list(&prepared, cancel).await,
        }
    }

    pub async fn delete_playlist(
        &self,
        id: &str,
        headers: &HeaderMap,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        let (backend, prepared) = self.gate(headers)?;
        match backend {
            Backend::Official => match self.official.delete(id, &prepared, cancel).await {
                Err(err) if err.auth_rejected() => {
                    tracing::warn!(
                        id,
                        "official API rejected the delete, retrying via the web client API"
                    );
                    self.innertube.delete(id, &prepared, cancel).await
                }
                other => other,
            },
            Backend::Internal => self.innertube.delete(id, &prepared, cancel).await,
        }
    }

    /// Delete ids one at a time, in order. The loop stops at the first
    /// failure or as soon as the token is cancelled; already-deleted
    /// playlists stay deleted. `progress` runs after each completed delete.
    pub async fn delete_playlists(
        &self,
        ids: &[String],
        headers: &HeaderMap,
        cancel: &CancellationToken,
        mut progress: impl FnMut(usize, &str),
    ) -> BatchReport {
        let mut completed = 0usize;
        for id in ids {
            if cancel.is_cancelled() {
                return BatchReport {
                    completed,
                    error: Some(Error::Cancelled),
                };
            }
            match self.delete_playlist(id, headers, cancel).await {
                Ok(()) => {
                    completed += 1;
                    progress(completed, id);
                }
                Err(error) => {
                    return BatchReport {
                        completed,
                        error: Some(error),
                    };
                }
            }
        }
        BatchReport {
            completed,
            error: None,
        }
    }

    fn gate(&self, headers: &HeaderMap) -> Result<(Backend, PreparedHeaders), Error> {
        let classification = classify(headers);
        let backend = select_backend(&classification)?;
        for name in &classification.advisory {
            tracing::warn!("header {name} is recommended but not set");
        }
        Ok((backend, prepare(headers)?))
    }
}

/// Race a request future against the cancellation token. Cancellation wins
/// ties so an already-tripped token never reaches the network.
pub(crate) async fn guarded<T, F>(cancel: &CancellationToken, request: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, reqwest::Error>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = request => result.map_err(Error::from),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Endpoints;
    use crate::headers::{AUTHORIZATION, COOKIE};
    use serde_json::json;

    fn bearer_headers() -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, "Bearer test-token");
        map
    }

    fn session_headers() -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, "SAPISIDHASH 1_a");
        map.insert(COOKIE, "SAPISID=x");
        map
    }

    fn adapter(server: &mockito::Server) -> PlaylistAdapter {
        PlaylistAdapter::new(&Endpoints {
            official_base: server.url(),
            innertube_base: server.url(),
        })
        .unwrap()
    }

    fn browse_page(ids: &[&str]) -> String {
        let contents: Vec<serde_json::Value> = ids
            .iter()
            .map(|id| json!({ "playlistRenderer": { "playlistId": id, "title": { "simpleText": id } } }))
            .collect();
        json!({ "contents": contents }).to_string()
    }

    #[tokio::test]
    async fn test_official_auth_failure_falls_back_to_internal() {
        let mut server = mockito::Server::new_async().await;
        let official = server
            .mock("GET", "/playlists")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_body(r#"{"error":{"message":"forbidden"}}"#)
            .expect(1)
            .create_async()
            .await;
        let internal = server
            .mock("POST", "/browse")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(browse_page(&["PL1"]))
            .expect(1)
            .create_async()
            .await;

        let playlists = adapter(&server)
            .list_playlists(&bearer_headers(), &CancellationToken::new())
            .await
            .unwrap();

        official.assert_async().await;
        internal.assert_async().await;
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].id, "PL1");
    }

    #[tokio::test]
    async fn test_no_fallback_on_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _official = server
            .mock("GET", "/playlists")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;
        let internal = server
            .mock("POST", "/browse")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = adapter(&server)
            .list_playlists(&bearer_headers(), &CancellationToken::new())
            .await
            .unwrap_err();
        internal.assert_async().await;
        assert!(matches!(err, Error::Upstream { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_internal_backend_skips_official_entirely() {
        let mut server = mockito::Server::new_async().await;
        let official = server
            .mock("GET", "/playlists")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let _internal = server
            .mock("POST", "/browse")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(browse_page(&["PL2"]))
            .create_async()
            .await;

        let playlists = adapter(&server)
            .list_playlists(&session_headers(), &CancellationToken::new())
            .await
            .unwrap();
        official.assert_async().await;
        assert_eq!(playlists[0].id, "PL2");
    }

    #[tokio::test]
    async fn test_validation_failure_never_reaches_network() {
        let mut server = mockito::Server::new_async().await;
        let any_official = server
            .mock("GET", "/playlists")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let any_internal = server
            .mock("POST", "/browse")
            .match_query(mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        // session hash without the required cookie
        let mut map = HeaderMap::new();
        map.insert(AUTHORIZATION, "SAPISIDHASH 1_a");
        let err = adapter(&server)
            .list_playlists(&map, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        any_official.assert_async().await;
        any_internal.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_falls_back_on_auth_rejection() {
        let mut server = mockito::Server::new_async().await;
        let official = server
            .mock("DELETE", "/playlists")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "PL1".into()))
            .with_status(401)
            .expect(1)
            .create_async()
            .await;
        let internal = server
            .mock("POST", "/playlist/delete")
            .match_query(mockito::Matcher::Any)
            .match_body(mockito::Matcher::PartialJson(json!({ "playlistId": "PL1" })))
            .with_status(200)
            .with_body("{}")
            .expect(1)
            .create_async()
            .await;

        adapter(&server)
            .delete_playlist("PL1", &bearer_headers(), &CancellationToken::new())
            .await
            .unwrap();
        official.assert_async().await;
        internal.assert_async().await;
    }

    #[tokio::test]
    async fn test_batch_delete_halts_on_first_failure() {
        let mut server = mockito::Server::new_async().await;
        let _first = server
            .mock("DELETE", "/playlists")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "PL1".into()))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let _second = server
            .mock("DELETE", "/playlists")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "PL2".into()))
            .with_status(500)
            .with_body("boom")
            .expect(1)
            .create_async()
            .await;
        let third = server
            .mock("DELETE", "/playlists")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "PL3".into()))
            .expect(0)
            .create_async()
            .await;

        let ids: Vec<String> = ["PL1", "PL2", "PL3"].iter().map(|s| s.to_string()).collect();
        let report = adapter(&server)
            .delete_playlists(&ids, &bearer_headers(), &CancellationToken::new(), |_, _| {})
            .await;

        third.assert_async().await;
        assert_eq!(report.completed, 1);
        assert!(matches!(
            report.error,
            Some(Error::Upstream { status: 500, .. })
        ));
        assert!(!report.cancelled());
    }

    #[tokio::test]
    async fn test_batch_delete_cancellation_reports_completed_count() {
        let mut server = mockito::Server::new_async().await;
        let _first = server
            .mock("DELETE", "/playlists")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "PL1".into()))
            .with_status(204)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("DELETE", "/playlists")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "PL2".into()))
            .expect(0)
            .create_async()
            .await;

        let cancel = CancellationToken::new();
        let trip = cancel.clone();
        let ids: Vec<String> = ["PL1", "PL2", "PL3"].iter().map(|s| s.to_string()).collect();
        let report = adapter(&server)
            .delete_playlists(&ids, &bearer_headers(), &cancel, move |_, _| {
                // operator hits ctrl-c right after the first delete lands
                trip.cancel();
            })
            .await;

        second.assert_async().await;
        assert_eq!(report.completed, 1);
        assert!(report.cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let server = mockito::Server::new_async().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = adapter(&server)
            .list_playlists(&bearer_headers(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
