//! Tree walking for the internal API's browse responses.
//!
//! The response is a provider-shaped JSON document whose layout drifts across
//! locales and experiments, so playlist records are located by structural
//! pattern matching instead of a fixed schema: a depth-first walk tests every
//! object node against a table of known renderer kinds and a table of known
//! continuation-token locations, descends through known container fields
//! first and every remaining object/array field as a catch-all.

use crate::models::{Playlist, PrivacyStatus};
use serde_json::Value;
use std::collections::HashSet;

/// Legacy renderer kinds that carry one playlist each.
const RENDERER_KINDS: &[&str] = &[
    "playlistRenderer",
    "gridPlaylistRenderer",
    "compactPlaylistRenderer",
    "playlistCardRenderer",
];

/// Newer view-model shape; only counts as a playlist when the content-type
/// marker (or, absent that, the metadata shape) says so.
const LOCKUP_VIEW_MODEL: &str = "lockupViewModel";
const LOCKUP_PLAYLIST_CONTENT_TYPE: &str = "LOCKUP_CONTENT_TYPE_PLAYLIST";

/// Known continuation-token locations, tried in order at every object node.
const CONTINUATION_PATHS: &[&str] = &[
    "/continuationItemRenderer/continuationEndpoint/continuationCommand/token",
    "/continuationEndpoint/continuationCommand/token",
    "/continuations/0/nextContinuationData/continuation",
    "/continuations/0/reloadContinuationData/continuation",
];

/// Wrapper fields descended into before the catch-all sweep.
const CONTAINER_FIELDS: &[&str] = &[
    "contents",
    "items",
    "tabs",
    "tabRenderer",
    "content",
    "sectionListRenderer",
    "itemSectionRenderer",
    "gridRenderer",
    "richGridRenderer",
    "shelfRenderer",
    "horizontalListRenderer",
    "continuationContents",
    "onResponseReceivedActions",
    "appendContinuationItemsAction",
];

/// Walk one browse page, appending playlists not yet in `seen` (discovery
/// order, first occurrence wins) and returning the page's continuation token
/// if any. `seen` is shared across pages by the caller.
pub fn scan_page(
    page: &Value,
    playlists: &mut Vec<Playlist>,
    seen: &mut HashSet<String>,
) -> Option<String> {
    let mut scan = Scan {
        playlists,
        seen,
        continuation: None,
        visited: HashSet::new(),
    };
    scan.walk(page);
    scan.continuation
}

struct Scan<'a> {
    playlists: &'a mut Vec<Playlist>,
    seen: &'a mut HashSet<String>,
    continuation: Option<String>,
    /// Object identities already visited. A freshly parsed document cannot
    /// alias, but the traversal must terminate even on graphs that do.
    visited: HashSet<usize>,
}

impl Scan<'_> {
    fn walk(&mut self, node: &Value) {
        match node {
            Value::Array(items) => {
                for item in items {
                    self.walk(item);
                }
            }
            Value::Object(map) => {
                let identity = map as *const serde_json::Map<String, Value> as usize;
                if !self.visited.insert(identity) {
                    return;
                }

                for kind in RENDERER_KINDS {
                    if let Some(renderer) = map.get(*kind) {
                        if let Some(playlist) = legacy_playlist(renderer) {
                            self.push(playlist);
                        }
                    }
                }
                if let Some(vm) = map.get(LOCKUP_VIEW_MODEL) {
                    if is_playlist_lockup(vm) {
                        if let Some(playlist) = lockup_playlist(vm) {
                            self.push(playlist);
                        }
                    }
                }

                // only the first token met in traversal order is kept; see
                // the continuation_first_token_wins test
                if self.continuation.is_none() {
                    self.continuation = continuation_at(node);
                }

                for field in CONTAINER_FIELDS {
                    if let Some(child) = map.get(*field) {
                        self.walk(child);
                    }
                }
                for (name, child) in map {
                    if CONTAINER_FIELDS.contains(&name.as_str()) {
                        continue;
                    }
                    if child.is_object() || child.is_array() {
                        self.walk(child);
                    }
                }
            }
            _ => {}
        }
    }

    fn push(&mut self, playlist: Playlist) {
        if self.seen.insert(playlist.id.clone()) {
            self.playlists.push(playlist);
        }
    }
}

fn continuation_at(node: &Value) -> Option<String> {
    CONTINUATION_PATHS.iter().find_map(|path| {
        node.pointer(path)
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    })
}

/// Coerce the provider's richtext variants into a plain string: a bare
/// string, `{simpleText}`, `{content}` or `{runs:[{text}]}` joined without
/// separators, first applicable form wins.
fn text_of(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(_) => {
            if let Some(s) = v.get("simpleText").and_then(Value::as_str) {
                return Some(s.to_string());
            }
            if let Some(s) = v.get("content").and_then(Value::as_str) {
                return Some(s.to_string());
            }
            if let Some(runs) = v.get("runs").and_then(Value::as_array) {
                let joined: String = runs
                    .iter()
                    .filter_map(|run| run.get("text").and_then(Value::as_str))
                    .collect();
                if !joined.is_empty() {
                    return Some(joined);
                }
            }
            None
        }
        _ => None,
    }
}

fn field_text(r: &Value, names: &[&str]) -> String {
    names
        .iter()
        .find_map(|name| r.get(*name).and_then(text_of))
        .unwrap_or_default()
}

fn count_from_text(text: &str) -> u64 {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(0)
}

/// Convert a legacy renderer. A record without a resolvable id yields `None`
/// rather than an error.
fn legacy_playlist(r: &Value) -> Option<Playlist> {
    let id = r
        .get("playlistId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            r.pointer("/navigationEndpoint/browseEndpoint/browseId")
                .and_then(Value::as_str)
                .map(|s| s.strip_prefix("VL").unwrap_or(s).to_string())
                .filter(|s| !s.is_empty())
        })?;

    let item_count = match r.get("videoCount") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => count_from_text(s),
        _ => ["videoCountText", "videoCountShortText"]
            .iter()
            .find_map(|name| r.get(*name).and_then(text_of))
            .map(|t| count_from_text(&t))
            .unwrap_or(0),
    };

    Some(Playlist {
        id,
        title: field_text(r, &["title"]),
        description: field_text(r, &["description", "descriptionSnippet"]),
        channel_title: field_text(r, &["longBylineText", "shortBylineText", "ownerText"]),
        privacy: PrivacyStatus::Unknown,
        item_count,
        updated_at: field_text(r, &["publishedTimeText", "updatedAtText"]),
        thumbnail_url: legacy_thumbnail(r),
    })
}

fn legacy_thumbnail(r: &Value) -> Option<String> {
    let list = r
        .pointer("/thumbnail/thumbnails")
        .and_then(Value::as_array)
        .or_else(|| r.pointer("/thumbnails/0/thumbnails").and_then(Value::as_array))?;
    // last entry is the highest resolution
    let pick = list.last().or_else(|| list.first())?;
    pick.get("url").and_then(Value::as_str).map(str::to_string)
}

fn is_playlist_lockup(vm: &Value) -> bool {
    match vm.get("contentType").and_then(Value::as_str) {
        Some(content_type) => content_type == LOCKUP_PLAYLIST_CONTENT_TYPE,
        None => vm.pointer("/metadata/lockupMetadataViewModel").is_some(),
    }
}

/// Privacy keywords scanned against each metadata row, English and German.
const PRIVACY_KEYWORDS: &[(&str, PrivacyStatus)] = &[
    ("Private", PrivacyStatus::Private),
    ("Privat", PrivacyStatus::Private),
    ("Unlisted", PrivacyStatus::Unlisted),
    ("Nicht gelistet", PrivacyStatus::Unlisted),
    ("Public", PrivacyStatus::Public),
    ("Öffentlich", PrivacyStatus::Public),
];

fn lockup_playlist(vm: &Value) -> Option<Playlist> {
    let id = vm
        .get("contentId")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())?
        .to_string();

    let metadata = vm.pointer("/metadata/lockupMetadataViewModel");
    let title = metadata
        .and_then(|m| m.pointer("/title/content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let description = metadata
        .and_then(|m| m.pointer("/description/content"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut privacy = PrivacyStatus::Unknown;
    if let Some(rows) = metadata
        .and_then(|m| m.pointer("/metadata/contentMetadataViewModel/metadataRows"))
        .and_then(Value::as_array)
    {
        // first row with a recognized keyword wins
        for row in rows {
            if let Some(found) = privacy_from_text(&row_text(row)) {
                privacy = found;
                break;
            }
        }
    }

    Some(Playlist {
        id,
        title,
        description,
        channel_title: String::new(),
        privacy,
        item_count: lockup_item_count(vm),
        updated_at: String::new(),
        thumbnail_url: lockup_thumbnail(vm),
    })
}

fn row_text(row: &Value) -> String {
    row.get("metadataParts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.pointer("/text/content").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn privacy_from_text(text: &str) -> Option<PrivacyStatus> {
    PRIVACY_KEYWORDS
        .iter()
        .find(|(keyword, _)| text.contains(keyword))
        .map(|(_, privacy)| *privacy)
}

fn lockup_item_count(vm: &Value) -> u64 {
    let overlays = vm
        .pointer("/contentImage/collectionThumbnailViewModel/primaryThumbnail/thumbnailViewModel/overlays")
        .or_else(|| vm.pointer("/contentImage/thumbnailViewModel/overlays"))
        .and_then(Value::as_array);
    let Some(overlays) = overlays else { return 0 };
    for overlay in overlays {
        let badges = overlay
            .pointer("/thumbnailOverlayBadgeViewModel/thumbnailBadges")
            .and_then(Value::as_array);
        let Some(badges) = badges else { continue };
        for badge in badges {
            if let Some(text) = badge
                .pointer("/thumbnailBadgeViewModel/text")
                .and_then(Value::as_str)
            {
                return count_from_text(text);
            }
        }
    }
    0
}

fn lockup_thumbnail(vm: &Value) -> Option<String> {
    let sources = vm
        .pointer("/contentImage/collectionThumbnailViewModel/primaryThumbnail/thumbnailViewModel/image/sources")
        .or_else(|| vm.pointer("/contentImage/thumbnailViewModel/image/sources"))
        .and_then(Value::as_array)?;
    let pick = sources.last().or_else(|| sources.first())?;
    pick.get("url").and_then(Value::as_str).map(str::to_string)
}
