use crate::error::Error;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

pub mod prepare;

pub const AUTHORIZATION: &str = "Authorization";
pub const COOKIE: &str = "Cookie";
pub const VISITOR_ID: &str = "X-Goog-Visitor-Id";
pub const CLIENT_NAME: &str = "X-Youtube-Client-Name";
pub const CLIENT_VERSION: &str = "X-Youtube-Client-Version";

pub const DEFAULT_ORIGIN: &str = "https://www.youtube.com";

/// Canonicalize a header name: each `-`-delimited segment lowercased, first
/// character uppercased. Idempotent over any non-empty string.
pub fn normalize(name: &str) -> String {
    name.split('-')
        .map(|seg| {
            let lower = seg.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Header map with canonical capitalization. Lookups accept any casing;
/// duplicate inserts keep the last value.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    inner: BTreeMap<String, String>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.inner.insert(normalize(name), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(&normalize(name)).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Parse pasted request headers: one `Name: value` per line, blank lines and
/// `#` comments skipped. Later lines win over earlier ones.
pub fn parse_raw(text: &str) -> HeaderMap {
    let mut map = HeaderMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        map.insert(name, value.trim());
    }
    map
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Official,
    Internal,
}

/// Pure classification of a header map. `select_backend` turns this into a
/// usable backend or a validation error; keeping the two steps separate lets
/// tests enumerate Authorization shapes without any network setup.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub backend: Option<Backend>,
    /// Authorization was present but matched neither credential shape.
    pub malformed_authorization: bool,
    pub missing: Vec<&'static str>,
    pub advisory: Vec<&'static str>,
}

pub fn classify(headers: &HeaderMap) -> Classification {
    let mut c = Classification::default();
    let auth = headers.get(AUTHORIZATION).map(str::trim).unwrap_or("");

    if auth.is_empty() {
        c.missing.push(AUTHORIZATION);
        return c;
    }

    if is_bearer(auth) {
        c.backend = Some(Backend::Official);
        return c;
    }

    if is_session_hash(auth) {
        c.backend = Some(Backend::Internal);
        if headers.get(COOKIE).map(str::trim).unwrap_or("").is_empty() {
            c.missing.push(COOKIE);
        }
        if headers.get(VISITOR_ID).map(str::trim).unwrap_or("").is_empty() {
            c.advisory.push(VISITOR_ID);
        }
        if headers.get(CLIENT_VERSION).map(str::trim).unwrap_or("").is_empty() {
            c.advisory.push(CLIENT_VERSION);
        }
        return c;
    }

    c.malformed_authorization = true;
    c
}

pub fn select_backend(c: &Classification) -> Result<Backend, Error> {
    if c.malformed_authorization {
        return Err(Error::Validation(
            "Authorization is neither a Bearer token nor a SAPISIDHASH value".into(),
        ));
    }
    if !c.missing.is_empty() {
        return Err(Error::Validation(format!(
            "missing required header(s): {}",
            c.missing.join(", ")
        )));
    }
    c.backend
        .ok_or_else(|| Error::Validation("no backend could be selected".into()))
}

fn is_bearer(auth: &str) -> bool {
    match auth.split_once(char::is_whitespace) {
        Some((scheme, value)) => scheme == "Bearer" && !value.trim().is_empty(),
        None => false,
    }
}

fn is_session_hash(auth: &str) -> bool {
    match auth.split_once(char::is_whitespace) {
        Some((scheme, value)) => {
            scheme.eq_ignore_ascii_case("sapisidhash") && !value.trim().is_empty()
        }
        None => false,
    }
}

/// Fill in Authorization from the session cookie when the pasted headers
/// carry a SAPISID but no Authorization line. The web client signs requests
/// the same way: `SAPISIDHASH <unix-ts>_<sha1(ts + sapisid + origin)>`.
pub fn derive_session_authorization(headers: &mut HeaderMap) {
    if !headers.get(AUTHORIZATION).map(str::trim).unwrap_or("").is_empty() {
        return;
    }
    let Some(sapisid) = headers.get(COOKIE).and_then(sapisid_from_cookie) else {
        return;
    };
    let origin = headers
        .get("X-Origin")
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or(DEFAULT_ORIGIN)
        .to_string();
    headers.insert(AUTHORIZATION, make_session_hash(&origin, &sapisid));
}

fn sapisid_from_cookie(cookie: &str) -> Option<String> {
    // SAPISID with __Secure-3PAPISID as fallback, same as the web client.
    for name in ["SAPISID", "__Secure-3PAPISID"] {
        let found = cookie
            .split(';')
            .filter_map(|part| part.trim().split_once('='))
            .find(|(k, v)| *k == name && !v.is_empty());
        if let Some((_, v)) = found {
            return Some(v.to_string());
        }
    }
    None
}

fn make_session_hash(origin: &str, sapisid: &str) -> String {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let input = format!("{ts} {sapisid} {origin}");
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    let out = hasher.finalize();
    format!("SAPISIDHASH {ts}_{}", hex::encode(out))
}
