//! Request preparation: merge caller headers over the fixed defaults, then
//! rewrite the result into a deliverable form. Names a browser refuses to set
//! directly go out under carrier names (a rewriting proxy restores them in
//! transit; we only guarantee the encoding on the way out), and names no
//! delivery path can set are dropped outright.

use crate::error::Error;
use crate::headers::{AUTHORIZATION, DEFAULT_ORIGIN, HeaderMap};

pub const DEFAULT_CLIENT_VERSION: &str = "2.20250312.04.00";

const DEFAULT_HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json"),
    ("Content-Type", "application/json"),
    ("X-Goog-Authuser", "0"),
    ("X-Origin", DEFAULT_ORIGIN),
    ("X-Youtube-Client-Name", "1"),
    ("X-Youtube-Client-Version", DEFAULT_CLIENT_VERSION),
];

/// Restricted names delivered under `X-Carrier-*` instead.
const RESTRICTED: &[&str] = &["Cookie", "Origin", "Referer", "User-Agent", "Accept-Language"];

pub const CARRIER_PREFIX: &str = "X-Carrier-";

/// Names dropped entirely: connection management and anything under the two
/// reserved prefixes.
const DROPPED: &[&str] = &[
    "Host",
    "Connection",
    "Content-Length",
    "Keep-Alive",
    "Transfer-Encoding",
    "Upgrade",
    "Te",
    "Trailer",
];

const DROPPED_PREFIXES: &[&str] = &["Sec-", "Proxy-"];

/// Headers ready for the wire. `merged` keeps the caller-over-defaults view
/// under real names (the client-context block is derived from it); `delivery`
/// is the carrier-encoded form that actually goes on the request.
#[derive(Debug, Clone)]
pub struct PreparedHeaders {
    merged: HeaderMap,
    delivery: HeaderMap,
}

impl PreparedHeaders {
    /// Look up a merged header by its real (pre-carrier) name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.merged.get(name)
    }

    pub fn delivery(&self) -> &HeaderMap {
        &self.delivery
    }

    pub fn to_reqwest(&self) -> Result<reqwest::header::HeaderMap, Error> {
        let delivery = self.delivery();
        let mut out = reqwest::header::HeaderMap::with_capacity(delivery.len());
        for (name, value) in delivery.iter() {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::Validation(format!("bad header name {name:?}: {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| Error::Validation(format!("bad value for header {name:?}: {e}")))?;
            out.insert(name, value);
        }
        Ok(out)
    }
}

pub fn prepare(headers: &HeaderMap) -> Result<PreparedHeaders, Error> {
    let mut merged = HeaderMap::new();
    for (name, value) in DEFAULT_HEADERS {
        merged.insert(name, *value);
    }
    for (name, value) in headers.iter() {
        merged.insert(name, value);
    }

    if merged.get(AUTHORIZATION).map(str::trim).unwrap_or("").is_empty() {
        return Err(Error::Validation(
            "Authorization is empty after merging defaults".into(),
        ));
    }

    let mut delivery = HeaderMap::new();
    for (name, value) in merged.iter() {
        if is_dropped(name) {
            continue;
        }
        if RESTRICTED.contains(&name) {
            delivery.insert(&format!("{CARRIER_PREFIX}{name}"), value);
        } else {
            delivery.insert(name, value);
        }
    }

    Ok(PreparedHeaders { merged, delivery })
}

fn is_dropped(name: &str) -> bool {
    DROPPED.contains(&name) || DROPPED_PREFIXES.iter().any(|p| name.starts_with(p))
}
