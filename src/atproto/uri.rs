// SPDX-License-Identifier: MPL-2.0

//! AT-URI parsing and conversion to bsky.app web URLs.
//!
//! The reverse direction (web URL to AT-URI) may need a handle lookup, so it
//! lives in [`crate::identity`].

use crate::config::WEB_HOST;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

pub const POST_COLLECTION: &str = "app.bsky.feed.post";

static DID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^did:[a-z]+:[a-zA-Z0-9._:%-]+$").unwrap());

static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9-]*[a-zA-Z0-9])?\.)+[a-zA-Z]([a-zA-Z0-9-]*[a-zA-Z0-9])?$")
        .unwrap()
});

/// Prefix test only. Anything starting with `did:` is treated as a DID and
/// never resolved.
pub fn is_did(s: &str) -> bool {
    s.starts_with("did:")
}

/// Full DID syntax check, used on caller-supplied DIDs before any call.
pub fn is_valid_did(s: &str) -> bool {
    DID_RE.is_match(s)
}

pub fn is_valid_handle(s: &str) -> bool {
    HANDLE_RE.is_match(s)
}

/// An account reference as a caller typed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Handle(String),
    Did(String),
}

impl Identifier {
    /// Classify by prefix. A leading `@` is dropped from handles.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if is_did(s) {
            Identifier::Did(s.to_string())
        } else {
            Identifier::Handle(s.trim_start_matches('@').to_string())
        }
    }
}

/// `at://<authority>/<collection>/<rkey>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtUri {
    pub authority: String,
    pub collection: String,
    pub rkey: String,
}

impl AtUri {
    /// Parse the exact five-segment form produced by splitting on `/`:
    /// `["at:", "", authority, collection, rkey]`.
    pub fn parse(uri: &str) -> Option<Self> {
        let parts: Vec<&str> = uri.split('/').collect();
        let [scheme, empty, authority, collection, rkey] = parts.as_slice() else {
            return None;
        };
        if *scheme != "at:" || !empty.is_empty() {
            return None;
        }
        Some(Self {
            authority: authority.to_string(),
            collection: collection.to_string(),
            rkey: rkey.to_string(),
        })
    }

    pub fn post(did: &str, rkey: &str) -> Self {
        Self {
            authority: did.to_string(),
            collection: POST_COLLECTION.to_string(),
            rkey: rkey.to_string(),
        }
    }

    pub fn web_url(&self) -> String {
        format!(
            "https://{WEB_HOST}/profile/{}/post/{}",
            self.authority, self.rkey
        )
    }
}

impl fmt::Display for AtUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at://{}/{}/{}", self.authority, self.collection, self.rkey)
    }
}

/// Convert an AT-URI to its bsky.app URL. Anything that is not a five-segment
/// URI comes back unchanged. The collection is dropped, so non-post records
/// produce a post-shaped URL.
pub fn to_web_url(uri: &str) -> String {
    match AtUri::parse(uri) {
        Some(at_uri) => at_uri.web_url(),
        None => uri.to_string(),
    }
}
