// SPDX-License-Identifier: MPL-2.0

use crate::atproto::uri::POST_COLLECTION;
use serde::Deserialize;

/// Decoupled from atrium's internal representation so we own the API boundary.
/// Held in memory only; tokens never leave the process.
#[derive(Clone)]
pub struct Session {
    pub host: String,
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
    pub refresh_jwt: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("did", &self.did)
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token. `None` (or empty) means this was the last page.
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, cursor: Option<String>) -> Self {
        Self { items, cursor }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            cursor: None,
        }
    }
}

/// A post as returned by feed, search and thread views. The record body is
/// kept as raw JSON and decoded with [`PostRecord::decode`].
#[derive(Debug, Clone)]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author_did: String,
    pub author_handle: String,
    pub record: serde_json::Value,
    pub indexed_at: String,
    pub like_count: Option<i64>,
    pub repost_count: Option<i64>,
}

/// Counts are only present on detailed profile views; list views (followers,
/// follows) leave them `None`.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub indexed_at: Option<String>,
    pub followers_count: Option<i64>,
    pub follows_count: Option<i64>,
    pub posts_count: Option<i64>,
    pub avatar: Option<String>,
    pub banner: Option<String>,
}

/// Record payload of a post view, decided once at decode time.
#[derive(Debug, Clone)]
pub enum PostRecord {
    FeedPost(FeedPostRecord),
    Unsupported { kind: String },
}

impl PostRecord {
    pub fn decode(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        match value.get("$type").and_then(serde_json::Value::as_str) {
            Some(POST_COLLECTION) => Ok(PostRecord::FeedPost(FeedPostRecord::deserialize(value)?)),
            Some(kind) => Ok(PostRecord::Unsupported {
                kind: kind.to_string(),
            }),
            None => Ok(PostRecord::Unsupported {
                kind: "<missing $type>".to_string(),
            }),
        }
    }
}

/// `app.bsky.feed.post`, reduced to the fields rows are built from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPostRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub facets: Option<Vec<Facet>>,
    #[serde(default)]
    pub embed: Option<RecordEmbed>,
    #[serde(default)]
    pub reply: Option<ReplyRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Facet {
    #[serde(default)]
    pub features: Vec<FacetFeature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention { did: String },
    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },
    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: String },
    #[serde(other)]
    Other,
}

/// Embed as stored on the record (not the hydrated view). Only image embeds
/// are distinguished.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "$type")]
pub enum RecordEmbed {
    #[serde(rename = "app.bsky.embed.images")]
    Images {
        #[serde(default)]
        images: Vec<serde_json::Value>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRef {
    #[serde(default)]
    pub root: Option<StrongRef>,
    #[serde(default)]
    pub parent: Option<StrongRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrongRef {
    pub uri: String,
    #[serde(default)]
    pub cid: String,
}
