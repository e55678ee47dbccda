// SPDX-License-Identifier: MPL-2.0

use crate::atproto::facets::{reply_parent, reply_root};
use crate::atproto::uri::to_web_url;
use crate::atproto::{PostRecord, PostView, Profile, Remote, extract_post_metadata};
use crate::error::{Error, Result};
use crate::identity::resolve_dids_to_handles;
use serde::Serialize;

/// One post, flattened for output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostRow {
    pub uri: String,
    pub http_url: String,
    pub cid: String,
    /// Author handle.
    pub author: String,
    pub text: String,
    pub reply_root: String,
    pub reply_parent: String,
    pub created_at: String,
    pub indexed_at: String,
    pub like_count: Option<i64>,
    pub repost_count: Option<i64>,
    pub has_external_links: bool,
    pub image_count: usize,
    pub hashtags: Vec<String>,
    /// Mentioned DIDs, as found in the facets.
    pub mentioned_handles: Vec<String>,
    /// Same order as `mentioned_handles`; unresolved entries keep the DID.
    pub mentioned_handles_names: Vec<String>,
    pub external_links: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_did: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl PostRow {
    /// Decode the record, extract its metadata and resolve mentions.
    ///
    /// Mentioned DIDs are looked up one `getProfile` call each; lookups that
    /// fail leave the DID in place and never fail the row.
    pub async fn from_view(api: &dyn Remote, view: PostView) -> Result<Self> {
        let record = match PostRecord::decode(&view.record) {
            Ok(PostRecord::FeedPost(record)) => record,
            Ok(PostRecord::Unsupported { kind }) => {
                return Err(Error::UnsupportedRecord {
                    uri: view.uri,
                    kind,
                });
            }
            Err(e) => {
                return Err(Error::Upstream {
                    operation: "decodeRecord",
                    input: view.uri,
                    message: e.to_string(),
                });
            }
        };

        let metadata = extract_post_metadata(&record);
        let mentioned_handles_names = resolve_dids_to_handles(api, &metadata.mentioned_dids).await;

        Ok(Self {
            http_url: to_web_url(&view.uri),
            uri: view.uri,
            cid: view.cid,
            author: view.author_handle,
            reply_root: reply_root(&record),
            reply_parent: reply_parent(&record),
            text: record.text,
            created_at: record.created_at,
            indexed_at: view.indexed_at,
            like_count: view.like_count,
            repost_count: view.repost_count,
            has_external_links: metadata.has_external_links,
            image_count: metadata.image_count,
            hashtags: metadata.hashtags,
            mentioned_handles: metadata.mentioned_dids,
            mentioned_handles_names,
            external_links: metadata.external_links,
            ..Self::default()
        })
    }
}

/// One account, flattened for output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfileRow {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub indexed_at: Option<String>,
    pub follower_count: Option<i64>,
    pub following_count: Option<i64>,
    pub post_count: Option<i64>,
    pub avatar: Option<String>,
    pub banner: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_did: Option<String>,
}

impl From<Profile> for ProfileRow {
    fn from(profile: Profile) -> Self {
        Self {
            did: profile.did,
            handle: profile.handle,
            display_name: profile.display_name,
            description: profile.description,
            indexed_at: profile.indexed_at,
            follower_count: profile.followers_count,
            following_count: profile.follows_count,
            post_count: profile.posts_count,
            avatar: profile.avatar,
            banner: profile.banner,
            target_did: None,
        }
    }
}
