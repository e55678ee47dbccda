// SPDX-License-Identifier: MPL-2.0

//! Rich text facet extraction for AT Protocol posts.
//!
//! Reads the facets array and embed of a decoded post record and derives
//! hashtags, mentioned DIDs, links and the image count. Pure, no network calls;
//! turning mentioned DIDs into handles is [`crate::identity`]'s job.

use crate::atproto::types::{FacetFeature, FeedPostRecord, RecordEmbed};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostMetadata {
    pub hashtags: Vec<String>,
    /// DIDs exactly as they appear in mention facets.
    pub mentioned_dids: Vec<String>,
    pub external_links: Vec<String>,
    pub image_count: usize,
    pub has_external_links: bool,
}

/// Walk every feature of every facet in source order. Duplicates are kept.
pub fn extract_post_metadata(post: &FeedPostRecord) -> PostMetadata {
    let mut metadata = PostMetadata::default();

    let features = post
        .facets
        .iter()
        .flatten()
        .flat_map(|facet| facet.features.iter());

    for feature in features {
        match feature {
            FacetFeature::Tag { tag } => metadata.hashtags.push(tag.clone()),
            FacetFeature::Mention { did } => metadata.mentioned_dids.push(did.clone()),
            FacetFeature::Link { uri } => metadata.external_links.push(uri.clone()),
            FacetFeature::Other => {}
        }
    }

    metadata.has_external_links = !metadata.external_links.is_empty();

    // Only plain image embeds count; video, external cards and quotes do not.
    metadata.image_count = match &post.embed {
        Some(RecordEmbed::Images { images }) => images.len(),
        _ => 0,
    };

    metadata
}

/// URI of the thread root, or empty if the post is not a reply.
pub fn reply_root(post: &FeedPostRecord) -> String {
    post.reply
        .as_ref()
        .and_then(|r| r.root.as_ref())
        .map(|r| r.uri.clone())
        .unwrap_or_default()
}

/// URI of the direct parent, or empty if the post is not a reply.
pub fn reply_parent(post: &FeedPostRecord) -> String {
    post.reply
        .as_ref()
        .and_then(|r| r.parent.as_ref())
        .map(|r| r.uri.clone())
        .unwrap_or_default()
}
