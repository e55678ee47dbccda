// SPDX-License-Identifier: MPL-2.0

mod client;
pub mod facets;
mod types;
pub mod uri;

pub use client::{Authenticator, Remote, XrpcAuthenticator, XrpcRemote};
pub use facets::{PostMetadata, extract_post_metadata};
pub use types::{
    Facet, FacetFeature, FeedPostRecord, Page, PostRecord, PostView, Profile, RecordEmbed,
    ReplyRef, Session, StrongRef,
};
pub use uri::{AtUri, Identifier};
