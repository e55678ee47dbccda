// SPDX-License-Identifier: MPL-2.0

use crate::atproto::types::{Page, PostView, Profile, Session};
use crate::config::APP_NAME;
use crate::error::RemoteError;
use async_trait::async_trait;
use atrium_api::agent::atp_agent::AtpAgent;
use atrium_api::agent::atp_agent::store::MemorySessionStore;
use atrium_api::types::LimitedNonZeroU8;
use atrium_api::types::string::{AtIdentifier, Handle};
use atrium_xrpc_client::reqwest::{ReqwestClient, ReqwestClientBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type Agent = AtpAgent<MemorySessionStore, ReqwestClient>;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The read-only slice of the Bluesky API the listings are built on.
///
/// Page sizes are passed through as-is; callers keep them within 1..=100.
#[async_trait]
pub trait Remote: Send + Sync {
    /// `com.atproto.identity.resolveHandle`
    async fn resolve_handle(&self, handle: &str) -> Result<String, RemoteError>;

    /// `app.bsky.actor.getProfile` (detailed view, with counts)
    async fn get_profile(&self, actor: &str) -> Result<Profile, RemoteError>;

    /// `app.bsky.feed.getAuthorFeed`
    async fn get_author_feed(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<PostView>, RemoteError>;

    /// `app.bsky.feed.searchPosts`
    async fn search_posts(
        &self,
        query: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<PostView>, RemoteError>;

    /// `app.bsky.graph.getFollowers`
    async fn get_followers(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<Profile>, RemoteError>;

    /// `app.bsky.graph.getFollows`
    async fn get_follows(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<Profile>, RemoteError>;

    /// `app.bsky.feed.getPostThread`, reduced to the anchor post. `None` when
    /// the thread view is a not-found or blocked stub.
    async fn get_post_thread(&self, uri: &str) -> Result<Option<PostView>, RemoteError>;
}

/// Exchanges credentials for a session and a [`Remote`] bound to it.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn create_session(
        &self,
        host: &str,
        identifier: &str,
        password: &str,
    ) -> Result<(Session, Arc<dyn Remote>), RemoteError>;
}

/// Logs in over XRPC with an app password.
#[derive(Debug, Default)]
pub struct XrpcAuthenticator;

#[async_trait]
impl Authenticator for XrpcAuthenticator {
    async fn create_session(
        &self,
        host: &str,
        identifier: &str,
        password: &str,
    ) -> Result<(Session, Arc<dyn Remote>), RemoteError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Xrpc(e.to_string()))?;
        let client = ReqwestClientBuilder::new(host).client(http).build();
        let agent = AtpAgent::new(client, MemorySessionStore::default());

        debug!(host, identifier, "creating session");
        let result = agent
            .login(identifier, password)
            .await
            .map_err(|e| RemoteError::Xrpc(e.to_string()))?;

        let session = Session {
            host: host.to_string(),
            did: result.data.did.to_string(),
            handle: result.data.handle.to_string(),
            access_jwt: result.data.access_jwt.clone(),
            refresh_jwt: result.data.refresh_jwt.clone(),
        };

        Ok((session, Arc::new(XrpcRemote { agent })))
    }
}

/// Wraps atrium so the rest of the crate only sees our own types.
pub struct XrpcRemote {
    agent: Agent,
}

fn parse_actor(actor: &str) -> Result<AtIdentifier, RemoteError> {
    actor.parse().map_err(|_| RemoteError::InvalidInput {
        kind: "actor",
        value: actor.to_string(),
    })
}

fn page_limit(limit: u8) -> Option<LimitedNonZeroU8<100>> {
    LimitedNonZeroU8::try_from(limit).ok()
}

fn xrpc_error(e: impl std::fmt::Display) -> RemoteError {
    RemoteError::Xrpc(e.to_string())
}

fn non_empty_cursor(cursor: Option<String>) -> Option<String> {
    cursor.filter(|c| !c.is_empty())
}

impl XrpcRemote {
    /// Convert a PostView to our PostView, keeping the record as raw JSON
    fn convert_post_view(
        post_view: &atrium_api::app::bsky::feed::defs::PostView,
    ) -> Result<PostView, RemoteError> {
        let record = serde_json::to_value(&post_view.data.record).map_err(|e| {
            RemoteError::Xrpc(format!("undecodable record at {}: {e}", post_view.data.uri))
        })?;

        Ok(PostView {
            uri: post_view.data.uri.clone(),
            cid: post_view.data.cid.as_ref().to_string(),
            author_did: post_view.data.author.data.did.to_string(),
            author_handle: post_view.data.author.data.handle.to_string(),
            record,
            indexed_at: post_view.data.indexed_at.as_str().to_string(),
            like_count: post_view.data.like_count,
            repost_count: post_view.data.repost_count,
        })
    }

    fn convert_profile_view(view: &atrium_api::app::bsky::actor::defs::ProfileView) -> Profile {
        Profile {
            did: view.did.to_string(),
            handle: view.handle.to_string(),
            display_name: view.display_name.clone(),
            description: view.description.clone(),
            indexed_at: view.indexed_at.as_ref().map(|d| d.as_str().to_string()),
            avatar: view.avatar.clone(),
            ..Profile::default()
        }
    }
}

#[async_trait]
impl Remote for XrpcRemote {
    async fn resolve_handle(&self, handle: &str) -> Result<String, RemoteError> {
        let handle: Handle = handle.parse().map_err(|_| RemoteError::InvalidInput {
            kind: "handle",
            value: handle.to_string(),
        })?;
        let params = atrium_api::com::atproto::identity::resolve_handle::ParametersData { handle };

        let output = self
            .agent
            .api
            .com
            .atproto
            .identity
            .resolve_handle(params.into())
            .await
            .map_err(xrpc_error)?;

        Ok(output.data.did.to_string())
    }

    async fn get_profile(&self, actor: &str) -> Result<Profile, RemoteError> {
        let params = atrium_api::app::bsky::actor::get_profile::ParametersData {
            actor: parse_actor(actor)?,
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .actor
            .get_profile(params.into())
            .await
            .map_err(xrpc_error)?;

        Ok(Profile {
            did: output.data.did.to_string(),
            handle: output.data.handle.to_string(),
            display_name: output.data.display_name.clone(),
            description: output.data.description.clone(),
            indexed_at: output
                .data
                .indexed_at
                .as_ref()
                .map(|d| d.as_str().to_string()),
            followers_count: output.data.followers_count,
            follows_count: output.data.follows_count,
            posts_count: output.data.posts_count,
            avatar: output.data.avatar.clone(),
            banner: output.data.banner.clone(),
        })
    }

    async fn get_author_feed(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<PostView>, RemoteError> {
        let params = atrium_api::app::bsky::feed::get_author_feed::ParametersData {
            actor: parse_actor(actor)?,
            cursor: cursor.map(String::from),
            filter: None,
            include_pins: None,
            limit: page_limit(limit),
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .feed
            .get_author_feed(params.into())
            .await
            .map_err(xrpc_error)?;

        let items = output
            .data
            .feed
            .iter()
            .map(|feed_view| Self::convert_post_view(&feed_view.data.post))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, non_empty_cursor(output.data.cursor)))
    }

    async fn search_posts(
        &self,
        query: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<PostView>, RemoteError> {
        let params = atrium_api::app::bsky::feed::search_posts::ParametersData {
            q: query.to_string(),
            author: None,
            cursor: cursor.map(String::from),
            domain: None,
            lang: None,
            limit: page_limit(limit),
            mentions: None,
            since: None,
            sort: None,
            tag: None,
            until: None,
            url: None,
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .feed
            .search_posts(params.into())
            .await
            .map_err(xrpc_error)?;

        let items = output
            .data
            .posts
            .iter()
            .map(Self::convert_post_view)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, non_empty_cursor(output.data.cursor)))
    }

    async fn get_followers(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<Profile>, RemoteError> {
        let params = atrium_api::app::bsky::graph::get_followers::ParametersData {
            actor: parse_actor(actor)?,
            cursor: cursor.map(String::from),
            limit: page_limit(limit),
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .graph
            .get_followers(params.into())
            .await
            .map_err(xrpc_error)?;

        let items = output
            .data
            .followers
            .iter()
            .map(Self::convert_profile_view)
            .collect();

        Ok(Page::new(items, non_empty_cursor(output.data.cursor)))
    }

    async fn get_follows(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<Profile>, RemoteError> {
        let params = atrium_api::app::bsky::graph::get_follows::ParametersData {
            actor: parse_actor(actor)?,
            cursor: cursor.map(String::from),
            limit: page_limit(limit),
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .graph
            .get_follows(params.into())
            .await
            .map_err(xrpc_error)?;

        let items = output
            .data
            .follows
            .iter()
            .map(Self::convert_profile_view)
            .collect();

        Ok(Page::new(items, non_empty_cursor(output.data.cursor)))
    }

    async fn get_post_thread(&self, uri: &str) -> Result<Option<PostView>, RemoteError> {
        use atrium_api::app::bsky::feed::get_post_thread::OutputThreadRefs;
        use atrium_api::types::Union;

        let params = atrium_api::app::bsky::feed::get_post_thread::ParametersData {
            uri: uri.parse().map_err(|_| RemoteError::InvalidInput {
                kind: "uri",
                value: uri.to_string(),
            })?,
            depth: None,
            parent_height: None,
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .feed
            .get_post_thread(params.into())
            .await
            .map_err(xrpc_error)?;

        match &output.data.thread {
            Union::Refs(OutputThreadRefs::AppBskyFeedDefsThreadViewPost(thread_view)) => {
                Self::convert_post_view(&thread_view.data.post).map(Some)
            }
            // NotFoundPost, BlockedPost, or a view kind we do not know
            _ => Ok(None),
        }
    }
}
