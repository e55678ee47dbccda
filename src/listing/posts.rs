// SPDX-License-Identifier: MPL-2.0

use super::sources::PostPages;
use super::{
    Listings, PostRow, QueryContext, account, account_did, key, positive_limit, required_did,
    stream_posts,
};
use crate::config::DEFAULT_SEARCH_LIMIT;
use crate::error::{Error, Result};
use crate::fetch::Paginator;
use crate::identity::{PostLocator, parse_post_url, resolve_post_locator};
use std::ops::ControlFlow;
use tracing::{debug, info, instrument};

/// Keys for a single post lookup. `uri` wins when both are set.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub uri: Option<String>,
    pub http_url: Option<String>,
}

/// Keys for an author's posts. `target_did` wins over `handle`.
#[derive(Debug, Clone, Default)]
pub struct UserPostsQuery {
    pub target_did: Option<String>,
    pub handle: Option<String>,
    /// Zero, negative or absent means every post.
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: String,
    /// Zero, negative or absent means [`DEFAULT_SEARCH_LIMIT`].
    pub limit: Option<i64>,
}

impl Listings {
    /// Look up one post by AT-URI or bsky.app URL. Emits nothing when the
    /// thread has no post view (deleted, blocked or not indexed).
    #[instrument(skip_all, fields(connection = %ctx.connection_name))]
    pub async fn get_post(
        &self,
        ctx: &QueryContext,
        query: &PostQuery,
        mut sink: impl FnMut(PostRow) -> ControlFlow<()>,
    ) -> Result<()> {
        let locator = match (key(&query.uri), key(&query.http_url)) {
            (Some(uri), _) => PostLocator::AtUri(uri.trim_start_matches('@').to_string()),
            (None, Some(url)) => parse_post_url(url)?,
            (None, None) => {
                return Err(Error::Validation(
                    "either uri or http_url must be specified".into(),
                ));
            }
        };

        let client = self.connect(ctx).await?;
        let api = client.api();

        let uri = resolve_post_locator(api, locator).await?;

        let view = api
            .get_post_thread(&uri)
            .await
            .map_err(|e| Error::upstream("getPostThread", &uri, e))?;

        let Some(view) = view else {
            debug!(uri = %uri, "no post view in thread");
            return Ok(());
        };

        let row = PostRow::from_view(api, view).await?;
        if sink(row).is_break() {
            debug!("sink stopped early");
        }
        Ok(())
    }

    /// Every post in an account's author feed, newest first.
    #[instrument(skip_all, fields(connection = %ctx.connection_name))]
    pub async fn list_user_posts(
        &self,
        ctx: &QueryContext,
        query: &UserPostsQuery,
        mut sink: impl FnMut(PostRow) -> ControlFlow<()>,
    ) -> Result<()> {
        let account = account("target_did", &query.target_did, &query.handle)?;
        let handle = key(&query.handle).map(|h| h.trim_start_matches('@').to_string());
        let limit = positive_limit(query.limit);

        let client = self.connect(ctx).await?;
        let api = client.api();
        let target_did = account_did(api, &account).await?;

        let mut pages = Paginator::new(
            PostPages::author_feed(api, &target_did),
            limit,
            self.page_pacing(),
            ctx.waiter(),
        );
        let emitted = stream_posts(
            api,
            &mut pages,
            |row| {
                row.target_did = Some(target_did.clone());
                row.handle = handle.clone();
            },
            &mut sink,
        )
        .await?;

        info!(
            did = %target_did,
            rows = emitted,
            pages = pages.pages_fetched(),
            "listed user posts"
        );
        Ok(())
    }

    /// Posts matching `query`, up to its limit. Paced between every post.
    #[instrument(skip_all, fields(connection = %ctx.connection_name, query = %query.query))]
    pub async fn search_recent(
        &self,
        ctx: &QueryContext,
        query: &SearchQuery,
        mut sink: impl FnMut(PostRow) -> ControlFlow<()>,
    ) -> Result<()> {
        let text = query.query.trim();
        if text.is_empty() {
            return Err(Error::Validation("query must be specified".into()));
        }
        let limit = positive_limit(query.limit).unwrap_or(DEFAULT_SEARCH_LIMIT);

        let client = self.connect(ctx).await?;
        let api = client.api();

        let mut pages = Paginator::new(
            PostPages::search(api, text),
            Some(limit),
            self.item_pacing(),
            ctx.waiter(),
        );
        let emitted = stream_posts(
            api,
            &mut pages,
            |row| {
                row.query = Some(text.to_string());
                row.limit = Some(limit);
            },
            &mut sink,
        )
        .await?;

        info!(
            limit,
            rows = emitted,
            pages = pages.pages_fetched(),
            "search complete"
        );
        Ok(())
    }

    /// Posts that mention an account, found by searching for `@<handle>`.
    #[instrument(skip_all, fields(connection = %ctx.connection_name, did = %target_did))]
    pub async fn list_mentions(
        &self,
        ctx: &QueryContext,
        target_did: &str,
        mut sink: impl FnMut(PostRow) -> ControlFlow<()>,
    ) -> Result<()> {
        let target_did = required_did("target_did", target_did)?;

        let client = self.connect(ctx).await?;
        let api = client.api();

        let profile = api
            .get_profile(target_did)
            .await
            .map_err(|e| Error::upstream("getProfile", target_did, e))?;
        let search = format!("@{}", profile.handle);
        debug!(search = %search, "searching for mentions");

        let mut pages = Paginator::new(
            PostPages::search(api, &search),
            None,
            self.page_pacing(),
            ctx.waiter(),
        );
        let emitted = stream_posts(
            api,
            &mut pages,
            |row| row.target_did = Some(target_did.to_string()),
            &mut sink,
        )
        .await?;

        info!(
            rows = emitted,
            pages = pages.pages_fetched(),
            "listed mentions"
        );
        Ok(())
    }
}
