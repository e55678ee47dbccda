// SPDX-License-Identifier: MPL-2.0

//! [`PageSource`] bindings for the remote listing endpoints.

use crate::atproto::{Page, PostView, Profile, Remote};
use crate::error::{Error, Result};
use crate::fetch::PageSource;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PostFeed {
    AuthorFeed,
    Search,
}

/// Pages of post views: an author's feed or a search.
pub struct PostPages<'a> {
    api: &'a dyn Remote,
    feed: PostFeed,
    subject: String,
}

impl<'a> PostPages<'a> {
    pub fn author_feed(api: &'a dyn Remote, did: &str) -> Self {
        Self {
            api,
            feed: PostFeed::AuthorFeed,
            subject: did.to_string(),
        }
    }

    pub fn search(api: &'a dyn Remote, query: &str) -> Self {
        Self {
            api,
            feed: PostFeed::Search,
            subject: query.to_string(),
        }
    }
}

#[async_trait]
impl<'a> PageSource for PostPages<'a> {
    type Item = PostView;

    fn operation(&self) -> &'static str {
        match self.feed {
            PostFeed::AuthorFeed => "getAuthorFeed",
            PostFeed::Search => "searchPosts",
        }
    }

    fn subject(&self) -> &str {
        &self.subject
    }

    async fn fetch_page(&self, cursor: Option<&str>, page_size: u8) -> Result<Page<PostView>> {
        let result = match self.feed {
            PostFeed::AuthorFeed => {
                self.api
                    .get_author_feed(&self.subject, cursor, page_size)
                    .await
            }
            PostFeed::Search => self.api.search_posts(&self.subject, cursor, page_size).await,
        };
        result.map_err(|e| Error::upstream(self.operation(), &self.subject, e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Graph {
    Followers,
    Follows,
}

/// Pages of account list views from the social graph.
pub struct ProfilePages<'a> {
    api: &'a dyn Remote,
    graph: Graph,
    did: String,
}

impl<'a> ProfilePages<'a> {
    pub fn followers(api: &'a dyn Remote, did: &str) -> Self {
        Self {
            api,
            graph: Graph::Followers,
            did: did.to_string(),
        }
    }

    pub fn follows(api: &'a dyn Remote, did: &str) -> Self {
        Self {
            api,
            graph: Graph::Follows,
            did: did.to_string(),
        }
    }
}

#[async_trait]
impl<'a> PageSource for ProfilePages<'a> {
    type Item = Profile;

    fn operation(&self) -> &'static str {
        match self.graph {
            Graph::Followers => "getFollowers",
            Graph::Follows => "getFollows",
        }
    }

    fn subject(&self) -> &str {
        &self.did
    }

    async fn fetch_page(&self, cursor: Option<&str>, page_size: u8) -> Result<Page<Profile>> {
        let result = match self.graph {
            Graph::Followers => self.api.get_followers(&self.did, cursor, page_size).await,
            Graph::Follows => self.api.get_follows(&self.did, cursor, page_size).await,
        };
        result.map_err(|e| Error::upstream(self.operation(), &self.did, e))
    }
}
