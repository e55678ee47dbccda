// SPDX-License-Identifier: MPL-2.0

//! In-memory stand-ins for the remote API, shared by the unit tests.

use crate::atproto::{Authenticator, Page, PostView, Profile, Remote, Session};
use crate::config::ConnectionConfig;
use crate::error::RemoteError;
use crate::listing::{Listings, QueryContext};
use crate::state::SessionManager;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn config(handle: &str) -> ConnectionConfig {
    ConnectionConfig {
        handle: Some(handle.to_string()),
        app_password: Some("app-pass-word".to_string()),
        pds_host: None,
    }
}

pub fn profile(did: &str, handle: &str) -> Profile {
    Profile {
        did: did.to_string(),
        handle: handle.to_string(),
        ..Profile::default()
    }
}

pub fn detailed_profile(did: &str, handle: &str, followers: i64) -> Profile {
    Profile {
        display_name: Some(handle.split('.').next().unwrap_or_default().to_string()),
        followers_count: Some(followers),
        follows_count: Some(3),
        posts_count: Some(42),
        banner: Some(format!("https://cdn.example/{did}/banner")),
        ..profile(did, handle)
    }
}

/// Query context for the `default` connection, logged in as `me.test`.
pub fn ctx() -> QueryContext {
    QueryContext::new("default", config("me.test"))
}

/// Listings over `remote` with pacing switched off. The returned
/// authenticator counts logins.
pub fn listings(remote: Arc<FakeRemote>) -> (Listings, Arc<FakeAuthenticator>) {
    let auth = Arc::new(FakeAuthenticator::with_remote(remote));
    let sessions = Arc::new(SessionManager::new(auth.clone()));
    let listings = Listings::new(sessions).with_pacing_delay(Duration::ZERO);
    (listings, auth)
}

/// `n` plain posts with rkeys `<prefix>0 .. <prefix>{n-1}`.
pub fn posts(prefix: &str, n: usize) -> Vec<PostView> {
    (0..n)
        .map(|i| post(&format!("{prefix}{i}"), &format!("post {i}")))
        .collect()
}

/// A feed post view by `did:plc:author` / `author.test`.
pub fn post(rkey: &str, text: &str) -> PostView {
    post_with_record(
        rkey,
        json!({
            "$type": "app.bsky.feed.post",
            "text": text,
            "createdAt": "2024-11-20T10:00:00.000Z"
        }),
    )
}

pub fn post_with_record(rkey: &str, record: serde_json::Value) -> PostView {
    PostView {
        uri: format!("at://did:plc:author/app.bsky.feed.post/{rkey}"),
        cid: format!("bafy{rkey}"),
        author_did: "did:plc:author".to_string(),
        author_handle: "author.test".to_string(),
        record,
        indexed_at: "2024-11-20T10:00:01.000Z".to_string(),
        like_count: Some(2),
        repost_count: Some(1),
    }
}

/// Split `pages` into a cursor chain `c1, c2, ..., none`.
pub fn chain<T>(pages: Vec<Vec<T>>) -> Vec<Page<T>> {
    let n = pages.len();
    pages
        .into_iter()
        .enumerate()
        .map(|(i, items)| {
            let cursor = (i + 1 < n).then(|| format!("c{}", i + 1));
            Page::new(items, cursor)
        })
        .collect()
}

fn page_at<T: Clone>(pages: Option<&Vec<Page<T>>>, cursor: Option<&str>) -> Page<T> {
    let Some(pages) = pages else {
        return Page::last(Vec::new());
    };
    let index = match cursor {
        None => 0,
        Some(c) => c.trim_start_matches('c').parse().unwrap_or(usize::MAX),
    };
    pages
        .get(index)
        .cloned()
        .unwrap_or_else(|| Page::last(Vec::new()))
}

#[derive(Default)]
pub struct FakeRemote {
    pub handles: HashMap<String, String>,
    pub profiles: HashMap<String, Profile>,
    pub author_feeds: HashMap<String, Vec<Page<PostView>>>,
    pub searches: HashMap<String, Vec<Page<PostView>>>,
    pub followers: HashMap<String, Vec<Page<Profile>>>,
    pub follows: HashMap<String, Vec<Page<Profile>>>,
    pub threads: HashMap<String, PostView>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, u32>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handle(mut self, handle: &str, did: &str) -> Self {
        self.handles.insert(handle.to_string(), did.to_string());
        self.profiles
            .entry(did.to_string())
            .or_insert_with(|| detailed_profile(did, handle, 10));
        self
    }

    /// Make the next `times` calls of `operation` fail.
    pub fn fail(&self, operation: &'static str, times: u32) {
        self.failures.lock().unwrap().insert(operation, times);
    }

    /// Every call so far, as `"<operation> <arg> <cursor> <limit>"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, operation: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .collect()
    }

    fn record(&self, operation: &'static str, call: String) -> Result<(), RemoteError> {
        self.calls.lock().unwrap().push(format!("{operation} {call}"));

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RemoteError::Xrpc(format!("{operation}: 502 Bad Gateway")));
            }
        }
        Ok(())
    }
}

fn paged_call(arg: &str, cursor: Option<&str>, limit: u8) -> String {
    format!("{arg} {} {limit}", cursor.unwrap_or("-"))
}

#[async_trait]
impl Remote for FakeRemote {
    async fn resolve_handle(&self, handle: &str) -> Result<String, RemoteError> {
        self.record("resolveHandle", handle.to_string())?;
        self.handles
            .get(handle)
            .cloned()
            .ok_or_else(|| RemoteError::Xrpc("Unable to resolve handle".into()))
    }

    async fn get_profile(&self, actor: &str) -> Result<Profile, RemoteError> {
        self.record("getProfile", actor.to_string())?;
        self.profiles
            .get(actor)
            .cloned()
            .ok_or_else(|| RemoteError::Xrpc("Profile not found".into()))
    }

    async fn get_author_feed(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<PostView>, RemoteError> {
        self.record("getAuthorFeed", paged_call(actor, cursor, limit))?;
        Ok(page_at(self.author_feeds.get(actor), cursor))
    }

    async fn search_posts(
        &self,
        query: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<PostView>, RemoteError> {
        self.record("searchPosts", paged_call(query, cursor, limit))?;
        Ok(page_at(self.searches.get(query), cursor))
    }

    async fn get_followers(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<Profile>, RemoteError> {
        self.record("getFollowers", paged_call(actor, cursor, limit))?;
        Ok(page_at(self.followers.get(actor), cursor))
    }

    async fn get_follows(
        &self,
        actor: &str,
        cursor: Option<&str>,
        limit: u8,
    ) -> Result<Page<Profile>, RemoteError> {
        self.record("getFollows", paged_call(actor, cursor, limit))?;
        Ok(page_at(self.follows.get(actor), cursor))
    }

    async fn get_post_thread(&self, uri: &str) -> Result<Option<PostView>, RemoteError> {
        self.record("getPostThread", uri.to_string())?;
        Ok(self.threads.get(uri).cloned())
    }
}

/// Hands out a shared [`FakeRemote`] for every login and counts logins.
pub struct FakeAuthenticator {
    remote: Arc<FakeRemote>,
    reject: bool,
    logins: AtomicUsize,
}

impl Default for FakeAuthenticator {
    fn default() -> Self {
        Self::with_remote(Arc::new(FakeRemote::new()))
    }
}

impl FakeAuthenticator {
    pub fn with_remote(remote: Arc<FakeRemote>) -> Self {
        Self {
            remote,
            reject: false,
            logins: AtomicUsize::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Authenticator for FakeAuthenticator {
    async fn create_session(
        &self,
        host: &str,
        identifier: &str,
        _password: &str,
    ) -> Result<(Session, Arc<dyn Remote>), RemoteError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        // Give concurrent callers a chance to pile up on the cache lock.
        tokio::time::sleep(Duration::from_millis(20)).await;

        if self.reject {
            return Err(RemoteError::Xrpc("AuthenticationRequired: Invalid identifier or password".into()));
        }

        let session = Session {
            host: host.to_string(),
            did: format!("did:plc:{}", identifier.replace('.', "")),
            handle: identifier.to_string(),
            access_jwt: "access".to_string(),
            refresh_jwt: "refresh".to_string(),
        };
        let remote: Arc<dyn Remote> = self.remote.clone();
        Ok((session, remote))
    }
}
