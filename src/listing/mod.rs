// SPDX-License-Identifier: MPL-2.0

//! The queryable listings: one entry point per table, each streaming rows
//! into a caller-supplied sink.
//!
//! Every listing follows the same order: check its key inputs, connect,
//! resolve identifiers, then page and emit. Rows go to the sink as soon as
//! they are built. A sink that returns [`ControlFlow::Break`] ends the listing
//! early without error.

mod posts;
mod rows;
mod sources;
mod users;

pub use posts::{PostQuery, SearchQuery, UserPostsQuery};
pub use rows::{PostRow, ProfileRow};
pub use users::UserQuery;

use crate::atproto::uri::{is_valid_did, is_valid_handle};
use crate::atproto::{Identifier, PostView, Remote};
use crate::config::{ConnectionConfig, PACING_DELAY};
use crate::error::{Error, Result};
use crate::fetch::{PageSource, Pacing, Paginator, RetryPolicy, Waiter};
use crate::identity::resolve_handle_to_did;
use crate::state::{Client, SessionManager};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Per-invocation context supplied by the host.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub connection_name: String,
    pub config: ConnectionConfig,
    pub cancel: CancellationToken,
}

impl QueryContext {
    pub fn new(connection_name: impl Into<String>, config: ConnectionConfig) -> Self {
        Self {
            connection_name: connection_name.into(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn waiter(&self) -> Waiter {
        Waiter::new(self.cancel.clone())
    }
}

/// Entry point for all listings. Cheap to share; the session cache inside is
/// the only state.
pub struct Listings {
    sessions: Arc<SessionManager>,
    pacing_delay: Duration,
    retry: RetryPolicy,
}

impl Listings {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self {
            sessions,
            pacing_delay: PACING_DELAY,
            retry: RetryPolicy::default(),
        }
    }

    /// Override the delay between pages (and items, where paced per item).
    pub fn with_pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    /// Override the retry policy used for follower pages.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn connect(&self, ctx: &QueryContext) -> Result<Arc<Client>> {
        self.sessions
            .connect(&ctx.connection_name, &ctx.config)
            .await
    }

    fn page_pacing(&self) -> Pacing {
        Pacing::per_page(self.pacing_delay)
    }

    fn item_pacing(&self) -> Pacing {
        Pacing::per_item(self.pacing_delay)
    }
}

/// Trimmed value of an optional key, `None` when absent or blank.
fn key(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// A required `target_did` key: present and DID-shaped.
fn required_did<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!("{name} must be specified")));
    }
    checked_did(name, value)
}

fn checked_did<'a>(name: &str, value: &'a str) -> Result<&'a str> {
    if !is_valid_did(value) {
        return Err(Error::Validation(format!(
            "invalid DID format for {name}: '{value}'"
        )));
    }
    Ok(value)
}

/// Pick the account a listing is about from its optional DID and handle keys.
/// A DID wins over a handle and must be DID-shaped. Handles are shape-checked
/// here so a bad one fails before login.
fn account(did_key: &str, did: &Option<String>, handle: &Option<String>) -> Result<Identifier> {
    if let Some(did) = key(did) {
        return Ok(Identifier::Did(checked_did(did_key, did)?.to_string()));
    }
    match key(handle) {
        Some(handle) => match Identifier::parse(handle) {
            Identifier::Handle(handle) if !is_valid_handle(&handle) => Err(Error::Validation(
                format!("malformed handle '{handle}'"),
            )),
            account => Ok(account),
        },
        None => Err(Error::Validation(format!(
            "either {did_key} or handle must be specified"
        ))),
    }
}

/// DID for `account`, resolving a handle if needed.
async fn account_did(api: &dyn Remote, account: &Identifier) -> Result<String> {
    match account {
        Identifier::Did(did) => Ok(did.clone()),
        Identifier::Handle(handle) => resolve_handle_to_did(api, handle).await,
    }
}

/// Build a row for each post view and hand it to the sink, in page order.
/// Returns the number of rows emitted.
async fn stream_posts<S>(
    api: &dyn Remote,
    pages: &mut Paginator<S>,
    mut decorate: impl FnMut(&mut PostRow),
    sink: &mut impl FnMut(PostRow) -> ControlFlow<()>,
) -> Result<usize>
where
    S: PageSource<Item = PostView>,
{
    let mut emitted = 0;
    while let Some(view) = pages.next().await? {
        let mut row = PostRow::from_view(api, view).await?;
        decorate(&mut row);
        emitted += 1;
        if sink(row).is_break() {
            debug!("sink stopped early");
            break;
        }
    }
    Ok(emitted)
}

/// A caller-supplied row limit. Zero and negative values mean no limit.
fn positive_limit(limit: Option<i64>) -> Option<usize> {
    limit
        .filter(|&n| n > 0)
        .and_then(|n| usize::try_from(n).ok())
}
