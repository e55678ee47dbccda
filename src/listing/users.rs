// SPDX-License-Identifier: MPL-2.0

use super::sources::ProfilePages;
use super::{Listings, ProfileRow, QueryContext, account, account_did, required_did};
use crate::atproto::{Profile, Remote};
use crate::error::{Error, Result};
use crate::fetch::{PageSource, Paginator, Retrying};
use std::ops::ControlFlow;
use tracing::{debug, info, instrument};

/// Keys for a single account lookup. `did` wins over `handle`.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    pub did: Option<String>,
    pub handle: Option<String>,
}

impl Listings {
    /// Detailed profile of one account.
    #[instrument(skip_all, fields(connection = %ctx.connection_name))]
    pub async fn get_user(
        &self,
        ctx: &QueryContext,
        query: &UserQuery,
        mut sink: impl FnMut(ProfileRow) -> ControlFlow<()>,
    ) -> Result<()> {
        let account = account("did", &query.did, &query.handle)?;

        let client = self.connect(ctx).await?;
        let api = client.api();
        let did = account_did(api, &account).await?;

        let profile = api
            .get_profile(&did)
            .await
            .map_err(|e| Error::upstream("getProfile", &did, e))?;

        debug!(did = %did, handle = %profile.handle, "emitting profile");
        if sink(ProfileRow::from(profile)).is_break() {
            debug!("sink stopped early");
        }
        Ok(())
    }

    /// Accounts following `target_did`, each with its detailed profile.
    ///
    /// Follower pages are retried with backoff; the per-follower profile
    /// lookups are not.
    #[instrument(skip_all, fields(connection = %ctx.connection_name, did = %target_did))]
    pub async fn list_followers(
        &self,
        ctx: &QueryContext,
        target_did: &str,
        mut sink: impl FnMut(ProfileRow) -> ControlFlow<()>,
    ) -> Result<()> {
        let target_did = required_did("target_did", target_did)?;

        let client = self.connect(ctx).await?;
        let api = client.api();

        let source = Retrying::new(
            ProfilePages::followers(api, target_did),
            self.retry,
            ctx.waiter(),
        );
        let mut pages = Paginator::new(source, None, self.item_pacing(), ctx.waiter());
        let emitted = stream_profiles(api, &mut pages, target_did, &mut sink).await?;

        info!(
            rows = emitted,
            pages = pages.pages_fetched(),
            "listed followers"
        );
        Ok(())
    }

    /// Accounts `target_did` follows, each with its detailed profile.
    #[instrument(skip_all, fields(connection = %ctx.connection_name, did = %target_did))]
    pub async fn list_following(
        &self,
        ctx: &QueryContext,
        target_did: &str,
        mut sink: impl FnMut(ProfileRow) -> ControlFlow<()>,
    ) -> Result<()> {
        let target_did = required_did("target_did", target_did)?;

        let client = self.connect(ctx).await?;
        let api = client.api();

        let mut pages = Paginator::new(
            ProfilePages::follows(api, target_did),
            None,
            self.item_pacing(),
            ctx.waiter(),
        );
        let emitted = stream_profiles(api, &mut pages, target_did, &mut sink).await?;

        info!(
            rows = emitted,
            pages = pages.pages_fetched(),
            "listed following"
        );
        Ok(())
    }
}

/// List views carry no counts or banner, so every account is re-fetched with
/// `getProfile` before it is emitted. A failed lookup ends the listing.
async fn stream_profiles<S>(
    api: &dyn Remote,
    pages: &mut Paginator<S>,
    target_did: &str,
    sink: &mut impl FnMut(ProfileRow) -> ControlFlow<()>,
) -> Result<usize>
where
    S: PageSource<Item = Profile>,
{
    let mut emitted = 0;
    while let Some(account) = pages.next().await? {
        let profile = api
            .get_profile(&account.did)
            .await
            .map_err(|e| Error::upstream("getProfile", &account.did, e))?;

        let mut row = ProfileRow::from(profile);
        row.target_did = Some(target_did.to_string());
        emitted += 1;
        if sink(row).is_break() {
            debug!("sink stopped early");
            break;
        }
    }
    Ok(emitted)
}
