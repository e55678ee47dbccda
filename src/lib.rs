// SPDX-License-Identifier: MPL-2.0

//! Read-only access to Bluesky posts, profiles and follow edges as flat rows.
//!
//! [`Listings`] is the entry point. Each listing authenticates through a
//! shared [`SessionManager`], resolves handles where needed, walks cursor
//! pagination and streams [`PostRow`]s or [`ProfileRow`]s into a sink.

pub mod atproto;
pub mod config;
pub mod error;
pub mod fetch;
pub mod identity;
pub mod listing;
pub mod runtime;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::{ConnectionConfig, ConnectionsFile};
pub use error::{Error, Result};
pub use listing::{
    Listings, PostQuery, PostRow, ProfileRow, QueryContext, SearchQuery, UserPostsQuery,
    UserQuery,
};
pub use state::SessionManager;
