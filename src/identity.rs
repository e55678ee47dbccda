// SPDX-License-Identifier: MPL-2.0

//! Handle and DID resolution.
//!
//! [`resolve_handle_to_did`] is required resolution and returns a `Result`.
//! [`resolve_dids_to_handles`] is best effort and always returns a value,
//! keeping the DID wherever a lookup fails.

use crate::atproto::uri::{AtUri, is_did, is_valid_handle};
use crate::atproto::{Identifier, Remote};
use crate::config::WEB_HOST;
use crate::error::{Error, RemoteError, Result};
use tracing::{debug, warn};
use url::Url;

/// Resolve a handle (with or without a leading `@`) to its DID.
pub async fn resolve_handle_to_did(api: &dyn Remote, handle: &str) -> Result<String> {
    let handle = handle.trim().trim_start_matches('@');
    if !is_valid_handle(handle) {
        return Err(Error::Validation(format!("malformed handle '{handle}'")));
    }

    match api.resolve_handle(handle).await {
        Ok(did) => {
            debug!(handle, did = %did, "resolved handle");
            Ok(did)
        }
        Err(RemoteError::InvalidInput { .. }) => {
            Err(Error::Validation(format!("malformed handle '{handle}'")))
        }
        Err(e) => {
            warn!(handle, error = %e, "failed to resolve handle");
            Err(Error::Resolution {
                input: handle.to_string(),
                message: e.to_string(),
            })
        }
    }
}

/// Map each DID to its current handle. Entries that are not DIDs pass through
/// untouched, and a DID whose profile cannot be fetched is kept as-is. The
/// output always lines up one-to-one with the input.
pub async fn resolve_dids_to_handles(api: &dyn Remote, identifiers: &[String]) -> Vec<String> {
    let mut handles = Vec::with_capacity(identifiers.len());

    for identifier in identifiers {
        if !is_did(identifier) {
            handles.push(identifier.clone());
            continue;
        }

        match api.get_profile(identifier).await {
            Ok(profile) => handles.push(profile.handle),
            Err(e) => {
                debug!(did = %identifier, error = %e, "keeping unresolved DID");
                handles.push(identifier.clone());
            }
        }
    }

    handles
}

/// A post reference taken apart without any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostLocator {
    AtUri(String),
    /// A bsky.app URL's profile identifier and record key.
    Web { author: Identifier, rkey: String },
}

/// Split a bsky.app post URL into its author and record key. AT-URIs pass
/// through. Fails on foreign hosts, missing segments and malformed handles.
pub fn parse_post_url(url: &str) -> Result<PostLocator> {
    let url = url.trim().trim_start_matches('@');

    if url.starts_with("at://") {
        return Ok(PostLocator::AtUri(url.to_string()));
    }

    if !url.contains(WEB_HOST) {
        return Err(Error::Validation(format!("unsupported URI format '{url}'")));
    }

    let (identifier, rkey) = profile_and_post_segments(url)?;

    let author = Identifier::parse(&identifier);
    match &author {
        Identifier::Handle(handle) if !is_valid_handle(handle) => {
            return Err(Error::Validation(format!("malformed handle '{handle}'")));
        }
        _ => {}
    }

    Ok(PostLocator::Web { author, rkey })
}

/// AT-URI for a parsed locator, resolving a handle author to its DID.
pub async fn resolve_post_locator(api: &dyn Remote, locator: PostLocator) -> Result<String> {
    match locator {
        PostLocator::AtUri(uri) => Ok(uri),
        PostLocator::Web { author, rkey } => {
            let did = match author {
                Identifier::Did(did) => did,
                Identifier::Handle(handle) => resolve_handle_to_did(api, &handle).await?,
            };
            Ok(AtUri::post(&did, &rkey).to_string())
        }
    }
}

/// Convert a bsky.app post URL to an AT-URI, resolving the profile segment to
/// a DID when it is a handle. AT-URIs are returned unchanged.
pub async fn web_url_to_at_uri(api: &dyn Remote, url: &str) -> Result<String> {
    resolve_post_locator(api, parse_post_url(url)?).await
}

/// First `profile/<id>` and first `post/<rkey>` pairs of a web URL path.
fn profile_and_post_segments(raw: &str) -> Result<(String, String)> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };

    let parsed = Url::parse(&with_scheme)
        .map_err(|e| Error::Validation(format!("invalid URL '{raw}': {e}")))?;

    if !parsed
        .host_str()
        .is_some_and(|host| host == WEB_HOST || host.ends_with(&format!(".{WEB_HOST}")))
    {
        return Err(Error::Validation(format!("unsupported URI format '{raw}'")));
    }

    // Url::path excludes query and fragment.
    let segments: Vec<&str> = parsed.path().split('/').filter(|s| !s.is_empty()).collect();

    let value_after = |key: &str| {
        segments
            .windows(2)
            .find(|pair| pair[0] == key)
            .map(|pair| pair[1].trim().to_string())
            .filter(|v| !v.is_empty())
    };

    match (value_after("profile"), value_after("post")) {
        (Some(identifier), Some(rkey)) => Ok((identifier, rkey)),
        _ => Err(Error::Validation(format!(
            "invalid {WEB_HOST} URL '{raw}': could not find profile identifier or post ID"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRemote, detailed_profile};

    fn remote() -> FakeRemote {
        FakeRemote::new()
            .with_handle("alice.test", "did:plc:xyz")
            .with_handle("bob.test", "did:plc:bob")
    }

    #[tokio::test]
    async fn test_resolve_handle_strips_at() {
        let api = remote();
        let did = resolve_handle_to_did(&api, "@alice.test").await.unwrap();
        assert_eq!(did, "did:plc:xyz");
        assert_eq!(api.calls(), vec!["resolveHandle alice.test"]);
    }

    #[tokio::test]
    async fn test_resolve_unknown_handle_is_resolution_error() {
        let api = remote();
        match resolve_handle_to_did(&api, "nobody.test").await {
            Err(Error::Resolution { input, .. }) => assert_eq!(input, "nobody.test"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_handle_fails_before_network() {
        let api = remote();
        let result = resolve_handle_to_did(&api, "not a handle").await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dids_to_handles_preserves_length_and_order() {
        let api = remote();
        let input: Vec<String> = vec![
            "did:plc:bob".into(),
            "already.handle".into(),
            "did:plc:unknown".into(),
            "did:plc:xyz".into(),
            "did:plc:bob".into(),
        ];

        let output = resolve_dids_to_handles(&api, &input).await;
        assert_eq!(
            output,
            vec![
                "bob.test",
                "already.handle",
                "did:plc:unknown",
                "alice.test",
                "bob.test"
            ]
        );
        // the plain handle never reaches the network
        assert_eq!(api.calls_to("getProfile").len(), 4);
    }

    #[tokio::test]
    async fn test_dids_to_handles_survives_upstream_failure() {
        let mut api = remote();
        api.profiles
            .insert("did:plc:c".into(), detailed_profile("did:plc:c", "c.test", 1));
        api.fail("getProfile", 1);

        let input = vec!["did:plc:xyz".to_string(), "did:plc:c".to_string()];
        let output = resolve_dids_to_handles(&api, &input).await;
        assert_eq!(output, vec!["did:plc:xyz", "c.test"]);
    }

    #[tokio::test]
    async fn test_web_url_with_handle() {
        let api = remote();
        let uri = web_url_to_at_uri(&api, "https://bsky.app/profile/alice.test/post/abc123")
            .await
            .unwrap();
        assert_eq!(uri, "at://did:plc:xyz/app.bsky.feed.post/abc123");
    }

    #[tokio::test]
    async fn test_web_url_with_did_skips_resolution() {
        let api = remote();
        let uri = web_url_to_at_uri(
            &api,
            "@https://bsky.app/profile/did:plc:abc/post/3k2m6q5dpl42g?ref=share#top",
        )
        .await
        .unwrap();
        assert_eq!(uri, "at://did:plc:abc/app.bsky.feed.post/3k2m6q5dpl42g");
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_web_url_without_scheme() {
        let api = remote();
        let uri = web_url_to_at_uri(&api, "bsky.app/profile/bob.test/post/xyz/")
            .await
            .unwrap();
        assert_eq!(uri, "at://did:plc:bob/app.bsky.feed.post/xyz");
    }

    #[tokio::test]
    async fn test_at_uri_passes_through() {
        let api = remote();
        let uri = "at://did:plc:xyz/app.bsky.feed.post/abc123";
        assert_eq!(web_url_to_at_uri(&api, uri).await.unwrap(), uri);
    }

    #[tokio::test]
    async fn test_web_url_missing_post_segment() {
        let api = remote();
        let result = web_url_to_at_uri(&api, "https://bsky.app/profile/alice.test").await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_host() {
        let api = remote();
        for url in [
            "https://example.com/profile/alice.test/post/abc",
            "https://bsky.app.evil.test/profile/alice.test/post/abc",
        ] {
            let result = web_url_to_at_uri(&api, url).await;
            assert!(matches!(result, Err(Error::Validation(_))), "{url}");
        }
    }

    #[test]
    fn test_parse_post_url_needs_no_lookup() {
        assert_eq!(
            parse_post_url("https://bsky.app/profile/@alice.test/post/abc").unwrap(),
            PostLocator::Web {
                author: Identifier::Handle("alice.test".into()),
                rkey: "abc".into(),
            }
        );
        assert_eq!(
            parse_post_url("bsky.app/profile/did:plc:abc/post/x1").unwrap(),
            PostLocator::Web {
                author: Identifier::Did("did:plc:abc".into()),
                rkey: "x1".into(),
            }
        );
        assert_eq!(
            parse_post_url(" at://did:plc:abc/app.bsky.feed.post/x1").unwrap(),
            PostLocator::AtUri("at://did:plc:abc/app.bsky.feed.post/x1".into())
        );
    }

    #[test]
    fn test_parse_post_url_rejects_bad_shapes() {
        for url in [
            "https://example.com/profile/alice.test/post/abc",
            "https://bsky.app/profile/alice.test",
            "https://bsky.app/profile/not_a_handle!/post/abc",
        ] {
            assert!(
                matches!(parse_post_url(url), Err(Error::Validation(_))),
                "{url}"
            );
        }
    }

    #[tokio::test]
    async fn test_unresolvable_handle_in_url() {
        let api = remote();
        let result = web_url_to_at_uri(&api, "https://bsky.app/profile/ghost.test/post/abc").await;
        assert!(matches!(result, Err(Error::Resolution { .. })));
    }
}
