// SPDX-License-Identifier: MPL-2.0

//! Shared async runtime for synchronous callers.
//!
//! The CLI is synchronous; every listing it runs goes through [`block_on`] on
//! this one runtime.

use once_cell::sync::Lazy;
use std::future::Future;
use tokio::runtime::Runtime;

/// Listings are sequential and I/O-bound, so two workers are plenty.
static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .thread_name("skygraph-async")
        .build()
        .expect("failed to create async runtime")
});

/// Execute a future on the shared runtime, blocking until completion.
pub fn block_on<F: Future>(future: F) -> F::Output {
    RUNTIME.block_on(future)
}
