// SPDX-License-Identifier: MPL-2.0

use clap::{Parser, Subcommand};
use serde::Serialize;
use skygraph::{
    ConnectionsFile, Listings, PostQuery, QueryContext, Result, SearchQuery, SessionManager,
    UserPostsQuery, UserQuery, runtime,
};
use std::io::Write;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Query Bluesky posts, profiles and follow edges. Rows are printed to stdout
/// as JSON lines; logs go to stderr.
#[derive(Parser)]
#[command(name = "skygraph", version)]
struct Cli {
    /// Named connection from connections.json
    #[arg(
        short,
        long,
        global = true,
        env = "SKYGRAPH_CONNECTION",
        default_value = "default"
    )]
    connection: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// One post, by AT-URI or bsky.app URL
    Post {
        #[arg(long)]
        uri: Option<String>,
        #[arg(long)]
        http_url: Option<String>,
    },
    /// One account's profile
    User {
        #[arg(long)]
        did: Option<String>,
        #[arg(long)]
        handle: Option<String>,
    },
    /// Posts from one account's author feed
    UserPosts {
        #[arg(long)]
        target_did: Option<String>,
        #[arg(long)]
        handle: Option<String>,
        /// Maximum number of posts (all when zero or unset)
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,
    },
    /// Recent posts matching a search query
    Search {
        query: String,
        /// Maximum number of posts (100 when zero or unset)
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i64>,
    },
    /// Accounts following a DID
    Followers { target_did: String },
    /// Accounts a DID follows
    Following { target_did: String },
    /// Posts mentioning a DID's handle
    Mentions { target_did: String },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skygraph=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = runtime::block_on(run(cli)) {
        error!(error = %e, "listing failed");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let connections = ConnectionsFile::load()?;
    let ctx = QueryContext::new(&cli.connection, connections.connection(&cli.connection));

    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let listings = Listings::new(Arc::new(SessionManager::default()));
    let mut stdout = std::io::stdout().lock();
    let out = &mut stdout;

    let result = match cli.command {
        Command::Post { uri, http_url } => {
            let query = PostQuery { uri, http_url };
            listings.get_post(&ctx, &query, json_lines(out)).await
        }
        Command::User { did, handle } => {
            let query = UserQuery { did, handle };
            listings.get_user(&ctx, &query, json_lines(out)).await
        }
        Command::UserPosts {
            target_did,
            handle,
            limit,
        } => {
            let query = UserPostsQuery {
                target_did,
                handle,
                limit,
            };
            listings.list_user_posts(&ctx, &query, json_lines(out)).await
        }
        Command::Search { query, limit } => {
            let query = SearchQuery { query, limit };
            listings.search_recent(&ctx, &query, json_lines(out)).await
        }
        Command::Followers { target_did } => {
            listings
                .list_followers(&ctx, &target_did, json_lines(out))
                .await
        }
        Command::Following { target_did } => {
            listings
                .list_following(&ctx, &target_did, json_lines(out))
                .await
        }
        Command::Mentions { target_did } => {
            listings
                .list_mentions(&ctx, &target_did, json_lines(out))
                .await
        }
    };

    let _ = stdout.flush();
    result
}

/// Sink that writes each row as one JSON line. Stops the listing once the
/// output is gone (e.g. a closed pipe).
fn json_lines<R: Serialize>(out: &mut dyn Write) -> impl FnMut(R) -> ControlFlow<()> + '_ {
    move |row| {
        let written = serde_json::to_writer(&mut *out, &row)
            .map_err(std::io::Error::from)
            .and_then(|()| writeln!(out));

        match written {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => {
                warn!(error = %e, "output closed, stopping");
                ControlFlow::Break(())
            }
        }
    }
}
