//! Test support for entrepo: blog fixtures, deterministic seeding and
//! ready-to-use repositories over the in-memory and SQLite stores.

mod db;
mod models;
mod seed;

pub use db::{model, sqlite_pool, BlogRepos, MemoryRepos, SqliteRepos, SCHEMA};
pub use models::{Blog, Post, Tag, BLOG_TAGS, POST_TAGS};
pub use seed::{random_split_counts, Seed, BLOGS_COUNT, POSTS_COUNT, TAGS_COUNT};

use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test harness.
///
/// Honors `RUST_LOG`, falling back to debug output for the entrepo crates. Safe to call from
/// every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("entrepo_data=debug,entrepo_data_sqlx=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
