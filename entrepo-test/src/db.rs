use crate::models::{Blog, Post, Tag};
use crate::seed::Seed;
use entrepo_data::{DataError, EntityRepository, MemoryStore, Model, Repository, Store};
use entrepo_data_sqlx::{SqliteStore, SqlxErrorExt};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Tables for the blog fixtures. Link tables key on `(owner, target)`.
pub const SCHEMA: &str = r#"
CREATE TABLE tags (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE blogs (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE posts (
    id INTEGER PRIMARY KEY,
    date DATETIME NOT NULL,
    name TEXT NOT NULL,
    blog_id INTEGER NOT NULL
);
CREATE TABLE blog_tags (
    blog_id INTEGER NOT NULL REFERENCES blogs(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (blog_id, tag_id)
);
CREATE TABLE post_tags (
    post_id INTEGER NOT NULL REFERENCES posts(id),
    tag_id INTEGER NOT NULL REFERENCES tags(id),
    PRIMARY KEY (post_id, tag_id)
);
"#;

/// A private in-memory SQLite database with [`SCHEMA`] applied.
///
/// The pool holds a single connection that never expires, since an
/// in-memory database lives only as long as its connection.
pub async fn sqlite_pool() -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    sqlx::raw_sql(SCHEMA).execute(&pool).await?;
    Ok(pool)
}

/// Metadata for every fixture entity.
pub fn model() -> Arc<Model> {
    Arc::new(
        Model::builder()
            .register::<Tag>()
            .register::<Blog>()
            .register::<Post>()
            .build(),
    )
}

/// One repository per fixture entity over the same backend, plus the data
/// they were seeded with.
pub struct BlogRepos<T, B, P> {
    pub tags: EntityRepository<Tag, T>,
    pub blogs: EntityRepository<Blog, B>,
    pub posts: EntityRepository<Post, P>,
    pub seed: Seed,
}

pub type MemoryRepos = BlogRepos<MemoryStore<Tag>, MemoryStore<Blog>, MemoryStore<Post>>;
pub type SqliteRepos = BlogRepos<SqliteStore<Tag>, SqliteStore<Blog>, SqliteStore<Post>>;

impl<T, B, P> BlogRepos<T, B, P>
where
    T: Store<Tag>,
    B: Store<Blog>,
    P: Store<Post>,
{
    pub fn new(tags: T, blogs: B, posts: P, seed: Seed) -> Self {
        let model = model();
        Self {
            tags: EntityRepository::new(tags, model.clone()),
            blogs: EntityRepository::new(blogs, model.clone()),
            posts: EntityRepository::new(posts, model),
            seed,
        }
    }

    /// Insert the seed data, tags first so link rows find their targets.
    pub async fn populate(self) -> Result<Self, DataError> {
        self.tags.add_range(self.seed.tags.clone()).await?;
        self.blogs.add_range(self.seed.blogs.clone()).await?;
        self.posts.add_range(self.seed.posts.clone()).await?;
        tracing::debug!(
            tags = self.seed.tags.len(),
            blogs = self.seed.blogs.len(),
            posts = self.seed.posts.len(),
            "seeded fixtures"
        );
        Ok(self)
    }
}

impl MemoryRepos {
    pub async fn memory(seed: Seed) -> Result<Self, DataError> {
        Self::new(MemoryStore::new(), MemoryStore::new(), MemoryStore::new(), seed)
            .populate()
            .await
    }
}

impl SqliteRepos {
    pub async fn sqlite(seed: Seed) -> Result<Self, DataError> {
        let pool = sqlite_pool().await.map_err(|e| e.into_data_error())?;
        Self::new(
            SqliteStore::new(pool.clone()),
            SqliteStore::new(pool.clone()),
            SqliteStore::new(pool),
            seed,
        )
        .populate()
        .await
    }
}
