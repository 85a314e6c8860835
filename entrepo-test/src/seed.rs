//! Deterministic blog data set.

use crate::models::{Blog, Post, Tag};
use chrono::{DateTime, Duration};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const TAGS_COUNT: usize = 5;
pub const BLOGS_COUNT: usize = 4;
pub const POSTS_COUNT: usize = 75;

/// 2020-01-01T00:00:00Z, the date of post 0.
const BASE_TIMESTAMP: i64 = 1_577_836_800;

/// Tags, blogs and posts generated from one RNG seed.
///
/// Tags are `T1..T5`, blogs `A1..A4` with a random subset of the tags, and
/// posts `Post 1..Post 75` dated one hour apart. Posts are split across the
/// blogs in contiguous runs whose lengths come from [`random_split_counts`].
#[derive(Debug, Clone, PartialEq)]
pub struct Seed {
    pub tags: Vec<Tag>,
    pub blogs: Vec<Blog>,
    pub posts: Vec<Post>,
}

impl Seed {
    pub fn generate(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);

        let tags: Vec<Tag> = (1..=TAGS_COUNT as i64)
            .map(|id| Tag {
                id,
                name: format!("T{id}"),
            })
            .collect();
        let tag_ids: Vec<i64> = tags.iter().map(|t| t.id).collect();

        let blogs: Vec<Blog> = (1..=BLOGS_COUNT as i64)
            .map(|id| Blog {
                id,
                name: format!("A{id}"),
                tags: random_tags(&mut rng, &tag_ids),
            })
            .collect();

        let base = DateTime::from_timestamp(BASE_TIMESTAMP, 0).unwrap_or_default();
        let counts = random_split_counts(&mut rng, BLOGS_COUNT, POSTS_COUNT);
        let owners = blogs
            .iter()
            .zip(counts)
            .flat_map(|(blog, count)| std::iter::repeat(blog.id).take(count));

        let posts: Vec<Post> = owners
            .enumerate()
            .map(|(i, blog_id)| {
                let id = i as i64 + 1;
                Post {
                    id,
                    date: base + Duration::hours(id),
                    name: format!("Post {id}"),
                    blog_id,
                    tags: random_tags(&mut rng, &tag_ids),
                }
            })
            .collect();

        Self { tags, blogs, posts }
    }

    pub fn blog(&self, id: i64) -> Option<&Blog> {
        self.blogs.iter().find(|b| b.id == id)
    }

    pub fn post(&self, id: i64) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    /// Posts with more than `n` tags.
    pub fn posts_with_more_tags_than(&self, n: usize) -> usize {
        self.posts.iter().filter(|p| p.tags.len() > n).count()
    }

    pub fn blogs_with_more_tags_than(&self, n: usize) -> usize {
        self.blogs.iter().filter(|b| b.tags.len() > n).count()
    }
}

/// Between zero and `TAGS_COUNT - 1` distinct tags, in ascending order.
fn random_tags(rng: &mut impl Rng, tag_ids: &[i64]) -> Vec<i64> {
    let count = rng.gen_range(0..tag_ids.len());
    let mut picked: Vec<i64> = tag_ids.choose_multiple(rng, count).copied().collect();
    picked.sort_unstable();
    picked
}

/// Split `size` into `groups` non-negative parts summing to `size`.
///
/// Draws `groups - 1` cut points in `1..size`, adds both ends, sorts them
/// and returns the gaps between neighbours. Inner groups may be empty; with
/// `size >= 2` the first and last never are. Below that every cut sits at
/// `size`.
pub fn random_split_counts(rng: &mut impl Rng, groups: usize, size: usize) -> Vec<usize> {
    if groups == 0 {
        return Vec::new();
    }
    let mut cuts: Vec<usize> = (1..groups)
        .map(|_| if size > 1 { rng.gen_range(1..size) } else { size })
        .collect();
    cuts.push(0);
    cuts.push(size);
    cuts.sort_unstable();
    cuts.windows(2).map(|w| w[1] - w[0]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_counts_sum_to_size() {
        let mut rng = StdRng::seed_from_u64(7);
        for groups in 1..8 {
            let counts = random_split_counts(&mut rng, groups, 30);
            assert_eq!(counts.len(), groups);
            assert_eq!(counts.iter().sum::<usize>(), 30);
        }
    }

    #[test]
    fn test_split_counts_edge_cases() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(random_split_counts(&mut rng, 0, 0).is_empty());
        assert_eq!(random_split_counts(&mut rng, 1, 12), vec![12]);
        assert_eq!(random_split_counts(&mut rng, 3, 0), vec![0, 0, 0]);
    }

    #[test]
    fn test_split_counts_outer_groups_not_empty() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let counts = random_split_counts(&mut rng, 5, 30);
            assert!(counts[0] > 0 && counts[4] > 0, "{counts:?}");
        }
        assert_eq!(random_split_counts(&mut rng, 3, 1), vec![1, 0, 0]);
    }

    #[test]
    fn test_split_counts_are_deterministic() {
        let a = random_split_counts(&mut StdRng::seed_from_u64(7), 5, 30);
        let b = random_split_counts(&mut StdRng::seed_from_u64(7), 5, 30);
        assert_eq!(a, b);
    }

    #[test]
    fn test_seed_shape() {
        let seed = Seed::generate(42);
        assert_eq!(seed.tags.len(), TAGS_COUNT);
        assert_eq!(seed.blogs.len(), BLOGS_COUNT);
        assert_eq!(seed.posts.len(), POSTS_COUNT);
        assert_eq!(seed.tags[0].name, "T1");
        assert_eq!(seed.blogs[3].name, "A4");
        assert_eq!(seed.posts[74].name, "Post 75");
        assert!(seed.blogs.iter().all(|b| b.tags.len() < TAGS_COUNT));
        assert!(seed
            .posts
            .windows(2)
            .all(|w| w[0].date < w[1].date && w[0].blog_id <= w[1].blog_id));
        assert_eq!(seed, Seed::generate(42));
    }
}
