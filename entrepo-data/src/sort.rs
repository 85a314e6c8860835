//! Free-form `orderBy` parsing and multi-key comparator chains.

use crate::entity::EntityDescriptor;
use crate::error::DataError;
use crate::metadata::MetadataProvider;
use crate::value::ScalarKind;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort direction of a single key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

impl Direction {
    pub fn from_ascending(ascending: bool) -> Self {
        if ascending {
            Direction::Ascending
        } else {
            Direction::Descending
        }
    }

    /// Recognise a direction token. Matching is case-sensitive.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "asc" | "ascending" => Some(Direction::Ascending),
            "desc" | "descending" => Some(Direction::Descending),
            _ => None,
        }
    }

    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    }
}

/// One parsed `orderBy` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub direction: Direction,
}

impl SortField {
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }
}

/// Parse an `orderBy` string such as `"name desc, id"` for `entity`.
///
/// Segments are comma separated; each holds a field name optionally followed
/// by `asc`, `ascending`, `desc` or `descending`. Unrecognised direction
/// tokens fall back to `default_direction`. Segments naming a field the
/// entity does not declare are dropped. Order of appearance is preserved,
/// duplicates included.
pub fn parse_order_by(
    order_by: &str,
    default_direction: Direction,
    entity: &str,
    metadata: &dyn MetadataProvider,
) -> Vec<SortField> {
    let mut fields = Vec::new();
    for segment in order_by.split(',').map(str::trim) {
        let mut tokens = segment.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };
        let direction = match tokens.next() {
            Some(token) => Direction::from_token(token).unwrap_or_else(|| {
                tracing::debug!(entity, field = name, token, "unrecognised sort direction");
                default_direction
            }),
            None => default_direction,
        };
        if metadata.field_of(entity, name).is_none() {
            tracing::debug!(entity, field = name, "skipping unknown sort field");
            continue;
        }
        fields.push(SortField::new(name, direction));
    }
    fields
}

/// A validated sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: &'static str,
    pub kind: ScalarKind,
    pub direction: Direction,
}

/// Lexicographic multi-key ordering: the first key orders, each following
/// key only breaks ties left by the keys before it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComparatorChain {
    keys: Vec<SortKey>,
}

impl ComparatorChain {
    /// Build a chain for `entity`, rejecting fields whose kind has no
    /// natural total order.
    pub fn build(
        fields: &[SortField],
        entity: &str,
        metadata: &dyn MetadataProvider,
    ) -> Result<Self, DataError> {
        let mut keys = Vec::with_capacity(fields.len());
        for sort in fields {
            let def = metadata
                .field_of(entity, &sort.field)
                .ok_or_else(|| DataError::unknown_field(entity, &sort.field))?;
            if !def.kind.is_sortable() {
                return Err(DataError::UnsortableField {
                    field: sort.field.clone(),
                    kind: def.kind,
                });
            }
            keys.push(SortKey {
                field: def.name,
                kind: def.kind,
                direction: sort.direction,
            });
        }
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn compare<E>(&self, descriptor: &EntityDescriptor<E>, a: &E, b: &E) -> Ordering {
        for key in &self.keys {
            let (Ok(left), Ok(right)) = (descriptor.get(a, key.field), descriptor.get(b, key.field))
            else {
                continue;
            };
            let ordering = key
                .direction
                .apply(left.natural_cmp(&right).unwrap_or(Ordering::Equal));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Stable sort: rows equal under every key keep their input order.
    pub fn sort<E>(&self, descriptor: &EntityDescriptor<E>, rows: &mut [E]) {
        if self.keys.is_empty() {
            return;
        }
        rows.sort_by(|a, b| self.compare(descriptor, a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::{book, Book};
    use crate::entity::Entity;
    use crate::metadata::Model;

    fn model() -> Model {
        Model::of::<Book>()
    }

    #[test]
    fn test_parse_keeps_duplicates_and_drops_unknown() {
        let fields = parse_order_by(
            "title desc, title asc, bogusField, id desc",
            Direction::Ascending,
            "books",
            &model(),
        );
        assert_eq!(
            fields,
            vec![
                SortField::new("title", Direction::Descending),
                SortField::new("title", Direction::Ascending),
                SortField::new("id", Direction::Descending),
            ]
        );
    }

    #[test]
    fn test_parse_empty_and_whitespace() {
        assert!(parse_order_by("", Direction::Ascending, "books", &model()).is_empty());
        assert!(parse_order_by("   ", Direction::Ascending, "books", &model()).is_empty());
        assert!(parse_order_by(" , ,", Direction::Ascending, "books", &model()).is_empty());
    }

    #[test]
    fn test_parse_default_direction_and_typos() {
        let fields = parse_order_by(
            "rating  descending,title DESC, id sideways",
            Direction::Descending,
            "books",
            &model(),
        );
        assert_eq!(
            fields,
            vec![
                SortField::new("rating", Direction::Descending),
                SortField::new("title", Direction::Descending),
                SortField::new("id", Direction::Descending),
            ]
        );
        let fields = parse_order_by("title DESC", Direction::Ascending, "books", &model());
        assert_eq!(fields[0].direction, Direction::Ascending);
    }

    #[test]
    fn test_parse_drops_collection_fields() {
        let fields = parse_order_by("shelves, id", Direction::Ascending, "books", &model());
        assert_eq!(fields, vec![SortField::new("id", Direction::Ascending)]);
    }

    #[test]
    fn test_unsortable_field_fails_at_build() {
        let fields = vec![SortField::new("cover", Direction::Ascending)];
        let err = ComparatorChain::build(&fields, "books", &model()).unwrap_err();
        assert!(matches!(
            err,
            DataError::UnsortableField {
                kind: ScalarKind::Bytes,
                ..
            }
        ));
    }

    #[test]
    fn test_chain_breaks_ties_in_order() {
        let descriptor = Book::descriptor();
        let mut rows = vec![
            book(1, "b", 2.0),
            book(2, "a", 1.0),
            book(3, "b", 1.0),
            book(4, "a", 3.0),
        ];
        let fields = parse_order_by("title, rating desc", Direction::Ascending, "books", &model());
        let chain = ComparatorChain::build(&fields, "books", &model()).unwrap();
        chain.sort(&descriptor, &mut rows);
        let ids: Vec<i64> = rows.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![4, 2, 1, 3]);
    }

    #[test]
    fn test_chain_is_stable() {
        let descriptor = Book::descriptor();
        let mut rows = vec![book(5, "x", 1.0), book(2, "x", 1.0), book(9, "x", 1.0)];
        let fields = vec![SortField::new("title", Direction::Descending)];
        let chain = ComparatorChain::build(&fields, "books", &model()).unwrap();
        chain.sort(&descriptor, &mut rows);
        let ids: Vec<i64> = rows.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![5, 2, 9]);
    }

    #[test]
    fn test_duplicate_keys_apply_left_to_right() {
        let descriptor = Book::descriptor();
        let mut rows = vec![book(1, "a", 1.0), book(2, "b", 1.0)];
        let fields = parse_order_by("title desc, title asc", Direction::Ascending, "books", &model());
        let chain = ComparatorChain::build(&fields, "books", &model()).unwrap();
        chain.sort(&descriptor, &mut rows);
        assert_eq!(rows[0].id, 2);
    }
}
