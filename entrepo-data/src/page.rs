use crate::entity::EntityDescriptor;
use crate::error::DataError;
use crate::metadata::MetadataProvider;
use crate::sort::{parse_order_by, ComparatorChain, Direction};
use crate::store::{Query, Store};
use crate::Entity;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Self-clamping pagination parameters.
///
/// At all times `0 < page_size <= max_page_size` (when a maximum is set) and
/// `page_number >= 1`. Out-of-range assignments are clamped or ignored, never
/// rejected with an error.
///
/// Deserializes from camelCase keys (`pageNumber`, `pageSize`, `orderBy`,
/// `ascending`); `maxPageSize` is server-side only and never read from or
/// written to the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawPagingFilter", rename_all = "camelCase")]
pub struct PagingFilter {
    page_number: u64,
    page_size: u64,
    #[serde(skip)]
    max_page_size: Option<u64>,
    order_by: Option<String>,
    ascending: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPagingFilter {
    page_number: Option<i64>,
    page_size: Option<i64>,
    order_by: Option<String>,
    ascending: Option<bool>,
}

impl From<RawPagingFilter> for PagingFilter {
    fn from(raw: RawPagingFilter) -> Self {
        let mut filter = PagingFilter::default();
        if let Some(n) = raw.page_number {
            filter.set_page_number(n);
        }
        if let Some(size) = raw.page_size {
            filter.set_page_size(size);
        }
        filter.order_by = raw.order_by;
        if let Some(ascending) = raw.ascending {
            filter.ascending = ascending;
        }
        filter
    }
}

impl Default for PagingFilter {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
            max_page_size: None,
            order_by: None,
            ascending: true,
        }
    }
}

impl PagingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_number(&self) -> u64 {
        self.page_number
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn max_page_size(&self) -> Option<u64> {
        self.max_page_size
    }

    pub fn order_by(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }

    /// Values below 1 resolve to 1.
    pub fn set_page_number(&mut self, page_number: i64) {
        self.page_number = u64::try_from(page_number).ok().filter(|n| *n > 0).unwrap_or(1);
    }

    /// Non-positive values are ignored; values above the maximum are clamped.
    pub fn set_page_size(&mut self, page_size: i64) {
        let Some(size) = u64::try_from(page_size).ok().filter(|s| *s > 0) else {
            return;
        };
        self.page_size = match self.max_page_size {
            Some(max) if size > max => max,
            _ => size,
        };
    }

    /// Non-positive values are ignored. The current page size is re-clamped
    /// against the (possibly lowered) maximum.
    pub fn set_max_page_size(&mut self, max_page_size: i64) {
        if let Some(max) = u64::try_from(max_page_size).ok().filter(|m| *m > 0) {
            self.max_page_size = Some(max);
        }
        if let Some(max) = self.max_page_size {
            self.page_size = self.page_size.min(max);
        }
    }

    pub fn set_order_by(&mut self, order_by: impl Into<String>) {
        self.order_by = Some(order_by.into());
    }

    pub fn set_ascending(&mut self, ascending: bool) {
        self.ascending = ascending;
    }

    pub fn with_page_number(mut self, page_number: i64) -> Self {
        self.set_page_number(page_number);
        self
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.set_page_size(page_size);
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: i64) -> Self {
        self.set_max_page_size(max_page_size);
        self
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.set_order_by(order_by);
        self
    }

    pub fn with_ascending(mut self, ascending: bool) -> Self {
        self.ascending = ascending;
        self
    }

    /// Rows to skip before the requested page.
    pub fn offset(&self) -> u64 {
        (self.page_number - 1).saturating_mul(self.page_size)
    }
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    items: Vec<T>,
    page_size: u64,
    total_count: u64,
    current_page: u64,
    total_pages: u64,
    has_previous: bool,
    has_next: bool,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total_count: u64, page_number: u64, page_size: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total_count.div_ceil(page_size)
        };
        Self {
            items,
            page_size,
            total_count,
            current_page: page_number,
            total_pages,
            has_previous: page_number > 1,
            has_next: page_number < total_pages,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_count(&self) -> u64 {
        self.total_count
    }

    pub fn current_page(&self) -> u64 {
        self.current_page
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.has_previous
    }

    pub fn has_next(&self) -> bool {
        self.has_next
    }
}

impl<T> IntoIterator for PagedResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Run `query` as one page described by `filter`.
///
/// Counts every row matching the query's filter first, then applies the
/// filter's `orderBy` (when present) and the page window. Any skip/take on
/// `query` is replaced.
pub async fn paginate<E, S>(
    store: &S,
    descriptor: &EntityDescriptor<E>,
    metadata: &dyn MetadataProvider,
    mut query: Query,
    filter: &PagingFilter,
) -> Result<PagedResult<E>, DataError>
where
    E: Entity,
    S: Store<E>,
{
    let total_count = store.count(descriptor, query.filter.as_ref()).await?;

    if let Some(order_by) = filter.order_by().filter(|s| !s.trim().is_empty()) {
        let direction = Direction::from_ascending(filter.ascending());
        let fields = parse_order_by(order_by, direction, descriptor.name(), metadata);
        if !fields.is_empty() {
            query.order = Some(ComparatorChain::build(&fields, descriptor.name(), metadata)?);
        }
    }

    query.skip = filter.offset();
    query.take = Some(filter.page_size());
    let items = if query.skip >= total_count {
        Vec::new()
    } else {
        store.fetch(descriptor, &query).await?
    };

    tracing::debug!(
        entity = descriptor.name(),
        page = filter.page_number(),
        size = filter.page_size(),
        total_count,
        returned = items.len(),
        "paginated query"
    );
    Ok(PagedResult::new(
        items,
        total_count,
        filter.page_number(),
        filter.page_size(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let filter = PagingFilter::default();
        assert_eq!(filter.page_number(), 1);
        assert_eq!(filter.page_size(), 10);
        assert_eq!(filter.max_page_size(), None);
        assert!(filter.ascending());
        assert_eq!(filter.order_by(), None);
    }

    #[test]
    fn test_page_number_clamps_to_one() {
        let mut filter = PagingFilter::new();
        filter.set_page_number(0);
        assert_eq!(filter.page_number(), 1);
        filter.set_page_number(-7);
        assert_eq!(filter.page_number(), 1);
        filter.set_page_number(4);
        assert_eq!(filter.page_number(), 4);
    }

    #[test]
    fn test_non_positive_page_size_is_ignored() {
        let mut filter = PagingFilter::new().with_page_size(23);
        filter.set_page_size(0);
        assert_eq!(filter.page_size(), 23);
        filter.set_page_size(-1);
        assert_eq!(filter.page_size(), 23);
    }

    #[test]
    fn test_max_page_size_clamps() {
        let mut filter = PagingFilter::new().with_max_page_size(20);
        filter.set_page_size(50);
        assert_eq!(filter.page_size(), 20);
        filter.set_page_size(5);
        assert_eq!(filter.page_size(), 5);
    }

    #[test]
    fn test_lowering_max_reclamps_retroactively() {
        let mut filter = PagingFilter::new().with_page_size(40);
        filter.set_max_page_size(25);
        assert_eq!(filter.page_size(), 25);
        filter.set_max_page_size(0);
        assert_eq!(filter.max_page_size(), Some(25));
        assert_eq!(filter.page_size(), 25);
        filter.set_max_page_size(-3);
        assert_eq!(filter.page_size(), 25);
    }

    #[test]
    fn test_deserialize_applies_clamping() {
        let filter: PagingFilter = serde_json::from_str(
            r#"{"pageNumber": -2, "pageSize": 0, "orderBy": "name desc", "ascending": false, "maxPageSize": 1}"#,
        )
        .unwrap();
        assert_eq!(filter.page_number(), 1);
        assert_eq!(filter.page_size(), 10);
        assert_eq!(filter.max_page_size(), None);
        assert_eq!(filter.order_by(), Some("name desc"));
        assert!(!filter.ascending());
    }

    #[test]
    fn test_offset() {
        let filter = PagingFilter::new().with_page_size(23).with_page_number(3);
        assert_eq!(filter.offset(), 46);
    }

    #[test]
    fn test_total_pages() {
        let page: PagedResult<u8> = PagedResult::new(vec![], 75, 1, 15);
        assert_eq!(page.total_pages(), 5);
        let page: PagedResult<u8> = PagedResult::new(vec![], 75, 1, 23);
        assert_eq!(page.total_pages(), 4);
        let page: PagedResult<u8> = PagedResult::new(vec![], 0, 1, 10);
        assert_eq!(page.total_pages(), 0);
        assert!(!page.has_next());
    }

    #[test]
    fn test_navigation_flags() {
        let first: PagedResult<u8> = PagedResult::new(vec![1], 30, 1, 10);
        assert!(!first.has_previous());
        assert!(first.has_next());
        let last: PagedResult<u8> = PagedResult::new(vec![1], 30, 3, 10);
        assert!(last.has_previous());
        assert!(!last.has_next());
        let beyond: PagedResult<u8> = PagedResult::new(vec![], 30, 9, 10);
        assert_eq!(beyond.current_page(), 9);
        assert!(!beyond.has_next());
        assert!(beyond.has_previous());
    }

    #[test]
    fn test_serialize_shape() {
        let page = PagedResult::new(vec!["a"], 1, 1, 10);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalCount"], 1);
        assert_eq!(json["currentPage"], 1);
        assert_eq!(json["hasNext"], false);
    }
}
