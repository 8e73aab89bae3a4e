//! Paging parameters and page results.
//!
//! A [`PageDescriptor`] is zero-based: page `n` of size `s` covers the half-open
//! range `[n * s, n * s + s)` of an already filtered and sorted result set.
//! [`Page`] carries one page of items together with navigation metadata.

use serde::{Deserialize, Serialize};

/// A single page of results.
///
/// # Example
///
/// ```ignore
/// use docrepo::page::Page;
///
/// let page: Page<String> = Page::builder(vec!["item1".to_string()])
///     .with_count(100)
///     .with_next_page(Some(1))
///     .build();
///
/// assert_eq!(page.items.len(), 1);
/// assert_eq!(page.count, 100);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The items contained in this page.
    pub items: Vec<T>,
    /// Total count of items across all pages.
    pub count: usize,
    /// The next page number (if more pages exist).
    pub next_page: Option<usize>,
    /// The previous page number (if this is not the first page).
    pub previous_page: Option<usize>,
}

impl<T> Page<T> {
    /// Creates a new builder for constructing a page.
    pub fn builder(items: Vec<T>) -> PageBuilder<T> {
        PageBuilder::new(items)
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }
}

/// Builder for [`Page`].
pub struct PageBuilder<T> {
    items: Vec<T>,
    count: usize,
    next_page: Option<usize>,
    previous_page: Option<usize>,
}

impl<T> PageBuilder<T> {
    /// Creates a new builder with the given items.
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            count: 0,
            next_page: None,
            previous_page: None,
        }
    }

    /// Sets the total count of items across all pages.
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Sets the next page number (or `None` if this is the last page).
    pub fn with_next_page(mut self, next_page: Option<usize>) -> Self {
        self.next_page = next_page;
        self
    }

    /// Sets the previous page number (or `None` if this is the first page).
    pub fn with_previous_page(mut self, previous_page: Option<usize>) -> Self {
        self.previous_page = previous_page;
        self
    }

    /// Builds and returns the final [`Page`] instance.
    pub fn build(self) -> Page<T> {
        Page {
            items: self.items,
            count: self.count,
            next_page: self.next_page,
            previous_page: self.previous_page,
        }
    }
}

/// Zero-based page number and page size.
///
/// # Example
///
/// ```ignore
/// use docrepo::page::PageDescriptor;
///
/// let page = PageDescriptor::new(2, 50);
/// assert_eq!(page.offset(), 100);
/// assert_eq!(page.limit(), 50);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDescriptor {
    /// The page number, starting at zero.
    pub number: usize,
    /// Number of items per page.
    pub size: usize,
}

impl PageDescriptor {
    /// Creates a new page descriptor.
    pub fn new(number: usize, size: usize) -> Self {
        Self { number, size }
    }

    /// Creates a new builder for constructing a page descriptor.
    pub fn builder() -> PageDescriptorBuilder {
        PageDescriptorBuilder::new()
    }

    /// Number of items to skip. Saturates instead of overflowing.
    pub fn offset(&self) -> usize {
        self.number.saturating_mul(self.size)
    }

    /// Maximum number of items on the page.
    pub fn limit(&self) -> usize {
        self.size
    }

    /// Wraps the items of this page with navigation metadata.
    ///
    /// `total` is the number of items across all pages.
    pub fn to_page<T>(&self, items: Vec<T>, total: usize) -> Page<T> {
        let end = self.offset().saturating_add(self.size);

        Page::builder(items)
            .with_count(total)
            .with_next_page((end < total).then(|| self.number + 1))
            .with_previous_page(
                (self.number > 0).then(|| self.number - 1),
            )
            .build()
    }
}

impl Default for PageDescriptor {
    fn default() -> Self {
        Self { number: 0, size: 10 }
    }
}

/// Builder for [`PageDescriptor`].
///
/// Unset values fall back to the defaults (number 0, size 10).
pub struct PageDescriptorBuilder {
    number: Option<usize>,
    size: Option<usize>,
}

impl PageDescriptorBuilder {
    /// Creates a new builder with no parameters set.
    pub fn new() -> Self {
        Self { number: None, size: None }
    }

    /// Sets the zero-based page number.
    pub fn with_number(mut self, number: usize) -> Self {
        self.number = Some(number);
        self
    }

    /// Sets the number of items per page.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    /// Builds and returns the [`PageDescriptor`].
    pub fn build(self) -> PageDescriptor {
        PageDescriptor {
            number: self.number.unwrap_or(0),
            size: self.size.unwrap_or(10),
        }
    }
}

impl Default for PageDescriptorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_number_times_size() {
        assert_eq!(PageDescriptor::new(0, 2).offset(), 0);
        assert_eq!(PageDescriptor::new(1, 2).offset(), 2);
        assert_eq!(PageDescriptor::new(2, 2).offset(), 4);
        assert_eq!(PageDescriptor::new(usize::MAX, 2).offset(), usize::MAX);
    }

    #[test]
    fn navigation_on_middle_page() {
        let page = PageDescriptor::new(1, 2).to_page(vec![3, 4], 5);

        assert_eq!(page.previous_page, Some(0));
        assert_eq!(page.next_page, Some(2));
        assert_eq!(page.count, 5);
    }

    #[test]
    fn navigation_on_last_page() {
        let page = PageDescriptor::new(2, 2).to_page(vec![5], 5);

        assert_eq!(page.previous_page, Some(1));
        assert_eq!(page.next_page, None);
    }

    #[test]
    fn builder_defaults() {
        let page = PageDescriptor::builder().with_size(25).build();

        assert_eq!(page, PageDescriptor::new(0, 25));
    }
}
