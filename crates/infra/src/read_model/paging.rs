use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request. Out-of-range values are clamped, never rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Missing query parameters fall back to page 1 and the given default size.
    pub fn from_query(page: Option<u32>, page_size: Option<u32>, default_size: u32) -> Self {
        Self::new(page.unwrap_or(1), page_size.unwrap_or(default_size))
    }

    fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
    /// Never below 1, even for an empty result.
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered list.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> Self {
        let request = PageRequest::new(request.page, request.page_size);
        let total_items = all.len() as u64;
        let total_pages = total_items.div_ceil(request.page_size as u64).max(1) as u32;

        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.page_size as usize)
            .collect();

        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total_items,
            total_pages,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
            total_pages: self.total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_result_still_has_one_page() {
        let page: Page<u8> = Page::from_sorted(vec![], PageRequest::default());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_items, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn slices_the_requested_page() {
        let page = Page::from_sorted((1..=45).collect::<Vec<_>>(), PageRequest::new(3, 20));
        assert_eq!(page.items, (41..=45).collect::<Vec<_>>());
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn request_is_clamped() {
        assert_eq!(PageRequest::new(0, 0), PageRequest { page: 1, page_size: 1 });
        assert_eq!(PageRequest::new(2, 1000).page_size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::from_query(None, None, 10), PageRequest::new(1, 10));
    }

    proptest! {
        #[test]
        fn total_pages_is_ceiling_of_items(len in 0usize..500, size in 1u32..=100) {
            let page = Page::from_sorted(vec![(); len], PageRequest::new(1, size));
            let expected = ((len as u64 + size as u64 - 1) / size as u64).max(1) as u32;
            prop_assert_eq!(page.total_pages, expected);
            prop_assert!(page.items.len() <= size as usize);
        }
    }
}
