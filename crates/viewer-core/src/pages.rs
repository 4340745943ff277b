//! Displayed page order.
//!
//! By default page `i` of the view shows page `i` of the document. A user
//! supplied order can repeat document pages or leave some out.

/// Maps display indices to document pages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageOrder {
    document_pages: usize,
    order: Option<Vec<usize>>,
}

impl PageOrder {
    /// Every document page once, in document order.
    pub fn identity(document_pages: usize) -> Self {
        Self { document_pages, order: None }
    }

    /// A user supplied order. An empty list means identity.
    ///
    /// Entries that do not name an existing document page are kept so that
    /// display indices stay stable; they resolve to `None`.
    pub fn custom(order: Vec<usize>, document_pages: usize) -> Self {
        if order.is_empty() {
            return Self::identity(document_pages);
        }
        Self { document_pages, order: Some(order) }
    }

    /// Number of displayed pages.
    pub fn len(&self) -> usize {
        match &self.order {
            Some(order) => order.len(),
            None => self.document_pages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_identity(&self) -> bool {
        self.order.is_none()
    }

    pub fn document_pages(&self) -> usize {
        self.document_pages
    }

    /// Document page shown at display index `page`, if valid.
    pub fn document_page(&self, page: usize) -> Option<usize> {
        let document_page = match &self.order {
            Some(order) => *order.get(page)?,
            None => page,
        };
        (document_page < self.document_pages).then_some(document_page)
    }

    /// Resolves every display index, in display order.
    pub fn resolve(&self) -> Vec<Option<usize>> {
        (0..self.len()).map(|page| self.document_page(page)).collect()
    }

    /// Clamps any requested page number into the displayable range.
    pub fn clamp_page(&self, page: i64) -> usize {
        if page <= 0 || self.is_empty() {
            return 0;
        }
        (page as usize).min(self.len() - 1)
    }
}

/// Collapses runs of equal neighbours: `0,1,2,2,3` becomes `0,1,2,3`.
pub fn dedup_consecutive(pages: &[usize]) -> Vec<usize> {
    let mut result = pages.to_vec();
    result.dedup();
    result
}

/// Numbers runs of equal neighbours: `0,4,4,6,6,6,3` becomes `0,1,1,2,2,2,3`.
pub fn group_indices(pages: &[usize]) -> Vec<usize> {
    let mut result = Vec::with_capacity(pages.len());
    let mut group = 0;
    for (i, page) in pages.iter().enumerate() {
        if i > 0 && pages[i - 1] != *page {
            group += 1;
        }
        result.push(group);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_order() {
        let order = PageOrder::identity(3);

        assert_eq!(order.len(), 3);
        assert_eq!(order.document_page(2), Some(2));
        assert_eq!(order.document_page(3), None);
        assert!(order.is_identity());
    }

    #[test]
    fn test_custom_order_repeats_and_skips() {
        let order = PageOrder::custom(vec![2, 0, 0, 7], 3);

        assert_eq!(order.len(), 4);
        assert_eq!(order.resolve(), vec![Some(2), Some(0), Some(0), None]);
    }

    #[test]
    fn test_empty_custom_order_is_identity() {
        assert_eq!(PageOrder::custom(Vec::new(), 5), PageOrder::identity(5));
    }

    #[test]
    fn test_clamp_page() {
        let order = PageOrder::custom(vec![1, 1], 4);

        assert_eq!(order.clamp_page(-2), 0);
        assert_eq!(order.clamp_page(1), 1);
        assert_eq!(order.clamp_page(9), 1);
        assert_eq!(PageOrder::identity(0).clamp_page(3), 0);
    }

    #[test]
    fn test_dedup_consecutive() {
        assert_eq!(dedup_consecutive(&[0, 1, 2, 2, 3]), vec![0, 1, 2, 3]);
        assert_eq!(dedup_consecutive(&[]), Vec::<usize>::new());
    }

    #[test]
    fn test_group_indices() {
        assert_eq!(group_indices(&[0, 4, 4, 6, 6, 6, 3]), vec![0, 1, 1, 2, 2, 2, 3]);
    }
}
