use crate::domain::model::PageDescriptor;
use std::num::NonZeroUsize;

/// Number of pages needed to cover `total_count` items.
pub fn plan(total_count: usize, page_size: NonZeroUsize) -> usize {
    total_count.div_ceil(page_size.get())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPlan {
    pub total_count: usize,
    pub page_size: NonZeroUsize,
    pub page_count: usize,
}

impl FetchPlan {
    pub fn new(total_count: usize, page_size: NonZeroUsize) -> Self {
        Self {
            total_count,
            page_size,
            page_count: plan(total_count, page_size),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.page_count == 0
    }

    pub fn pages(&self) -> impl Iterator<Item = PageDescriptor> + '_ {
        (1..=self.page_count as u32).map(move |index| PageDescriptor {
            index,
            size: self.page_size,
        })
    }
}
