use serde::{Deserialize, Serialize};

/// Per-family pagination block; every entity family in a sync response
/// paginates independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub offset: u64,
    pub limit: u32,
    pub total: u64,
    pub has_more: bool,
}

impl PageInfo {
    pub fn new(offset: u64, limit: u32, total: u64) -> Self {
        PageInfo {
            offset,
            limit,
            total,
            has_more: offset + u64::from(limit) < total,
        }
    }

    /// A family fetched without paging: one page holding everything.
    pub fn whole(total: u64) -> Self {
        PageInfo {
            offset: 0,
            limit: total.min(u32::MAX as u64) as u32,
            total,
            has_more: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, pagination: PageInfo) -> Self {
        Paginated { items, pagination }
    }

    pub fn whole(items: Vec<T>) -> Self {
        let total = items.len() as u64;
        Paginated {
            items,
            pagination: PageInfo::whole(total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_more_accounts_for_offset_and_limit() {
        assert!(PageInfo::new(0, 50, 120).has_more);
        assert!(!PageInfo::new(100, 50, 120).has_more);
        assert!(!PageInfo::whole(7).has_more);
    }
}
