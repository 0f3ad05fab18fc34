use serde::{Deserialize, Serialize};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT_EXCLUSIVE: i64 = 100;

/// Page-number pagination read from the query string.
///
/// `total` is never read from the client; it is filled in from a count
/// query before the paging block is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub limit: i64,
    #[serde(skip_deserializing)]
    pub total: i64,
}

impl Paging {
    pub fn process(&mut self) {
        if self.page <= 0 {
            self.page = DEFAULT_PAGE;
        }
        if self.limit <= 0 || self.limit >= MAX_LIMIT_EXCLUSIVE {
            self.limit = DEFAULT_LIMIT;
        }
    }

    /// Saturates instead of overflowing; a saturated offset selects no rows.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}
