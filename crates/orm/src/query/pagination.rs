//! Query Builder pagination operations

use super::builder::QueryBuilder;

impl QueryBuilder {
    /// Add LIMIT clause
    pub fn limit(mut self, count: u64) -> Self {
        self.spec.limit = Some(count);
        self
    }

    /// Add OFFSET clause
    pub fn offset(mut self, count: u64) -> Self {
        self.spec.offset = Some(count);
        self
    }

    /// Add pagination (LIMIT + OFFSET). Pages start at 1; page 0 is
    /// treated as the first page.
    pub fn paginate(mut self, per_page: u64, page: u64) -> Self {
        self.spec.limit = Some(per_page);
        self.spec.offset = Some(page.saturating_sub(1) * per_page);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_offset() {
        assert_eq!(
            QueryBuilder::table("t").limit(5).offset(4).get_sql().unwrap(),
            "SELECT * FROM t LIMIT 5 OFFSET 4"
        );
        assert_eq!(
            QueryBuilder::table("t").offset(4).get_sql().unwrap(),
            "SELECT * FROM t LIMIT -1 OFFSET 4"
        );
    }

    #[test]
    fn test_paginate() {
        assert_eq!(
            QueryBuilder::table("t").paginate(10, 3).get_sql().unwrap(),
            "SELECT * FROM t LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            QueryBuilder::table("t").paginate(10, 0).get_sql().unwrap(),
            "SELECT * FROM t LIMIT 10 OFFSET 0"
        );
    }
}
