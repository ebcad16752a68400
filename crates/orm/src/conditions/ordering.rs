//! ORDER BY and GROUP BY terms

use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for Order {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Order::Asc),
            "DESC" => Ok(Order::Desc),
            _ => Err(ModelError::InvalidClause(format!("unknown order '{}'", s))),
        }
    }
}

/// A `field ORDER` term, used by both ORDER BY and GROUP BY
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderClause {
    pub field: String,
    pub order: Order,
}

impl OrderClause {
    pub fn new(field: &str, order: Order) -> Self {
        Self {
            field: field.to_string(),
            order,
        }
    }

    pub fn parse(field: &str, order: &str) -> Result<Self, ModelError> {
        Ok(Self::new(field, order.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_parsing() {
        assert_eq!("desc".parse::<Order>().unwrap(), Order::Desc);
        assert_eq!(OrderClause::parse("id", "ASC").unwrap(), OrderClause::new("id", Order::Asc));
        assert!(matches!(OrderClause::parse("id", "UP"), Err(ModelError::InvalidClause(_))));
    }
}
