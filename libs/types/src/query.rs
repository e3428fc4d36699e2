//! Filter, sort, and pagination options for dataset queries
//!
//! These options travel over both the HTTP query surface and the WebSocket
//! subscription protocol, so they serialize in camelCase and every field is
//! optional with sensible defaults.

use serde::{Deserialize, Serialize};

/// Default page size when the client does not specify one.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Field a result set can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Volume24h,
    PriceChange24h,
    MarketCap,
    PriceUsd,
    Liquidity,
}

impl SortField {
    /// Parse a wire-format field name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "volume24h" => Some(Self::Volume24h),
            "priceChange24h" => Some(Self::PriceChange24h),
            "marketCap" => Some(Self::MarketCap),
            "priceUsd" => Some(Self::PriceUsd),
            "liquidity" => Some(Self::Liquidity),
            _ => None,
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse a wire-format direction name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Record predicates, AND-combined; every predicate is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterOptions {
    /// Accepted for forward compatibility; currently passes all records.
    pub time_period: Option<String>,
    pub min_volume: Option<f64>,
    pub max_volume: Option<f64>,
    pub min_price_change: Option<f64>,
    pub max_price_change: Option<f64>,
    /// Matches when ANY of a record's comma-joined sources is in this set.
    pub dex_ids: Option<Vec<String>>,
    /// Exact symbol membership.
    pub symbols: Option<Vec<String>>,
}

impl FilterOptions {
    /// Shallow-merge `patch` over `self`: provided fields replace existing
    /// ones, absent fields are retained.
    pub fn merge(&mut self, patch: FilterOptions) {
        if patch.time_period.is_some() {
            self.time_period = patch.time_period;
        }
        if patch.min_volume.is_some() {
            self.min_volume = patch.min_volume;
        }
        if patch.max_volume.is_some() {
            self.max_volume = patch.max_volume;
        }
        if patch.min_price_change.is_some() {
            self.min_price_change = patch.min_price_change;
        }
        if patch.max_price_change.is_some() {
            self.max_price_change = patch.max_price_change;
        }
        if patch.dex_ids.is_some() {
            self.dex_ids = patch.dex_ids;
        }
        if patch.symbols.is_some() {
            self.symbols = patch.symbols;
        }
    }
}

/// Single-field sort over the filtered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOptions {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            field: SortField::Volume24h,
            direction: SortDirection::Desc,
        }
    }
}

/// Partial update to [`SortOptions`]; absent fields are retained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortUpdate {
    pub field: Option<SortField>,
    pub direction: Option<SortDirection>,
}

impl SortOptions {
    /// Apply a partial update, keeping unspecified fields.
    pub fn apply(&mut self, patch: SortUpdate) {
        if let Some(field) = patch.field {
            self.field = field;
        }
        if let Some(direction) = patch.direction {
            self.direction = direction;
        }
    }
}

/// Offset-style cursor pagination.
///
/// The cursor is the numeric start offset into the filtered+sorted list,
/// encoded as a string. It is not a stable object identity: replacing the
/// underlying snapshot between two cursor-driven pages invalidates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaginationOptions {
    pub limit: usize,
    pub cursor: Option<String>,
}

impl Default for PaginationOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            cursor: None,
        }
    }
}

/// Partial update to [`PaginationOptions`]; absent fields are retained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationUpdate {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl PaginationOptions {
    /// Apply a partial update, keeping unspecified fields.
    pub fn apply(&mut self, patch: PaginationUpdate) {
        if let Some(limit) = patch.limit {
            self.limit = limit;
        }
        if patch.cursor.is_some() {
            self.cursor = patch.cursor;
        }
    }
}

/// One page of a filtered, sorted, paginated result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Start offset of the next page, as a string; absent on the last page.
    pub next_cursor: Option<String>,
    pub has_more: bool,
    /// Total matching records before pagination.
    pub total: usize,
}

impl<T> Page<T> {
    /// An empty page over an empty result set.
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            next_cursor: None,
            has_more: false,
            total: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_field_parse() {
        assert_eq!(SortField::parse("volume24h"), Some(SortField::Volume24h));
        assert_eq!(
            SortField::parse("priceChange24h"),
            Some(SortField::PriceChange24h)
        );
        assert_eq!(SortField::parse("marketCap"), Some(SortField::MarketCap));
        assert_eq!(SortField::parse("priceUsd"), Some(SortField::PriceUsd));
        assert_eq!(SortField::parse("liquidity"), Some(SortField::Liquidity));
        assert_eq!(SortField::parse("bogus"), None);
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!(SortDirection::parse("asc"), Some(SortDirection::Asc));
        assert_eq!(SortDirection::parse("desc"), Some(SortDirection::Desc));
        assert_eq!(SortDirection::parse("sideways"), None);
    }

    #[test]
    fn test_filter_merge_keeps_absent_fields() {
        let mut filters = FilterOptions {
            min_volume: Some(100.0),
            max_volume: Some(1000.0),
            ..FilterOptions::default()
        };

        filters.merge(FilterOptions {
            min_volume: Some(500.0),
            symbols: Some(vec!["SOL".to_string()]),
            ..FilterOptions::default()
        });

        assert_eq!(filters.min_volume, Some(500.0));
        assert_eq!(filters.max_volume, Some(1000.0), "absent field retained");
        assert_eq!(filters.symbols, Some(vec!["SOL".to_string()]));
    }

    #[test]
    fn test_sort_apply_partial_update() {
        let mut sort = SortOptions::default();
        sort.apply(SortUpdate {
            direction: Some(SortDirection::Asc),
            field: None,
        });
        assert_eq!(sort.field, SortField::Volume24h, "field retained");
        assert_eq!(sort.direction, SortDirection::Asc);
    }

    #[test]
    fn test_pagination_apply_partial_update() {
        let mut pagination = PaginationOptions::default();
        pagination.apply(PaginationUpdate {
            cursor: Some("40".to_string()),
            limit: None,
        });
        assert_eq!(pagination.limit, DEFAULT_PAGE_LIMIT);
        assert_eq!(pagination.cursor.as_deref(), Some("40"));
    }

    #[test]
    fn test_pagination_defaults() {
        let pagination: PaginationOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(pagination.limit, 20);
        assert!(pagination.cursor.is_none());
    }

    #[test]
    fn test_filter_options_wire_format() {
        let json = r#"{"minVolume": 1000, "dexIds": ["raydium", "orca"]}"#;
        let filters: FilterOptions = serde_json::from_str(json).unwrap();
        assert_eq!(filters.min_volume, Some(1000.0));
        assert_eq!(
            filters.dex_ids,
            Some(vec!["raydium".to_string(), "orca".to_string()])
        );
        assert!(filters.symbols.is_none());
    }
}
