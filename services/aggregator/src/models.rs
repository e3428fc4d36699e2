//! Request and response DTOs for the HTTP surface
//!
//! Query parameters arrive flat and comma-separated; responses use the
//! `{success, data, ...}` envelope with camelCase field names.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use types::asset::AssetRecord;
use types::query::{
    FilterOptions, Page, PaginationOptions, SortDirection, SortField, SortOptions,
    DEFAULT_PAGE_LIMIT,
};

use crate::cache::RefreshOutcome;
use crate::error::ApiError;

/// Flat query parameters accepted by `GET /api/tokens`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenQueryParams {
    pub time_period: Option<String>,
    pub min_volume: Option<f64>,
    pub max_volume: Option<f64>,
    pub min_price_change: Option<f64>,
    pub max_price_change: Option<f64>,
    /// Comma-separated source list.
    pub dex_ids: Option<String>,
    /// Comma-separated symbol list.
    pub symbols: Option<String>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

impl TokenQueryParams {
    /// Split into the query engine's option types, rejecting unknown sort
    /// parameters.
    pub fn into_parts(
        self,
    ) -> Result<(FilterOptions, SortOptions, PaginationOptions), ApiError> {
        let field = match self.sort_field.as_deref() {
            None => SortField::Volume24h,
            Some(raw) => SortField::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown sort field: {}", raw)))?,
        };
        let direction = match self.sort_direction.as_deref() {
            None => SortDirection::Desc,
            Some(raw) => SortDirection::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown sort direction: {}", raw)))?,
        };

        let filters = FilterOptions {
            time_period: self.time_period,
            min_volume: self.min_volume,
            max_volume: self.max_volume,
            min_price_change: self.min_price_change,
            max_price_change: self.max_price_change,
            dex_ids: self.dex_ids.map(split_csv).filter(|v| !v.is_empty()),
            symbols: self.symbols.map(split_csv).filter(|v| !v.is_empty()),
        };

        // Zero behaves like "unset" and falls back to the default
        let limit = match self.limit {
            None | Some(0) => DEFAULT_PAGE_LIMIT,
            Some(n) => n,
        };

        Ok((
            filters,
            SortOptions { field, direction },
            PaginationOptions {
                limit,
                cursor: self.cursor,
            },
        ))
    }
}

fn split_csv(raw: String) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Pagination block of the tokens-list envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub total: usize,
}

/// Envelope for `GET /api/tokens`.
#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub success: bool,
    pub data: Vec<AssetRecord>,
    pub pagination: PaginationMeta,
    pub timestamp: String,
}

impl TokensResponse {
    pub fn from_page(page: Page<AssetRecord>) -> Self {
        Self {
            success: true,
            pagination: PaginationMeta {
                next_cursor: page.next_cursor,
                has_more: page.has_more,
                total: page.total,
            },
            data: page.data,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Envelope for `GET /api/tokens/:address`.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub data: AssetRecord,
    pub timestamp: String,
}

impl TokenResponse {
    pub fn new(record: AssetRecord) -> Self {
        Self {
            success: true,
            data: record,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Envelope for `POST /api/refresh`.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub changed: bool,
    pub outcome: &'static str,
    pub records: usize,
    pub timestamp: String,
}

impl RefreshResponse {
    pub fn from_outcome(outcome: RefreshOutcome) -> Self {
        let (changed, label, records) = match outcome {
            RefreshOutcome::Changed { records } => (true, "changed", records),
            RefreshOutcome::Unchanged { records } => (false, "unchanged", records),
            RefreshOutcome::SkippedEmpty => (false, "skipped-empty", 0),
        };
        Self {
            success: true,
            changed,
            outcome: label,
            records,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Envelope for `GET /health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub connected_sessions: usize,
    pub timestamp: String,
}

/// Connection info block for `GET /api/websocket`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WsInfo {
    pub path: &'static str,
    pub connected_clients: usize,
    pub message_types: Vec<&'static str>,
}

/// Envelope for `GET /api/websocket`.
#[derive(Debug, Serialize)]
pub struct WsInfoResponse {
    pub success: bool,
    pub data: WsInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_parts_splits_comma_lists() {
        let params = TokenQueryParams {
            dex_ids: Some("raydium, orca".to_string()),
            symbols: Some("SOL,BONK".to_string()),
            ..TokenQueryParams::default()
        };
        let (filters, sort, pagination) = params.into_parts().unwrap();

        assert_eq!(
            filters.dex_ids,
            Some(vec!["raydium".to_string(), "orca".to_string()])
        );
        assert_eq!(
            filters.symbols,
            Some(vec!["SOL".to_string(), "BONK".to_string()])
        );
        assert_eq!(sort.field, SortField::Volume24h);
        assert_eq!(sort.direction, SortDirection::Desc);
        assert_eq!(pagination.limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn test_into_parts_rejects_unknown_sort_field() {
        let params = TokenQueryParams {
            sort_field: Some("popularity".to_string()),
            ..TokenQueryParams::default()
        };
        assert!(params.into_parts().is_err());
    }

    #[test]
    fn test_zero_limit_falls_back_to_default() {
        let params = TokenQueryParams {
            limit: Some(0),
            ..TokenQueryParams::default()
        };
        let (_, _, pagination) = params.into_parts().unwrap();
        assert_eq!(pagination.limit, DEFAULT_PAGE_LIMIT);
    }

    #[test]
    fn test_explicit_sort_parameters() {
        let params = TokenQueryParams {
            sort_field: Some("priceUsd".to_string()),
            sort_direction: Some("asc".to_string()),
            limit: Some(5),
            cursor: Some("10".to_string()),
            ..TokenQueryParams::default()
        };
        let (_, sort, pagination) = params.into_parts().unwrap();
        assert_eq!(sort.field, SortField::PriceUsd);
        assert_eq!(sort.direction, SortDirection::Asc);
        assert_eq!(pagination.limit, 5);
        assert_eq!(pagination.cursor.as_deref(), Some("10"));
    }

    #[test]
    fn test_empty_csv_treated_as_absent() {
        let params = TokenQueryParams {
            dex_ids: Some(" , ".to_string()),
            ..TokenQueryParams::default()
        };
        let (filters, _, _) = params.into_parts().unwrap();
        assert!(filters.dex_ids.is_none());
    }
}
