//! Pure query engine: filter → sort → paginate over one snapshot
//!
//! Stateless and deterministic given the same inputs. Filters AND-combine;
//! sorting is single-field with ties keeping the underlying snapshot order;
//! pagination is an offset cursor. The cursor is only meaningful against
//! the snapshot it was produced from; replacing the snapshot between two
//! cursor-driven pages invalidates it, by design.

use types::asset::{AssetRecord, Snapshot};
use types::query::{
    FilterOptions, Page, PaginationOptions, SortDirection, SortField, SortOptions,
};

/// Run a query against a snapshot, producing one page of results.
pub fn run(
    snapshot: &Snapshot,
    filters: &FilterOptions,
    sort: &SortOptions,
    pagination: &PaginationOptions,
) -> Page<AssetRecord> {
    let mut rows: Vec<&AssetRecord> = snapshot
        .records
        .iter()
        .filter(|record| matches_filters(record, filters))
        .collect();

    sort_rows(&mut rows, sort);
    paginate(&rows, pagination)
}

fn matches_filters(record: &AssetRecord, filters: &FilterOptions) -> bool {
    // `time_period` is accepted for forward compatibility but does not
    // filter anything yet.

    if let Some(min) = filters.min_volume {
        if record.volume_24h < min {
            return false;
        }
    }
    if let Some(max) = filters.max_volume {
        if record.volume_24h > max {
            return false;
        }
    }
    if let Some(min) = filters.min_price_change {
        if record.price_change_24h < min {
            return false;
        }
    }
    if let Some(max) = filters.max_price_change {
        if record.price_change_24h > max {
            return false;
        }
    }
    if let Some(dex_ids) = &filters.dex_ids {
        if !dex_ids.is_empty() {
            let mut sources = record.source_id.split(',');
            if !sources.any(|source| dex_ids.iter().any(|wanted| wanted == source)) {
                return false;
            }
        }
    }
    if let Some(symbols) = &filters.symbols {
        if !symbols.is_empty() && !symbols.contains(&record.symbol) {
            return false;
        }
    }
    true
}

fn sort_rows(rows: &mut [&AssetRecord], sort: &SortOptions) {
    let key = |record: &AssetRecord| -> f64 {
        match sort.field {
            SortField::Volume24h => record.volume_24h,
            SortField::PriceChange24h => record.price_change_24h,
            SortField::MarketCap => record.market_cap,
            SortField::PriceUsd => record.price_usd,
            SortField::Liquidity => record.liquidity,
        }
    };

    // Stable sort: ties keep the snapshot's order
    match sort.direction {
        SortDirection::Asc => rows.sort_by(|a, b| key(a).total_cmp(&key(b))),
        SortDirection::Desc => rows.sort_by(|a, b| key(b).total_cmp(&key(a))),
    }
}

fn paginate(rows: &[&AssetRecord], pagination: &PaginationOptions) -> Page<AssetRecord> {
    let total = rows.len();
    // An unparsable cursor starts from the beginning rather than erroring
    let offset = pagination
        .cursor
        .as_deref()
        .and_then(|cursor| cursor.parse::<usize>().ok())
        .unwrap_or(0);
    let limit = pagination.limit;

    let data: Vec<AssetRecord> = rows
        .iter()
        .skip(offset)
        .take(limit)
        .map(|record| (*record).clone())
        .collect();

    let has_more = offset + limit < total;
    let next_cursor = has_more.then(|| (offset + limit).to_string());

    Page {
        data,
        next_cursor,
        has_more,
        total,
    }
}
