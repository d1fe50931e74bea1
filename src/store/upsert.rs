//! Chunked batch upsert (§4.H), grounded on
//! `examples/original_source/dao/pigeon_dao.py::insert_or_update_pigeon_info_batch`
//! (the `INSERT ... ON DUPLICATE KEY UPDATE` shape) with the legacy
//! `VALUES(col)` form replaced by the row-alias `AS NEW` form SPEC_FULL.md §4.H
//! names explicitly (MySQL 8.0.19+). Retry-on-deadlock wraps every chunk.

use std::time::Duration;

use sqlx::mysql::MySql;
use sqlx::{MySqlPool, QueryBuilder};

use crate::error::StoreError;
use crate::models::domain::{Auction, BidRecord, Pigeon, Section};

const DEFAULT_CHUNK_SIZE: usize = 1000;
const RETRY_BASE: Duration = Duration::from_millis(200);
const MAX_RETRIES: u32 = 3;

/// Runs `attempt` up to `MAX_RETRIES + 1` times, retrying only on deadlock /
/// lock-wait-timeout (vendor codes 1213, 1205) with exponential backoff.
async fn with_retry<F, Fut, T>(attempt: F) -> Result<T, StoreError>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    let mut backoff = RETRY_BASE;
    for try_no in 0..=MAX_RETRIES {
        match attempt().await {
            Ok(v) => return Ok(v),
            Err(e) if StoreError::is_retryable(&e) && try_no < MAX_RETRIES => {
                let code = StoreError::vendor_code(&e).unwrap_or(0);
                tracing::warn!(try_no, code, "transient store error, retrying after backoff");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) if StoreError::is_retryable(&e) => {
                let code = StoreError::vendor_code(&e).unwrap_or(0);
                return Err(StoreError::RetriesExhausted { code });
            }
            Err(e) => return Err(StoreError::from(e)),
        }
    }
    unreachable!("loop always returns within MAX_RETRIES+1 iterations")
}

fn chunks<T>(items: &[T], size: usize) -> impl Iterator<Item = &[T]> {
    items.chunks(size.max(1))
}

pub async fn upsert_auctions(pool: &MySqlPool, rows: &[Auction]) -> Result<(), StoreError> {
    let mut sorted: Vec<&Auction> = rows.iter().collect();
    sorted.sort_by_key(|a| a.id);
    for chunk in chunks(&sorted, DEFAULT_CHUNK_SIZE) {
        with_retry(|| async {
            let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
                "INSERT INTO auctions (id, name, organizer_name, organizer_phone, \
                 customer_service_phone, start_ts, end_ts, status_name, live_status_name) ",
            );
            qb.push_values(chunk.iter(), |mut b, a| {
                b.push_bind(a.id)
                    .push_bind(&a.name)
                    .push_bind(&a.organizer_name)
                    .push_bind(&a.organizer_phone)
                    .push_bind(&a.customer_service_phone)
                    .push_bind(a.start_ts)
                    .push_bind(a.end_ts)
                    .push_bind(&a.status_name)
                    .push_bind(&a.live_status_name);
            });
            qb.push(
                " AS new_row ON DUPLICATE KEY UPDATE \
                 name = new_row.name, organizer_name = new_row.organizer_name, \
                 organizer_phone = new_row.organizer_phone, \
                 customer_service_phone = new_row.customer_service_phone, \
                 start_ts = new_row.start_ts, end_ts = new_row.end_ts, \
                 status_name = new_row.status_name, live_status_name = new_row.live_status_name",
            );
            qb.build().execute(pool).await
        })
        .await?;
    }
    Ok(())
}

pub async fn upsert_sections(pool: &MySqlPool, rows: &[Section]) -> Result<(), StoreError> {
    let mut sorted: Vec<&Section> = rows.iter().collect();
    sorted.sort_by_key(|s| s.id);
    for chunk in chunks(&sorted, DEFAULT_CHUNK_SIZE) {
        with_retry(|| async {
            let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
                "INSERT INTO sections (id, auction_id, name, match_id, start_rank, end_rank, \
                 count, sort_type, start_price, create_ts, status_name) ",
            );
            qb.push_values(chunk.iter(), |mut b, s| {
                let sort_type = s.sort_type.map(|t| match t {
                    crate::models::domain::SortType::Asc => "asc",
                    crate::models::domain::SortType::Desc => "desc",
                });
                b.push_bind(s.id)
                    .push_bind(s.auction_id)
                    .push_bind(&s.name)
                    .push_bind(s.match_id)
                    .push_bind(s.start_rank)
                    .push_bind(s.end_rank)
                    .push_bind(s.count)
                    .push_bind(sort_type)
                    .push_bind(s.start_price)
                    .push_bind(s.create_ts)
                    .push_bind(&s.status_name);
            });
            qb.push(
                " AS new_row ON DUPLICATE KEY UPDATE \
                 auction_id = new_row.auction_id, name = new_row.name, \
                 match_id = new_row.match_id, start_rank = new_row.start_rank, \
                 end_rank = new_row.end_rank, count = new_row.count, \
                 sort_type = new_row.sort_type, start_price = new_row.start_price, \
                 create_ts = new_row.create_ts, status_name = new_row.status_name",
            );
            qb.build().execute(pool).await
        })
        .await?;
    }
    Ok(())
}

pub async fn upsert_pigeons(pool: &MySqlPool, rows: &[Pigeon]) -> Result<(), StoreError> {
    let mut sorted: Vec<&Pigeon> = rows.iter().collect();
    sorted.sort_by_key(|p| p.id);
    for chunk in chunks(&sorted, DEFAULT_CHUNK_SIZE) {
        with_retry(|| async {
            let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
                "INSERT INTO pigeons (id, code, auction_id, section_id, name, foot_ring, \
                 feather_color, matcher_name, start_price, start_ts, end_ts, status_name, \
                 bid_user_code, bid_user_nickname, bid_quote, bid_time, order_no, view_count) ",
            );
            qb.push_values(chunk.iter(), |mut b, p| {
                b.push_bind(p.id)
                    .push_bind(&p.code)
                    .push_bind(p.auction_id)
                    .push_bind(p.section_id)
                    .push_bind(&p.name)
                    .push_bind(&p.foot_ring)
                    .push_bind(&p.feather_color)
                    .push_bind(&p.matcher_name)
                    .push_bind(p.start_price)
                    .push_bind(p.start_ts)
                    .push_bind(p.end_ts)
                    .push_bind(&p.status_name)
                    .push_bind(&p.bid_user_code)
                    .push_bind(&p.bid_user_nickname)
                    .push_bind(p.bid_quote)
                    .push_bind(p.bid_time)
                    .push_bind(&p.order_no)
                    .push_bind(p.view_count);
            });
            qb.push(
                " AS new_row ON DUPLICATE KEY UPDATE \
                 code = new_row.code, auction_id = new_row.auction_id, \
                 section_id = new_row.section_id, name = new_row.name, \
                 foot_ring = new_row.foot_ring, feather_color = new_row.feather_color, \
                 matcher_name = new_row.matcher_name, start_price = new_row.start_price, \
                 start_ts = new_row.start_ts, end_ts = new_row.end_ts, \
                 status_name = new_row.status_name, bid_user_code = new_row.bid_user_code, \
                 bid_user_nickname = new_row.bid_user_nickname, bid_quote = new_row.bid_quote, \
                 bid_time = new_row.bid_time, order_no = new_row.order_no, \
                 view_count = new_row.view_count",
            );
            qb.build().execute(pool).await
        })
        .await?;
    }
    Ok(())
}

pub async fn upsert_bid_records(pool: &MySqlPool, rows: &[BidRecord]) -> Result<(), StoreError> {
    let mut sorted: Vec<&BidRecord> = rows.iter().collect();
    sorted.sort_by_key(|r| r.id);
    for chunk in chunks(&sorted, DEFAULT_CHUNK_SIZE) {
        with_retry(|| async {
            let mut qb: QueryBuilder<MySql> = QueryBuilder::new(
                "INSERT INTO bid_records (id, code, auction_id, pigeon_id, quote, margin, type, \
                 status, user_id, user_code, user_nickname, create_ts, update_ts, cancel_ts, \
                 cancel_reason) ",
            );
            qb.push_values(chunk.iter(), |mut b, r| {
                b.push_bind(r.id)
                    .push_bind(&r.code)
                    .push_bind(r.auction_id)
                    .push_bind(r.pigeon_id)
                    .push_bind(r.quote)
                    .push_bind(r.margin)
                    .push_bind(&r.kind)
                    .push_bind(&r.status)
                    .push_bind(r.user_id)
                    .push_bind(&r.user_code)
                    .push_bind(&r.user_nickname)
                    .push_bind(r.create_ts)
                    .push_bind(r.update_ts)
                    .push_bind(r.cancel_ts)
                    .push_bind(&r.cancel_reason);
            });
            qb.push(
                " AS new_row ON DUPLICATE KEY UPDATE \
                 code = new_row.code, quote = new_row.quote, margin = new_row.margin, \
                 type = new_row.type, status = new_row.status, user_id = new_row.user_id, \
                 user_code = new_row.user_code, user_nickname = new_row.user_nickname, \
                 update_ts = new_row.update_ts, cancel_ts = new_row.cancel_ts, \
                 cancel_reason = new_row.cancel_reason",
            );
            qb.build().execute(pool).await
        })
        .await?;
    }
    Ok(())
}

/// Status sweep: rows present in `table` but absent from `live_ids` are
/// marked finished. Skipped entirely when `live_ids` is empty, per §4.H —
/// an empty fetch must never be read as "everything finished".
pub async fn sweep_finished(
    pool: &MySqlPool,
    table: &str,
    live_ids: &[i64],
    auction_scope: Option<i64>,
) -> Result<u64, StoreError> {
    if live_ids.is_empty() {
        tracing::debug!(table, "skipping status sweep: empty live set");
        return Ok(0);
    }
    let placeholders = live_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let sql = match auction_scope {
        Some(_) => format!(
            "UPDATE {table} SET status_name = 'finished' \
             WHERE auction_id = ? AND id NOT IN ({placeholders})"
        ),
        None => format!("UPDATE {table} SET status_name = 'finished' WHERE id NOT IN ({placeholders})"),
    };
    let result = with_retry(|| {
        let sql = sql.clone();
        async move {
            let mut query = sqlx::query(&sql);
            if let Some(auction_id) = auction_scope {
                query = query.bind(auction_id);
            }
            for id in live_ids {
                query = query.bind(id);
            }
            query.execute(pool).await
        }
    })
    .await?;
    Ok(result.rows_affected())
}
