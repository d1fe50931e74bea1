//! Schema bootstrap (§4.H): create tables if absent, add helper indexes
//! checked against `information_schema` rather than blind `CREATE INDEX`.
//!
//! Grounded on `examples/original_source/dao/pigeon_dao.py::ensure_table_pigeon_info`
//! and `examples/original_source/dao/gongpeng_dao.py`'s analogous table-creation
//! methods, collapsed into one bootstrap routine per SPEC_FULL.md §7.

use sqlx::MySqlPool;

const CREATE_AUCTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS auctions (
    id BIGINT PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    organizer_name VARCHAR(255),
    organizer_phone VARCHAR(64),
    customer_service_phone VARCHAR(64),
    start_ts BIGINT,
    end_ts BIGINT,
    status_name VARCHAR(64),
    live_status_name VARCHAR(64)
) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4
"#;

const CREATE_SECTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS sections (
    id BIGINT PRIMARY KEY,
    auction_id BIGINT NOT NULL,
    name VARCHAR(255) NOT NULL,
    match_id BIGINT,
    start_rank BIGINT,
    end_rank BIGINT,
    count BIGINT,
    sort_type VARCHAR(8),
    start_price DECIMAL(12, 2),
    create_ts BIGINT,
    status_name VARCHAR(64)
) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4
"#;

const CREATE_PIGEONS: &str = r#"
CREATE TABLE IF NOT EXISTS pigeons (
    id BIGINT PRIMARY KEY,
    code VARCHAR(255) NOT NULL,
    auction_id BIGINT NOT NULL,
    section_id BIGINT NOT NULL,
    name VARCHAR(255) NOT NULL,
    foot_ring VARCHAR(64),
    feather_color VARCHAR(64),
    matcher_name VARCHAR(255),
    start_price DECIMAL(12, 2),
    start_ts BIGINT,
    end_ts BIGINT,
    status_name VARCHAR(64),
    bid_user_code VARCHAR(255),
    bid_user_nickname VARCHAR(255),
    bid_quote DECIMAL(12, 2),
    bid_time BIGINT,
    order_no VARCHAR(255),
    view_count BIGINT NOT NULL DEFAULT 0
) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4
"#;

const CREATE_BID_RECORDS: &str = r#"
CREATE TABLE IF NOT EXISTS bid_records (
    id BIGINT PRIMARY KEY,
    code VARCHAR(255),
    auction_id BIGINT NOT NULL,
    pigeon_id BIGINT NOT NULL,
    quote DECIMAL(12, 2) NOT NULL,
    margin DECIMAL(12, 2),
    type VARCHAR(32) NOT NULL,
    status VARCHAR(32) NOT NULL,
    user_id BIGINT,
    user_code VARCHAR(255),
    user_nickname VARCHAR(255),
    create_ts BIGINT,
    update_ts BIGINT,
    cancel_ts BIGINT,
    cancel_reason VARCHAR(255)
) ENGINE = InnoDB DEFAULT CHARSET = utf8mb4
"#;

async fn index_exists(pool: &MySqlPool, table: &str, index: &str) -> sqlx::Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT COUNT(*) FROM information_schema.statistics \
         WHERE table_schema = DATABASE() AND table_name = ? AND index_name = ?",
    )
    .bind(table)
    .bind(index)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(n,)| n > 0).unwrap_or(false))
}

async fn ensure_index(pool: &MySqlPool, table: &str, index: &str, ddl: &str) -> sqlx::Result<()> {
    if !index_exists(pool, table, index).await? {
        sqlx::query(ddl).execute(pool).await?;
    }
    Ok(())
}

/// Creates the four tables if absent and the indexes the hot-path queries need.
pub async fn ensure_schema(pool: &MySqlPool) -> sqlx::Result<()> {
    sqlx::query(CREATE_AUCTIONS).execute(pool).await?;
    sqlx::query(CREATE_SECTIONS).execute(pool).await?;
    sqlx::query(CREATE_PIGEONS).execute(pool).await?;
    sqlx::query(CREATE_BID_RECORDS).execute(pool).await?;

    ensure_index(
        pool,
        "bid_records",
        "idx_bid_records_user_code",
        "CREATE INDEX idx_bid_records_user_code ON bid_records (user_code)",
    )
    .await?;
    ensure_index(
        pool,
        "bid_records",
        "idx_bid_records_auction_id",
        "CREATE INDEX idx_bid_records_auction_id ON bid_records (auction_id)",
    )
    .await?;
    ensure_index(
        pool,
        "sections",
        "idx_sections_auction_id",
        "CREATE INDEX idx_sections_auction_id ON sections (auction_id)",
    )
    .await?;
    ensure_index(
        pool,
        "pigeons",
        "idx_pigeons_section_id",
        "CREATE INDEX idx_pigeons_section_id ON pigeons (section_id)",
    )
    .await?;
    Ok(())
}
