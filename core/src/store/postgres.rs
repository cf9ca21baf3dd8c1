//! PostgreSQL adapter for the inventory.
//!
//! One row per record in the table named by the configured collection. Every
//! trait method is exactly one SQL statement; the conditional update locks and
//! updates its row inside that statement.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::debug;

use ipalloc_common::config::StoreConfig;
use ipalloc_common::record::{AddressRecord, FieldUpdate, RecordFilter};

use super::{InventoryStore, StoreError};

const COLUMNS: &str = "id, segment_name, address, cidr, network, alive, reserved, locked, ptr_name";
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_IDENTIFIER_LEN: usize = 63;

pub struct PgStore {
    pool: PgPool,
    table: String,
}

impl PgStore {
    pub async fn connect(cfg: &StoreConfig, max_connections: u32) -> Result<Self, StoreError> {
        let table: String = validate_table_name(&cfg.collection)?;
        let options = PgConnectOptions::new()
            .host(&cfg.host)
            .port(cfg.port)
            .username(&cfg.user)
            .password(&cfg.password)
            .database(&cfg.database);

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        debug!(host = %cfg.host, database = %cfg.database, table = %table, "connected to inventory store");
        Ok(Self { pool, table })
    }

    /// Creates the inventory table and its segment index when missing, and
    /// adds the `network` column to tables created without it.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        let create_table = format!(
            "CREATE TABLE IF NOT EXISTS {t} (
                id BIGINT PRIMARY KEY,
                segment_name TEXT NOT NULL,
                address TEXT NOT NULL,
                cidr TEXT NOT NULL,
                network TEXT NOT NULL DEFAULT '',
                alive BOOLEAN NOT NULL DEFAULT FALSE,
                reserved BOOLEAN NOT NULL DEFAULT FALSE,
                locked BOOLEAN NOT NULL DEFAULT FALSE,
                ptr_name TEXT NOT NULL DEFAULT ''
            )",
            t = self.table
        );
        let add_network = format!(
            "ALTER TABLE {t} ADD COLUMN IF NOT EXISTS network TEXT NOT NULL DEFAULT ''",
            t = self.table
        );
        let create_index = format!(
            "CREATE INDEX IF NOT EXISTS {t}_segment_idx ON {t} (segment_name, id)",
            t = self.table
        );

        sqlx::query(&create_table).execute(&self.pool).await?;
        sqlx::query(&add_network).execute(&self.pool).await?;
        sqlx::query(&create_index).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PgStore {
    async fn find_by_id(&self, id: u32) -> Result<Option<AddressRecord>, StoreError> {
        self.find_one(&RecordFilter::by_id(id)).await
    }

    async fn insert(&self, record: &AddressRecord) -> Result<(), StoreError> {
        let result = insert_query(&self.table, record).build().execute(&self.pool).await;
        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::Duplicate(record.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_fields(&self, id: u32, update: &FieldUpdate) -> Result<u64, StoreError> {
        if update.is_empty() {
            return Ok(self.find_by_id(id).await?.map_or(0, |_| 1));
        }
        let done = update_by_id_query(&self.table, id, update)
            .build()
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn find_one(&self, filter: &RecordFilter) -> Result<Option<AddressRecord>, StoreError> {
        let row: Option<PgRow> = select_query(&self.table, filter, Some(1))
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_all(&self, filter: &RecordFilter) -> Result<Vec<AddressRecord>, StoreError> {
        let rows: Vec<PgRow> = select_query(&self.table, filter, None)
            .build()
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn update_fields_if_matches(
        &self,
        filter: &RecordFilter,
        update: &FieldUpdate,
    ) -> Result<Option<AddressRecord>, StoreError> {
        if update.is_empty() {
            return self.find_one(filter).await;
        }
        let row: Option<PgRow> = conditional_update_query(&self.table, filter, update)
            .build()
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }
}

fn validate_table_name(name: &str) -> Result<String, StoreError> {
    let valid_start = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let valid_rest = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if !valid_start || !valid_rest || name.len() > MAX_IDENTIFIER_LEN {
        return Err(StoreError::InvalidCollection(name.to_string()));
    }
    Ok(name.to_ascii_lowercase())
}

fn record_from_row(row: &PgRow) -> Result<AddressRecord, StoreError> {
    let raw_id: i64 = row.try_get("id")?;
    let id: u32 = u32::try_from(raw_id).map_err(|_| StoreError::Corrupt {
        id: raw_id,
        reason: "id outside the IPv4 range".into(),
    })?;

    Ok(AddressRecord {
        id,
        segment_name: row.try_get("segment_name")?,
        address: row.try_get("address")?,
        cidr: row.try_get("cidr")?,
        network: row.try_get("network")?,
        alive: row.try_get("alive")?,
        reserved: row.try_get("reserved")?,
        locked: row.try_get("locked")?,
        ptr_name: row.try_get("ptr_name")?,
    })
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &RecordFilter) {
    qb.push(" WHERE TRUE");
    if let Some(id) = filter.id {
        qb.push(" AND id = ").push_bind(i64::from(id));
    }
    if let Some(name) = &filter.segment_name {
        qb.push(" AND segment_name = ").push_bind(name.clone());
    }
    if let Some(alive) = filter.alive {
        qb.push(" AND alive = ").push_bind(alive);
    }
    if let Some(reserved) = filter.reserved {
        qb.push(" AND reserved = ").push_bind(reserved);
    }
    if let Some(locked) = filter.locked {
        qb.push(" AND locked = ").push_bind(locked);
    }
}

fn push_set(qb: &mut QueryBuilder<'_, Postgres>, update: &FieldUpdate) {
    qb.push(" SET ");
    let mut set = qb.separated(", ");
    if let Some(alive) = update.alive {
        set.push("alive = ").push_bind_unseparated(alive);
    }
    if let Some(ptr_name) = &update.ptr_name {
        set.push("ptr_name = ").push_bind_unseparated(ptr_name.clone());
    }
    if let Some(reserved) = update.reserved {
        set.push("reserved = ").push_bind_unseparated(reserved);
    }
    if let Some(locked) = update.locked {
        set.push("locked = ").push_bind_unseparated(locked);
    }
}

fn select_query(table: &str, filter: &RecordFilter, limit: Option<i64>) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM {table}"));
    push_filter(&mut qb, filter);
    qb.push(" ORDER BY id");
    if let Some(limit) = limit {
        qb.push(" LIMIT ").push_bind(limit);
    }
    qb
}

fn insert_query(table: &str, record: &AddressRecord) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("INSERT INTO {table} ({COLUMNS}) VALUES ("));
    let mut values = qb.separated(", ");
    values
        .push_bind(i64::from(record.id))
        .push_bind(record.segment_name.clone())
        .push_bind(record.address.clone())
        .push_bind(record.cidr.clone())
        .push_bind(record.network.clone())
        .push_bind(record.alive)
        .push_bind(record.reserved)
        .push_bind(record.locked)
        .push_bind(record.ptr_name.clone());
    qb.push(")");
    qb
}

fn update_by_id_query(table: &str, id: u32, update: &FieldUpdate) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("UPDATE {table}"));
    push_set(&mut qb, update);
    qb.push(" WHERE id = ").push_bind(i64::from(id));
    qb
}

/// Single statement: the sub-select locks the first eligible row, skipping
/// rows another transaction holds, and the outer update flips it.
///
/// `SKIP LOCKED` means a reserve finds nothing while another writer, such as
/// a scan refreshing liveness, briefly holds the only eligible row. The caller
/// then reports no free address even though one exists a moment later.
fn conditional_update_query(
    table: &str,
    filter: &RecordFilter,
    update: &FieldUpdate,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("UPDATE {table}"));
    push_set(&mut qb, update);
    qb.push(format!(" WHERE id = (SELECT id FROM {table}"));
    push_filter(&mut qb, filter);
    qb.push(format!(" ORDER BY id LIMIT 1 FOR UPDATE SKIP LOCKED) RETURNING {COLUMNS}"));
    qb
}
