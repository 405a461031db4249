//! Prayer-time table in PostgreSQL.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;

use prayer_common::{PrayerError, PrayerInstants, PrayerResult, StoredPrayerRecord, ZoneCode};

use crate::store::{prepare_batch, PrayerStore};

const SELECT_COLUMNS: &str = "SELECT zone_id, date, day, month, year, \
     imsak, fajr, syuruk, dhuha, dhuhr, asr, maghrib, isha, ttl FROM prayer_times";

/// Database connection pool and prayer-time table operations.
pub struct PgPrayerStore {
    pool: PgPool,
}

impl PgPrayerStore {
    /// Create a new store from a database URL.
    pub async fn connect(database_url: &str) -> PrayerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| PrayerError::DatabaseError(format!("Connection failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> PrayerResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| PrayerError::DatabaseError(format!("Migration failed: {}", e)))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl PrayerStore for PgPrayerStore {
    async fn put_batch(&self, records: &[StoredPrayerRecord]) -> PrayerResult<()> {
        let batch = prepare_batch(records)?;
        if batch.is_empty() {
            return Ok(());
        }

        // A single multi-row statement commits or fails as a whole
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO prayer_times (zone_id, date, day, month, year, \
             imsak, fajr, syuruk, dhuha, dhuhr, asr, maghrib, isha, ttl) ",
        );

        builder.push_values(batch.iter(), |mut row, record| {
            row.push_bind(record.zone_id.to_string())
                .push_bind(record.date.clone())
                .push_bind(record.day.clone())
                .push_bind(record.month.clone())
                .push_bind(record.year.clone())
                .push_bind(record.times.imsak)
                .push_bind(record.times.fajr)
                .push_bind(record.times.syuruk)
                .push_bind(record.times.dhuha)
                .push_bind(record.times.dhuhr)
                .push_bind(record.times.asr)
                .push_bind(record.times.maghrib)
                .push_bind(record.times.isha)
                .push_bind(record.ttl);
        });

        builder.push(
            " ON CONFLICT (zone_id, date) DO UPDATE SET \
             day = EXCLUDED.day, month = EXCLUDED.month, year = EXCLUDED.year, \
             imsak = EXCLUDED.imsak, fajr = EXCLUDED.fajr, syuruk = EXCLUDED.syuruk, \
             dhuha = EXCLUDED.dhuha, dhuhr = EXCLUDED.dhuhr, asr = EXCLUDED.asr, \
             maghrib = EXCLUDED.maghrib, isha = EXCLUDED.isha, ttl = EXCLUDED.ttl, \
             updated_at = NOW()",
        );

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| PrayerError::DatabaseError(format!("Batch write failed: {}", e)))?;

        debug!(records = batch.len(), "Wrote prayer-time batch");
        Ok(())
    }

    async fn query(&self, zone: &str, date: &str) -> PrayerResult<Vec<StoredPrayerRecord>> {
        let rows = sqlx::query_as::<_, PrayerRow>(&format!(
            "{} WHERE zone_id = $1 AND date = $2",
            SELECT_COLUMNS
        ))
        .bind(zone)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PrayerError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.into_iter().map(StoredPrayerRecord::try_from).collect()
    }

    async fn query_month(
        &self,
        zone: &str,
        month: &str,
        year: &str,
    ) -> PrayerResult<Vec<StoredPrayerRecord>> {
        let rows = sqlx::query_as::<_, PrayerRow>(&format!(
            "{} WHERE zone_id = $1 AND month = $2 AND year = $3 ORDER BY day",
            SELECT_COLUMNS
        ))
        .bind(zone)
        .bind(month)
        .bind(year)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PrayerError::DatabaseError(format!("Query failed: {}", e)))?;

        rows.into_iter().map(StoredPrayerRecord::try_from).collect()
    }

    async fn purge_expired(&self, now_secs: i64) -> PrayerResult<u64> {
        let result = sqlx::query("DELETE FROM prayer_times WHERE ttl <= $1")
            .bind(now_secs)
            .execute(&self.pool)
            .await
            .map_err(|e| PrayerError::DatabaseError(format!("Purge failed: {}", e)))?;

        Ok(result.rows_affected())
    }
}

/// Internal row type for database queries.
#[derive(FromRow)]
struct PrayerRow {
    zone_id: String,
    date: String,
    day: String,
    month: String,
    year: String,
    imsak: i64,
    fajr: i64,
    syuruk: i64,
    dhuha: i64,
    dhuhr: i64,
    asr: i64,
    maghrib: i64,
    isha: i64,
    ttl: i64,
}

impl TryFrom<PrayerRow> for StoredPrayerRecord {
    type Error = PrayerError;

    fn try_from(row: PrayerRow) -> Result<Self, Self::Error> {
        Ok(StoredPrayerRecord {
            zone_id: ZoneCode::parse(&row.zone_id)?,
            date: row.date,
            day: row.day,
            month: row.month,
            year: row.year,
            times: PrayerInstants {
                imsak: row.imsak,
                fajr: row.fajr,
                syuruk: row.syuruk,
                dhuha: row.dhuha,
                dhuhr: row.dhuhr,
                asr: row.asr,
                maghrib: row.maghrib,
                isha: row.isha,
            },
            ttl: row.ttl,
        })
    }
}

/// SQL schema for the prayer-time table.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS prayer_times (
    zone_id TEXT NOT NULL,
    date TEXT NOT NULL,
    day TEXT NOT NULL,
    month TEXT NOT NULL,
    year TEXT NOT NULL,
    imsak BIGINT NOT NULL,
    fajr BIGINT NOT NULL,
    syuruk BIGINT NOT NULL,
    dhuha BIGINT NOT NULL,
    dhuhr BIGINT NOT NULL,
    asr BIGINT NOT NULL,
    maghrib BIGINT NOT NULL,
    isha BIGINT NOT NULL,
    ttl BIGINT NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (zone_id, date)
);

CREATE INDEX IF NOT EXISTS idx_prayer_times_month ON prayer_times(zone_id, year, month);
CREATE INDEX IF NOT EXISTS idx_prayer_times_ttl ON prayer_times(ttl);
"#;
