//! SQLite-backed scenario store.
//!
//! One database file holds the release types, the two item catalogs, the
//! macro-variable history and the narrative log. History and narratives are
//! keyed by an autoincrement `seq` so reads return them in append order.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use macrosim_domain::{
    parse_timestamp, CauseRef, CauseType, EventId, HistoryId, HistoryRecord, ImpactDelta, ItemKind,
    ItemRef, MacroEvent, MacroState, NarrativeId, NarrativeKind, NarrativeRecord, Release,
    ReleaseId, ReleaseType, ReleaseTypeId, ScheduledItem,
};

use crate::infrastructure::ports::{CatalogCounts, CatalogRepo, NarrativeRepo, RepoError, StateRepo};

const SCHEMA: [&str; 5] = [
    r#"
    CREATE TABLE IF NOT EXISTS release_types (
        id TEXT PRIMARY KEY,
        code TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        description TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS economic_releases (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        release_type TEXT NOT NULL,
        consensus REAL NOT NULL,
        actual REAL NOT NULL,
        scheduled_at TEXT NOT NULL,
        impact_growth REAL NOT NULL,
        impact_inflation REAL NOT NULL,
        impact_volatility REAL NOT NULL,
        fired INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS macro_events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        headline TEXT NOT NULL,
        description TEXT,
        scheduled_at TEXT NOT NULL,
        impact_growth REAL NOT NULL,
        impact_inflation REAL NOT NULL,
        impact_volatility REAL NOT NULL,
        fired INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS macro_variables_history (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        timestamp TEXT NOT NULL,
        growth REAL NOT NULL,
        inflation REAL NOT NULL,
        volatility REAL NOT NULL,
        cause_type TEXT NOT NULL,
        cause_id TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS narratives (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        timestamp TEXT NOT NULL,
        kind TEXT NOT NULL,
        content TEXT NOT NULL,
        reference_type TEXT NOT NULL,
        reference_id TEXT NOT NULL
    )
    "#,
];

/// SQLite implementation of every store port.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `db_path` and ensure the schema.
    pub async fn open(db_path: &Path) -> Result<Self, RepoError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RepoError::database("open", e))?;
        }

        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path.display()))
            .await
            .map_err(|e| RepoError::database("open", e))?;

        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&pool)
                .await
                .map_err(|e| RepoError::database("schema", e))?;
        }

        tracing::debug!(path = %db_path.display(), "SQLite store ready");
        Ok(Self { pool })
    }

    async fn unfired_releases(&self) -> Result<Vec<ScheduledItem>, RepoError> {
        let rows = sqlx::query(
            "SELECT * FROM economic_releases WHERE fired = 0 ORDER BY scheduled_at, seq",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_unfired_items", e))?;

        rows.iter()
            .map(|row| release_from_row(row).map(ScheduledItem::Release))
            .collect()
    }

    async fn unfired_events(&self) -> Result<Vec<ScheduledItem>, RepoError> {
        let rows =
            sqlx::query("SELECT * FROM macro_events WHERE fired = 0 ORDER BY scheduled_at, seq")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| RepoError::database("list_unfired_items", e))?;

        rows.iter()
            .map(|row| event_from_row(row).map(ScheduledItem::Event))
            .collect()
    }

    async fn count_where(&self, query: &str) -> Result<u64, RepoError> {
        let count: i64 = sqlx::query_scalar(query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::database("counts", e))?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl CatalogRepo for SqliteStore {
    async fn save_release_type(&self, release_type: &ReleaseType) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO release_types (id, code, name, description)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(code) DO UPDATE SET
                name = excluded.name,
                description = excluded.description
            "#,
        )
        .bind(release_type.id.to_string())
        .bind(&release_type.code)
        .bind(&release_type.name)
        .bind(&release_type.description)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("save_release_type", e))?;
        Ok(())
    }

    async fn list_release_types(&self) -> Result<Vec<ReleaseType>, RepoError> {
        let rows = sqlx::query("SELECT id, code, name, description FROM release_types ORDER BY code")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("list_release_types", e))?;

        rows.iter()
            .map(|row| {
                Ok(ReleaseType {
                    id: ReleaseTypeId::from_uuid(parse_uuid(row.get("id"))?),
                    code: row.get("code"),
                    name: row.get("name"),
                    description: row.get("description"),
                })
            })
            .collect()
    }

    async fn save_item(&self, item: &ScheduledItem) -> Result<(), RepoError> {
        let result = match item {
            ScheduledItem::Release(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO economic_releases (
                        id, name, release_type, consensus, actual, scheduled_at,
                        impact_growth, impact_inflation, impact_volatility, fired
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(r.id.to_string())
                .bind(&r.name)
                .bind(&r.release_type)
                .bind(r.consensus)
                .bind(r.actual)
                .bind(encode_timestamp(r.scheduled_at))
                .bind(r.impact.d_growth)
                .bind(r.impact.d_inflation)
                .bind(r.impact.d_volatility)
                .bind(r.fired)
                .execute(&self.pool)
                .await
            }
            ScheduledItem::Event(e) => {
                sqlx::query(
                    r#"
                    INSERT INTO macro_events (
                        id, headline, description, scheduled_at,
                        impact_growth, impact_inflation, impact_volatility, fired
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(e.id.to_string())
                .bind(&e.headline)
                .bind(&e.description)
                .bind(encode_timestamp(e.scheduled_at))
                .bind(e.impact.d_growth)
                .bind(e.impact.d_inflation)
                .bind(e.impact.d_volatility)
                .bind(e.fired)
                .execute(&self.pool)
                .await
            }
        };

        result.map_err(|e| RepoError::database("save_item", e))?;
        Ok(())
    }

    async fn list_unfired_items(&self) -> Result<Vec<ScheduledItem>, RepoError> {
        let mut items = self.unfired_releases().await?;
        items.extend(self.unfired_events().await?);
        // Stable: per-table insertion order survives for equal timestamps.
        items.sort_by_key(ScheduledItem::timestamp);
        Ok(items)
    }

    async fn mark_fired(&self, item: ItemRef) -> Result<(), RepoError> {
        let table = match item.kind() {
            ItemKind::Release => "economic_releases",
            ItemKind::Event => "macro_events",
        };
        let id = item.uuid().to_string();

        let updated = sqlx::query(&format!(
            "UPDATE {table} SET fired = 1 WHERE id = ? AND fired = 0"
        ))
        .bind(&id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("mark_fired", e))?
        .rows_affected();

        if updated == 1 {
            return Ok(());
        }

        let exists: Option<i64> = sqlx::query_scalar(&format!("SELECT 1 FROM {table} WHERE id = ?"))
            .bind(&id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("mark_fired", e))?;

        match exists {
            Some(_) => Err(RepoError::constraint(format!("{} has already fired", item))),
            None => Err(RepoError::not_found(item.kind().as_str(), item.uuid())),
        }
    }

    async fn counts(&self) -> Result<CatalogCounts, RepoError> {
        Ok(CatalogCounts {
            releases: self.count_where("SELECT COUNT(*) FROM economic_releases").await?,
            unfired_releases: self
                .count_where("SELECT COUNT(*) FROM economic_releases WHERE fired = 0")
                .await?,
            events: self.count_where("SELECT COUNT(*) FROM macro_events").await?,
            unfired_events: self
                .count_where("SELECT COUNT(*) FROM macro_events WHERE fired = 0")
                .await?,
        })
    }
}

#[async_trait]
impl StateRepo for SqliteStore {
    async fn latest_state(&self) -> Result<Option<MacroState>, RepoError> {
        let row = sqlx::query("SELECT * FROM macro_variables_history ORDER BY seq DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| RepoError::database("latest_state", e))?;

        row.map(|row| history_from_row(&row).map(|record| record.state))
            .transpose()
    }

    async fn append_history(&self, record: &HistoryRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO macro_variables_history (
                id, timestamp, growth, inflation, volatility, cause_type, cause_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(encode_timestamp(record.state.timestamp))
        .bind(record.state.growth)
        .bind(record.state.inflation)
        .bind(record.state.volatility)
        .bind(record.cause.cause_type().as_str())
        .bind(record.cause.cause_id().map(|id| id.to_string()))
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("append_history", e))?;
        Ok(())
    }

    async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryRecord>, RepoError> {
        let rows = sqlx::query("SELECT * FROM macro_variables_history ORDER BY seq DESC LIMIT ?")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("recent_history", e))?;

        rows.iter().map(history_from_row).collect()
    }

    async fn history(&self) -> Result<Vec<HistoryRecord>, RepoError> {
        let rows = sqlx::query("SELECT * FROM macro_variables_history ORDER BY seq")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RepoError::database("history", e))?;

        rows.iter().map(history_from_row).collect()
    }

    async fn count_history(&self) -> Result<u64, RepoError> {
        self.count_where("SELECT COUNT(*) FROM macro_variables_history")
            .await
    }
}

#[async_trait]
impl NarrativeRepo for SqliteStore {
    async fn append(&self, record: &NarrativeRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO narratives (id, timestamp, kind, content, reference_type, reference_id)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(encode_timestamp(record.timestamp))
        .bind(record.kind.as_str())
        .bind(&record.content)
        .bind(record.reference.kind().as_str())
        .bind(record.reference.uuid().to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("append_narrative", e))?;
        Ok(())
    }

    async fn list_for_reference(&self, reference: ItemRef) -> Result<Vec<NarrativeRecord>, RepoError> {
        let rows = sqlx::query(
            "SELECT * FROM narratives WHERE reference_type = ? AND reference_id = ? ORDER BY seq",
        )
        .bind(reference.kind().as_str())
        .bind(reference.uuid().to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("list_narratives", e))?;

        rows.iter()
            .map(|row| {
                let kind: String = row.get("kind");
                Ok(NarrativeRecord {
                    id: NarrativeId::from_uuid(parse_uuid(row.get("id"))?),
                    timestamp: decode_timestamp(row.get("timestamp"))?,
                    kind: kind
                        .parse::<NarrativeKind>()
                        .map_err(RepoError::serialization)?,
                    content: row.get("content"),
                    reference,
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<u64, RepoError> {
        self.count_where("SELECT COUNT(*) FROM narratives").await
    }
}

// =============================================================================
// Row mapping
// =============================================================================

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: String) -> Result<DateTime<Utc>, RepoError> {
    parse_timestamp(&raw).map_err(RepoError::serialization)
}

fn parse_uuid(raw: String) -> Result<Uuid, RepoError> {
    Uuid::parse_str(&raw).map_err(|e| RepoError::serialization(format!("invalid id '{raw}': {e}")))
}

fn impact_from_row(row: &SqliteRow) -> ImpactDelta {
    ImpactDelta::new(
        row.get("impact_growth"),
        row.get("impact_inflation"),
        row.get("impact_volatility"),
    )
}

fn release_from_row(row: &SqliteRow) -> Result<Release, RepoError> {
    Ok(Release {
        id: ReleaseId::from_uuid(parse_uuid(row.get("id"))?),
        name: row.get("name"),
        release_type: row.get("release_type"),
        consensus: row.get("consensus"),
        actual: row.get("actual"),
        scheduled_at: decode_timestamp(row.get("scheduled_at"))?,
        impact: impact_from_row(row),
        fired: row.get("fired"),
    })
}

fn event_from_row(row: &SqliteRow) -> Result<MacroEvent, RepoError> {
    Ok(MacroEvent {
        id: EventId::from_uuid(parse_uuid(row.get("id"))?),
        headline: row.get("headline"),
        description: row.get("description"),
        scheduled_at: decode_timestamp(row.get("scheduled_at"))?,
        impact: impact_from_row(row),
        fired: row.get("fired"),
    })
}

fn history_from_row(row: &SqliteRow) -> Result<HistoryRecord, RepoError> {
    let cause_type: String = row.get("cause_type");
    let cause_type = cause_type
        .parse::<CauseType>()
        .map_err(RepoError::serialization)?;
    let cause_id: Option<String> = row.get("cause_id");
    let cause_id = cause_id.map(parse_uuid).transpose()?;

    Ok(HistoryRecord {
        id: HistoryId::from_uuid(parse_uuid(row.get("id"))?),
        state: MacroState::new(
            row.get("growth"),
            row.get("inflation"),
            row.get("volatility"),
            decode_timestamp(row.get("timestamp"))?,
        ),
        cause: CauseRef::from_parts(cause_type, cause_id).map_err(RepoError::serialization)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, day, hour, 30, 0)
            .single()
            .expect("valid date")
    }

    fn nfp() -> Release {
        Release {
            id: ReleaseId::new(),
            name: "Non-Farm Payrolls January".to_string(),
            release_type: "NFP".to_string(),
            consensus: 180.0,
            actual: 215.0,
            scheduled_at: at(7, 13),
            impact: ImpactDelta::new(0.08, 0.02, 0.3),
            fired: false,
        }
    }

    fn tariff_event() -> MacroEvent {
        MacroEvent {
            id: EventId::new(),
            headline: "Tariffs announced on imported steel".to_string(),
            description: Some("Broad 25% levy".to_string()),
            scheduled_at: at(7, 13),
            impact: ImpactDelta::new(-0.1, 0.15, 2.5),
            fired: false,
        }
    }

    async fn open_temp() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SqliteStore::open(&dir.path().join("nested").join("macrosim.db"))
            .await
            .expect("open store");
        (dir, store)
    }

    #[tokio::test]
    async fn when_items_are_saved_then_they_round_trip_through_sqlite() {
        let (_dir, store) = open_temp().await;
        let release = nfp();
        let event = tariff_event();
        store
            .save_item(&ScheduledItem::Event(event.clone()))
            .await
            .expect("save event");
        store
            .save_item(&ScheduledItem::Release(release.clone()))
            .await
            .expect("save release");

        let items = store.list_unfired_items().await.expect("list");
        assert_eq!(items.len(), 2);
        assert!(items.contains(&ScheduledItem::Release(release)));
        assert!(items.contains(&ScheduledItem::Event(event)));
    }

    #[tokio::test]
    async fn when_item_is_marked_fired_then_it_leaves_the_unfired_list() {
        let (_dir, store) = open_temp().await;
        let release = ScheduledItem::Release(nfp());
        store.save_item(&release).await.expect("save");

        store.mark_fired(release.item_ref()).await.expect("mark");
        assert!(store.list_unfired_items().await.expect("list").is_empty());

        let err = store
            .mark_fired(release.item_ref())
            .await
            .expect_err("second firing must fail");
        assert!(matches!(err, RepoError::ConstraintViolation(_)));

        let err = store
            .mark_fired(ItemRef::Release(ReleaseId::new()))
            .await
            .expect_err("unknown release");
        assert!(err.is_not_found());

        let counts = store.counts().await.expect("counts");
        assert_eq!(counts.releases, 1);
        assert_eq!(counts.unfired_releases, 0);
    }

    #[tokio::test]
    async fn history_is_returned_in_append_order() {
        let (_dir, store) = open_temp().await;
        let release_id = ReleaseId::new();
        let initial = HistoryRecord::initial(MacroState::new(2.3, 2.1, 12.0, at(1, 0)));
        let next = HistoryRecord::new(
            MacroState::new(2.38, 2.12, 12.3, at(7, 13)),
            CauseRef::Release(release_id),
        );
        store.append_history(&initial).await.expect("append");
        store.append_history(&next).await.expect("append");

        assert_eq!(store.history().await.expect("history"), vec![initial, next]);
        assert_eq!(
            store.recent_history(1).await.expect("recent"),
            vec![next]
        );
        assert_eq!(
            store.latest_state().await.expect("latest"),
            Some(next.state)
        );
        assert_eq!(store.count_history().await.expect("count"), 2);
    }

    #[tokio::test]
    async fn when_history_is_empty_then_latest_state_is_none() {
        let (_dir, store) = open_temp().await;
        assert_eq!(store.latest_state().await.expect("latest"), None);
    }

    #[tokio::test]
    async fn narratives_are_listed_per_reference() {
        let (_dir, store) = open_temp().await;
        let release = ItemRef::Release(ReleaseId::new());
        let other = ItemRef::Event(EventId::new());
        let pre = NarrativeRecord::new(at(6, 13), NarrativeKind::PreRelease, "Markets brace.", release);
        let post = NarrativeRecord::new(at(7, 13), NarrativeKind::PostRelease, "A big beat.", release);
        let unrelated = NarrativeRecord::new(at(7, 13), NarrativeKind::Event, "Tariffs.", other);
        for record in [&pre, &post, &unrelated] {
            store.append(record).await.expect("append");
        }

        let listed = store.list_for_reference(release).await.expect("list");
        assert_eq!(listed, vec![pre, post]);
        assert_eq!(NarrativeRepo::count(&store).await.expect("count"), 3);
    }

    #[tokio::test]
    async fn release_types_upsert_by_code() {
        let (_dir, store) = open_temp().await;
        let mut nfp_type = ReleaseType {
            id: ReleaseTypeId::new(),
            code: "NFP".to_string(),
            name: "Non-Farm Payrolls".to_string(),
            description: None,
        };
        store.save_release_type(&nfp_type).await.expect("save");
        nfp_type.description = Some("Monthly US payrolls".to_string());
        store.save_release_type(&nfp_type).await.expect("upsert");

        let types = store.list_release_types().await.expect("list");
        assert_eq!(types, vec![nfp_type]);
    }
}
