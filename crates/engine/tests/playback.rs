//! End-to-end playback against the real stores.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use macrosim_domain::{
    CauseRef, EventId, ImpactDelta, MacroEvent, MacroState, NarrativeKind, Release, ReleaseId,
    ScheduledItem, TimeScale,
};
use macrosim_engine::app::{App, Repositories};
use macrosim_engine::infrastructure::clock::FixedClock;
use macrosim_engine::infrastructure::persistence::{InMemoryStore, Scenario, SqliteStore};
use macrosim_engine::infrastructure::ports::{CatalogRepo, NarrativeRepo, StateRepo};
use macrosim_engine::infrastructure::terminal::BufferedOutput;
use macrosim_engine::use_cases::{
    ImportOutcome, RunOutcome, SimulationError, SimulationSettings, TemplateNarrator,
};

fn t(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0)
        .single()
        .expect("valid date")
}

fn seed() -> MacroState {
    MacroState::new(2.3, 2.1, 12.0, t(1, 0))
}

fn nfp(at: DateTime<Utc>) -> ScheduledItem {
    ScheduledItem::from(Release {
        id: ReleaseId::new(),
        name: "Non-Farm Payrolls December".to_string(),
        release_type: "NFP".to_string(),
        consensus: 180.0,
        actual: 215.0,
        scheduled_at: at,
        impact: ImpactDelta::new(0.08, 0.02, 0.3),
        fired: false,
    })
}

fn tariffs(at: DateTime<Utc>) -> ScheduledItem {
    ScheduledItem::from(MacroEvent {
        id: EventId::new(),
        headline: "Tariffs announced on major trading partners".to_string(),
        description: None,
        scheduled_at: at,
        impact: ImpactDelta::new(-0.2, 0.25, 3.5),
        fired: false,
    })
}

fn scenario(items: Vec<ScheduledItem>) -> Scenario {
    Scenario {
        name: Some("integration".to_string()),
        initial_state: seed(),
        release_types: Vec::new(),
        items,
    }
}

fn settings(seconds_per_day: f64) -> SimulationSettings {
    SimulationSettings {
        time_scale: TimeScale::new(seconds_per_day).expect("valid scale"),
        ..SimulationSettings::default()
    }
}

async fn memory_app(
    items: Vec<ScheduledItem>,
    settings: SimulationSettings,
) -> (App, Arc<InMemoryStore>, Arc<BufferedOutput>) {
    let store = Arc::new(InMemoryStore::new());
    let output = Arc::new(BufferedOutput::new());
    let app = App::new(
        Repositories::from_store(store.clone()),
        Arc::new(TemplateNarrator::new()),
        output.clone(),
        Arc::new(FixedClock(t(1, 0))),
        settings,
    );
    let outcome = app
        .use_cases
        .scenario
        .import
        .execute(&scenario(items))
        .await
        .expect("import");
    assert!(matches!(outcome, ImportOutcome::Imported { .. }));
    (app, store, output)
}

#[tokio::test(start_paused = true)]
async fn nfp_beat_moves_seed_state_exactly() {
    let (app, store, _) = memory_app(vec![nfp(t(10, 13))], settings(120.0)).await;

    let outcome = app
        .use_cases
        .simulation
        .execute(CancellationToken::new())
        .await
        .expect("run completes");

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    let latest = store
        .latest_state()
        .await
        .expect("read state")
        .expect("state exists");
    assert_eq!(latest.growth, 2.38);
    assert_eq!(latest.inflation, 2.12);
    assert_eq!(latest.volatility, 12.3);
    assert_eq!(latest.timestamp, t(10, 13));
}

#[tokio::test(start_paused = true)]
async fn release_fires_before_event_at_same_timestamp() {
    let at = t(5, 12);
    // Event inserted first: precedence, not insertion order, decides.
    let event = tariffs(at);
    let release = nfp(at);
    let (event_ref, release_ref) = (event.item_ref(), release.item_ref());
    let (app, store, _) = memory_app(vec![event, release], settings(120.0)).await;

    app.use_cases
        .simulation
        .execute(CancellationToken::new())
        .await
        .expect("run completes");

    let history = store.history().await.expect("history");
    let causes: Vec<CauseRef> = history.iter().map(|record| record.cause).collect();
    assert_eq!(
        causes,
        vec![CauseRef::Initial, release_ref.cause(), event_ref.cause()]
    );
}

#[tokio::test(start_paused = true)]
async fn history_is_append_only_and_items_fire_once() {
    let items = vec![nfp(t(3, 13)), tariffs(t(4, 12)), nfp(t(9, 13))];
    let (app, store, _) = memory_app(items, settings(60.0)).await;
    let seeded = store.history().await.expect("history")[0];

    let first = app
        .use_cases
        .simulation
        .execute(CancellationToken::new())
        .await
        .expect("run completes");
    assert_eq!(first.report().fired, 3);

    let history = store.history().await.expect("history");
    assert_eq!(history.len(), 3 + 1);
    assert_eq!(history[0], seeded);
    for pair in history.windows(2) {
        assert!(pair[0].timestamp() <= pair[1].timestamp());
    }
    assert!(store.items().await.iter().all(ScheduledItem::is_fired));

    // A second pass over the same store has nothing left to fire.
    let second = app
        .use_cases
        .simulation
        .execute(CancellationToken::new())
        .await
        .expect("second run completes");
    assert_eq!(second.report().fired, 0);
    assert_eq!(store.history().await.expect("history"), history);
}

#[tokio::test(start_paused = true)]
async fn narratives_bracket_each_firing() {
    let release = nfp(t(3, 13));
    let event = tariffs(t(4, 12));
    let (release_ref, event_ref) = (release.item_ref(), event.item_ref());
    let (app, store, output) = memory_app(vec![release, event], settings(60.0)).await;

    app.use_cases
        .simulation
        .execute(CancellationToken::new())
        .await
        .expect("run completes");

    let release_kinds: Vec<NarrativeKind> = store
        .list_for_reference(release_ref)
        .await
        .expect("narratives")
        .iter()
        .map(|record| record.kind)
        .collect();
    assert_eq!(
        release_kinds,
        vec![NarrativeKind::PreRelease, NarrativeKind::PostRelease]
    );

    let event_narratives = store.list_for_reference(event_ref).await.expect("narratives");
    assert_eq!(event_narratives.len(), 1);
    assert_eq!(event_narratives[0].kind, NarrativeKind::Event);
    assert_eq!(store.count().await.expect("count"), 3);
    assert!(!output.lines().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_wait_leaves_pending_item_untouched() {
    let first = nfp(t(2, 0));
    let second = tariffs(t(3, 0));
    let second_ref = second.item_ref();
    // One simulated day is two real minutes, so the second item is 120s away.
    let (app, store, _) = memory_app(vec![first, second], settings(120.0)).await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let outcome = app
        .use_cases
        .simulation
        .execute(cancel)
        .await
        .expect("clean interrupt");

    assert!(matches!(outcome, RunOutcome::Interrupted(_)));
    assert_eq!(outcome.report().fired, 1);
    assert_eq!(store.count_history().await.expect("count"), 2);

    let pending = store
        .list_unfired_items()
        .await
        .expect("unfired items");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].item_ref(), second_ref);
    assert!(store
        .list_for_reference(second_ref)
        .await
        .expect("narratives")
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn waits_follow_the_time_scale() {
    // Two items one simulated day apart at 120s per day.
    let (app, _, _) = memory_app(vec![nfp(t(2, 0)), tariffs(t(3, 0))], settings(120.0)).await;

    let started = tokio::time::Instant::now();
    app.use_cases
        .simulation
        .execute(CancellationToken::new())
        .await
        .expect("run completes");

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(120), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(121), "{elapsed:?}");
}

#[tokio::test]
async fn sqlite_store_survives_a_full_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("macrosim.db");
    let release = nfp(t(3, 13));
    let release_ref = release.item_ref();

    {
        let store = Arc::new(SqliteStore::open(&path).await.expect("open store"));
        let app = App::new(
            Repositories::from_store(store.clone()),
            Arc::new(TemplateNarrator::new()),
            Arc::new(BufferedOutput::new()),
            Arc::new(FixedClock(t(1, 0))),
            // A simulated day lasts a tenth of a millisecond.
            settings(0.0001),
        );
        app.use_cases
            .scenario
            .import
            .execute(&scenario(vec![release, tariffs(t(4, 12))]))
            .await
            .expect("import");

        let outcome = app
            .use_cases
            .simulation
            .execute(CancellationToken::new())
            .await
            .expect("run completes");
        assert_eq!(outcome.report().fired, 2);
    }

    let reopened = SqliteStore::open(&path).await.expect("reopen store");
    assert_eq!(reopened.count_history().await.expect("count"), 3);
    assert!(reopened
        .list_unfired_items()
        .await
        .expect("unfired")
        .is_empty());
    assert_eq!(
        reopened
            .list_for_reference(release_ref)
            .await
            .expect("narratives")
            .len(),
        2
    );
    let latest = reopened
        .latest_state()
        .await
        .expect("state")
        .expect("exists");
    assert_eq!(latest.growth, 2.3 + 0.08 - 0.2);
}

// Real clock: any elapsed time at this scale is beyond the calendar.
#[tokio::test]
async fn extreme_time_settings_still_play_back() {
    let items = vec![nfp(t(2, 0)), tariffs(t(20, 0))];
    let settings = SimulationSettings {
        time_scale: TimeScale::new(1e-300).expect("tiny but positive"),
        max_days: Some(100_000_000.0),
        ..SimulationSettings::default()
    };
    let (app, store, _) = memory_app(items, settings).await;

    let outcome = app
        .use_cases
        .simulation
        .execute(CancellationToken::new())
        .await
        .expect("run completes");

    assert!(matches!(outcome, RunOutcome::Completed(_)));
    assert_eq!(outcome.report().fired, 2);
    assert_eq!(store.count_history().await.expect("count"), 3);
}

#[tokio::test]
async fn malformed_catalog_timestamp_is_a_configuration_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("macrosim.db");
    let store = Arc::new(SqliteStore::open(&path).await.expect("open store"));

    let app = App::new(
        Repositories::from_store(store.clone()),
        Arc::new(TemplateNarrator::new()),
        Arc::new(BufferedOutput::new()),
        Arc::new(FixedClock(t(1, 0))),
        settings(0.0001),
    );
    app.use_cases
        .scenario
        .import
        .execute(&scenario(vec![nfp(t(3, 13))]))
        .await
        .expect("import");

    // A row written by another tool, bypassing the store's encoding.
    let raw = sqlx::SqlitePool::connect(&format!("sqlite:{}", path.display()))
        .await
        .expect("raw connection");
    sqlx::query(
        r#"
        INSERT INTO macro_events (
            id, headline, scheduled_at, impact_growth, impact_inflation, impact_volatility
        )
        VALUES (?, 'Hand-edited event', 'not-a-date', 0.0, 0.0, 0.0)
        "#,
    )
    .bind(EventId::new().to_string())
    .execute(&raw)
    .await
    .expect("insert bad row");
    raw.close().await;

    let err = app
        .use_cases
        .simulation
        .execute(CancellationToken::new())
        .await
        .expect_err("malformed item");

    assert!(matches!(err, SimulationError::Configuration(_)), "{err:?}");
    assert_eq!(err.exit_code(), 2);
    assert_eq!(store.count_history().await.expect("count"), 1);
    let read = store
        .list_unfired_items()
        .await
        .expect_err("row stays unreadable");
    assert!(read.to_string().contains("not-a-date"), "{read}");
}
