//! 트래커 통합 테스트
//!
//! 메모리 저장소와 가짜 소스로 트래커 전체 흐름을 검증

mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use common::*;
use hangon_collector::modules::{
    correlation::{CORRELATION_TYPE, KOSPI_SYMBOL, SP500_SYMBOL},
    credit_balance::ANALYSIS_SUBJECT,
    run_correlation_at, run_credit_balance, run_earnings_tracker_at, run_earnings_updater_at,
    run_holidays_at, run_monitored_stocks_at,
};
use hangon_collector::{ensure_ready, CollectorError, Tracker};
use hangon_core::{
    EntityStatus, MonitoredEntity, QuarterFigure, StatusKind, TimeSeriesRecord, UniverseMember,
    CREDIT_BALANCE_HISTORY, EARNINGS_CALENDAR, MARKET_CORRELATIONS, MARKET_HOLIDAYS,
};
use hangon_data::{EarningsEvent, PricePoint, TableStore};
use hangon_notification::NotificationCategory;

fn entity(symbol: &str, kind: StatusKind) -> MonitoredEntity {
    MonitoredEntity {
        symbol: symbol.into(),
        company_name: Some(format!("{} Corp", symbol)),
        country: Some("US".into()),
        status: EntityStatus::from_parts(kind, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
    }
}

fn member(symbol: &str) -> UniverseMember {
    UniverseMember {
        symbol: symbol.into(),
        company_name: None,
        country: "US".into(),
    }
}

// ==================== 신용융자 잔고 ====================

#[tokio::test]
async fn credit_balance_backfills_then_runs_incrementally() {
    let mut harness = Harness::new();
    harness.credit = Arc::new(FakeCreditSource::with_days("2024-03-04", 30));
    harness.generator = Some(Arc::new(ScriptedGenerator::new(vec![Ok(VALID_ANALYSIS)])));
    let (ctx, obs) = harness.context();

    let first = run_credit_balance(&ctx).await.unwrap();

    assert_eq!(first.inserted, 30);
    assert_eq!(first.recomputed, 1);
    assert_eq!(obs.credit.requested(), vec![15]);

    let analysis = obs.store.load_analysis(ANALYSIS_SUBJECT).await.unwrap().unwrap();
    assert_eq!(analysis.analyzed_key, "2024-03-04");

    let sent = obs.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].category, NotificationCategory::CreditBalance);
    assert_eq!(sent[0].url.as_deref(), Some("/credit-balance"));
    assert!(sent[0].body.contains("2024-03-04"));
    assert_eq!(obs.revalidator.paths(), vec!["/credit-balance".to_string()]);

    // 같은 데이터로 재실행: 1페이지만 요청, 신규 없음, 재계산 없음
    let second = run_credit_balance(&ctx).await.unwrap();

    assert_eq!(obs.credit.requested(), vec![15, 1]);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.recomputed, 0);
    assert_eq!(obs.generator.as_ref().unwrap().calls(), 1);
    assert_eq!(obs.sender.sent().len(), 1);
}

#[tokio::test]
async fn credit_balance_generation_failure_writes_no_analysis() {
    let mut harness = Harness::new();
    harness.credit = Arc::new(FakeCreditSource::with_days("2024-03-04", 5));
    harness.generator = Some(Arc::new(ScriptedGenerator::new(vec![
        Err("timeout"),
        Err("timeout"),
        Err("timeout"),
    ])));
    let (ctx, obs) = harness.context();

    let stats = run_credit_balance(&ctx).await.unwrap();

    assert_eq!(stats.inserted, 5);
    assert_eq!(stats.recomputed, 0);
    assert_eq!(stats.errors, 1);
    assert_eq!(obs.generator.as_ref().unwrap().calls(), 3);
    assert!(obs.store.load_analysis(ANALYSIS_SUBJECT).await.unwrap().is_none());
    assert!(obs.sender.sent().is_empty());
    assert!(obs.revalidator.paths().is_empty());
}

#[tokio::test]
async fn credit_balance_without_generator_is_config_error() {
    let (ctx, obs) = Harness::new().context();

    assert!(matches!(
        ensure_ready(&ctx, &[Tracker::CreditBalance]),
        Err(CollectorError::Config(_))
    ));
    assert!(ensure_ready(&ctx, &[Tracker::Correlation]).is_ok());
    assert!(matches!(run_credit_balance(&ctx).await, Err(CollectorError::Config(_))));
    assert!(obs.credit.requested().is_empty());
    assert!(obs.store.rows(CREDIT_BALANCE_HISTORY).await.is_empty());
}

// ==================== 시장 상관관계 ====================

fn correlation_harness() -> Harness {
    let mut harness = Harness::new();
    harness.quotes.history.insert(
        KOSPI_SYMBOL.to_string(),
        weekday_series("2024-01-02", "2024-04-30", |i| {
            2500.0 + 40.0 * (i as f64 * 0.7).sin() + i as f64
        }),
    );
    harness.quotes.history.insert(
        SP500_SYMBOL.to_string(),
        weekday_series("2024-01-02", "2024-04-30", |i| {
            4700.0 + 60.0 * (i as f64 * 1.3).cos() + 2.0 * i as f64
        }),
    );
    harness
}

#[tokio::test]
async fn correlation_backfills_window_then_skips_known_rows() {
    let (ctx, obs) = correlation_harness().context();
    let today = date("2024-05-01");

    let first = run_correlation_at(&ctx, today).await.unwrap();

    assert_eq!(first.inserted, 60);
    let rows = obs.store.rows(MARKET_CORRELATIONS).await;
    assert_eq!(rows.len(), 60);
    assert!(rows.iter().all(|r| r.natural_key.secondary_key.as_deref() == Some(CORRELATION_TYPE)));
    assert!(rows.iter().all(|r| {
        let corr = r.payload.get_f64("correlation_value").unwrap();
        (-1.0..=1.0).contains(&corr)
    }));
    assert!(rows.iter().all(|r| {
        ["kospi_value", "sp500_value", "kospi_change", "sp500_change"]
            .iter()
            .all(|field| r.payload.get_f64(field).is_some())
    }));
    assert_eq!(obs.revalidator.paths(), vec!["/market-correlation".to_string()]);

    let second = run_correlation_at(&ctx, today).await.unwrap();

    assert_eq!(second.written(), 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(obs.store.rows(MARKET_CORRELATIONS).await.len(), 60);
}

#[tokio::test]
async fn correlation_skips_weekend_and_kr_holiday() {
    let harness = correlation_harness();
    harness
        .store
        .seed(
            MARKET_HOLIDAYS,
            [TimeSeriesRecord::composite("2024-05-06", "KR").with_field("kind", "holiday")],
        )
        .await;
    let (ctx, obs) = harness.context();

    let saturday = run_correlation_at(&ctx, date("2024-05-04")).await.unwrap();
    let holiday = run_correlation_at(&ctx, date("2024-05-06")).await.unwrap();

    assert_eq!(saturday.skipped, 1);
    assert_eq!(holiday.skipped, 1);
    assert!(obs.store.rows(MARKET_CORRELATIONS).await.is_empty());
}

#[tokio::test]
async fn correlation_source_failure_writes_nothing() {
    let (ctx, obs) = Harness::new().context();

    let stats = run_correlation_at(&ctx, date("2024-05-01")).await.unwrap();

    assert_eq!(stats.errors, 1);
    assert!(obs.store.rows(MARKET_CORRELATIONS).await.is_empty());
    assert!(obs.revalidator.paths().is_empty());
}

// ==================== 실적 ====================

#[tokio::test]
async fn earnings_tracker_refresh_keeps_reported_actuals() {
    let mut harness = Harness::new();
    harness
        .store
        .seed(
            EARNINGS_CALENDAR,
            [TimeSeriesRecord::composite("2024-04-25", "AAPL")
                .with_field("revenue_actual", 500)
                .with_field("eps_estimate", 1.0)],
        )
        .await;
    harness.earnings.upcoming.insert(
        "AAPL".to_string(),
        vec![
            EarningsEvent {
                date: date("2024-04-25"),
                eps_estimate: Some(1.5),
                revenue_estimate: None,
            },
            EarningsEvent {
                date: date("2024-01-25"),
                eps_estimate: Some(1.2),
                revenue_estimate: None,
            },
        ],
    );
    let (ctx, obs) = harness.context();

    let stats = run_earnings_tracker_at(&ctx, date("2024-04-01")).await.unwrap();

    assert_eq!(stats.updated, 1);
    assert_eq!(stats.inserted, 0);

    let rows = obs.store.rows(EARNINGS_CALENDAR).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].payload.get_f64("revenue_actual"), Some(500.0));
    assert_eq!(rows[0].payload.get_f64("eps_estimate"), Some(1.5));
    assert_eq!(rows[0].payload.get_str("company_name"), Some("AAPL Inc."));
    assert_eq!(obs.revalidator.tags(), vec!["earnings-calendar".to_string()]);
}

#[tokio::test]
async fn earnings_tracker_prefers_active_monitored_stocks() {
    let mut harness = Harness::new();
    harness.store.seed_entity(entity("NVDA", StatusKind::Active)).await;
    harness.store.seed_entity(entity("INTC", StatusKind::Inactive)).await;
    for symbol in ["NVDA", "INTC", "AAPL"] {
        harness.earnings.upcoming.insert(
            symbol.to_string(),
            vec![EarningsEvent {
                date: date("2024-05-22"),
                eps_estimate: Some(5.6),
                revenue_estimate: Some(24_600_000_000.0),
            }],
        );
    }
    let (ctx, obs) = harness.context();

    let stats = run_earnings_tracker_at(&ctx, date("2024-05-01")).await.unwrap();

    assert_eq!(stats.inserted, 1);
    let rows = obs.store.rows(EARNINGS_CALENDAR).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].natural_key.secondary_key.as_deref(), Some("NVDA"));
    assert_eq!(rows[0].payload.get_str("company_name"), Some("NVDA Corp"));
    assert!(!rows[0].payload.is_field_populated("revenue_actual"));
}

fn nvda_event() -> Vec<EarningsEvent> {
    vec![EarningsEvent {
        date: date("2024-05-22"),
        eps_estimate: Some(5.6),
        revenue_estimate: None,
    }]
}

#[tokio::test]
async fn earnings_refresh_keeps_stored_logo_and_name() {
    let mut harness = Harness::new();
    harness.store.seed_entity(entity("NVDA", StatusKind::Active)).await;
    harness
        .store
        .seed(
            EARNINGS_CALENDAR,
            [TimeSeriesRecord::composite("2024-05-22", "NVDA")
                .with_field("logo_url", "https://img.logo.dev/nvidia.com")
                .with_field("company_name", "엔비디아")
                .with_field("eps_estimate", 5.0)],
        )
        .await;
    harness.earnings.upcoming.insert("NVDA".to_string(), nvda_event());
    harness.earnings.failing_profiles.push("NVDA".to_string());
    let (ctx, obs) = harness.context();

    let stats = run_earnings_tracker_at(&ctx, date("2024-05-01")).await.unwrap();

    assert_eq!(stats.updated, 1);
    let rows = obs.store.rows(EARNINGS_CALENDAR).await;
    assert_eq!(rows[0].payload.get_str("logo_url"), Some("https://img.logo.dev/nvidia.com"));
    assert_eq!(rows[0].payload.get_f64("eps_estimate"), Some(5.6));
    // 모니터링 종목 이름은 그대로 반영
    assert_eq!(rows[0].payload.get_str("company_name"), Some("NVDA Corp"));
}

#[tokio::test]
async fn earnings_refresh_without_website_does_not_replace_logo() {
    let mut harness = Harness::new();
    harness
        .store
        .seed(
            EARNINGS_CALENDAR,
            [TimeSeriesRecord::composite("2024-05-22", "AAPL")
                .with_field("logo_url", "https://img.logo.dev/apple.com")],
        )
        .await;
    harness.earnings.upcoming.insert("AAPL".to_string(), nvda_event());
    let (ctx, obs) = harness.context();

    run_earnings_tracker_at(&ctx, date("2024-05-01")).await.unwrap();

    let rows = obs.store.rows(EARNINGS_CALENDAR).await;
    assert_eq!(rows[0].payload.get_str("logo_url"), Some("https://img.logo.dev/apple.com"));
}

#[tokio::test]
async fn earnings_new_rows_get_logo_from_website_or_fallback() {
    let mut harness = Harness::new();
    harness.config = test_config(&[
        ("EARNINGS_FALLBACK_SYMBOLS", "AAPL,005930.KS"),
        ("LOGODEV_PUBLISHABLE_KEY", "pk_test"),
    ]);
    harness.earnings.upcoming.insert("AAPL".to_string(), nvda_event());
    harness.earnings.upcoming.insert("005930.KS".to_string(), nvda_event());
    harness
        .earnings
        .websites
        .insert("AAPL".to_string(), "https://www.apple.com".to_string());
    let (ctx, obs) = harness.context();

    let stats = run_earnings_tracker_at(&ctx, date("2024-05-01")).await.unwrap();

    assert_eq!(stats.inserted, 2);
    let rows = obs.store.rows(EARNINGS_CALENDAR).await;
    let logo = |symbol: &str| {
        rows.iter()
            .find(|r| r.natural_key.secondary_key.as_deref() == Some(symbol))
            .and_then(|r| r.payload.get_str("logo_url"))
            .map(str::to_string)
    };
    assert_eq!(logo("AAPL").as_deref(), Some("https://img.logo.dev/apple.com?token=pk_test"));
    assert_eq!(
        logo("005930.KS").as_deref(),
        Some("https://financialmodelingprep.com/image-stock/005930.png")
    );
}

#[tokio::test]
async fn earnings_tracker_translates_us_company_names() {
    let mut harness = Harness::new();
    harness.config = test_config(&[("EARNINGS_FALLBACK_SYMBOLS", "AAPL,005930.KS")]);
    harness.earnings.upcoming.insert("AAPL".to_string(), nvda_event());
    harness.earnings.upcoming.insert("005930.KS".to_string(), nvda_event());
    harness.generator = Some(Arc::new(ScriptedGenerator::new(vec![Ok(r#"{"AAPL Inc.": "애플"}"#)])));
    let (ctx, obs) = harness.context();

    run_earnings_tracker_at(&ctx, date("2024-05-01")).await.unwrap();

    let rows = obs.store.rows(EARNINGS_CALENDAR).await;
    let name = |symbol: &str| {
        rows.iter()
            .find(|r| r.natural_key.secondary_key.as_deref() == Some(symbol))
            .and_then(|r| r.payload.get_str("company_name"))
            .map(str::to_string)
    };
    assert_eq!(name("AAPL").as_deref(), Some("애플"));
    assert_eq!(name("005930.KS").as_deref(), Some("005930.KS Inc."));
    assert_eq!(obs.generator.unwrap().calls(), 1);
}

#[tokio::test]
async fn earnings_updater_fills_actuals_and_price() {
    let mut harness = Harness::new();
    harness
        .store
        .seed(
            EARNINGS_CALENDAR,
            [
                TimeSeriesRecord::composite("2024-04-30", "005930.KS")
                    .with_field("country", "KR")
                    .with_field("revenue_actual", serde_json::Value::Null),
                TimeSeriesRecord::composite("2024-07-31", "005930.KS").with_field("country", "KR"),
            ],
        )
        .await;
    harness.earnings.quarters.insert(
        "005930.KS".to_string(),
        vec![
            QuarterFigure {
                end_date: date("2023-12-31"),
                revenue: Some(67.8e12),
                eps: None,
            },
            QuarterFigure {
                end_date: date("2024-03-31"),
                revenue: Some(71.9e12),
                eps: Some(1_185.0),
            },
        ],
    );
    harness.quotes.points.insert(
        "005930.KS".to_string(),
        PricePoint {
            date: date("2024-05-02"),
            close: 77_600.0,
        },
    );
    let (ctx, obs) = harness.context();

    let stats = run_earnings_updater_at(&ctx, date("2024-05-03")).await.unwrap();

    assert!(stats.updated >= 2);
    let rows = obs.store.rows(EARNINGS_CALENDAR).await;
    let reported = rows.iter().find(|r| r.key() == "2024-04-30").unwrap();
    assert_eq!(reported.payload.get_f64("revenue_actual"), Some(71.9e12));
    assert_eq!(reported.payload.get_str("revenue_actual_formatted"), Some("71.9조 원"));
    assert_eq!(reported.payload.get_f64("eps_actual"), Some(1_185.0));
    assert_eq!(reported.payload.get_f64("current_price"), Some(77_600.0));

    let upcoming = rows.iter().find(|r| r.key() == "2024-07-31").unwrap();
    assert!(!upcoming.payload.is_field_populated("revenue_actual"));
    assert!(!upcoming.payload.contains("current_price"));
    assert_eq!(obs.revalidator.tags(), vec!["earnings-calendar".to_string()]);
}

// ==================== 모니터링 종목 ====================

#[tokio::test]
async fn removed_symbol_is_deactivated_and_history_kept() {
    let mut harness = Harness::new();
    harness.store.seed_entity(entity("AAPL", StatusKind::Active)).await;
    harness.store.seed_entity(entity("MSFT", StatusKind::Active)).await;
    harness.store.seed_entity(entity("INTC", StatusKind::Inactive)).await;
    harness
        .store
        .seed(
            EARNINGS_CALENDAR,
            [
                TimeSeriesRecord::composite("2024-01-30", "MSFT").with_field("revenue_actual", 62.0e9),
                TimeSeriesRecord::composite("2024-04-25", "MSFT").with_field("eps_estimate", 2.8),
            ],
        )
        .await;
    harness.universe.members = vec![member("AAPL"), member("NVDA"), member("INTC")];
    let (ctx, obs) = harness.context();
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

    let stats = run_monitored_stocks_at(&ctx, now).await.unwrap();

    assert_eq!(stats.inserted, 1);
    assert_eq!(stats.updated, 2);

    let entities = obs.store.monitored_entities().await.unwrap();
    let status_of = |symbol: &str| {
        entities
            .iter()
            .find(|e| e.symbol == symbol)
            .map(|e| e.status.clone())
            .unwrap()
    };
    assert_eq!(status_of("MSFT"), EntityStatus::Inactive { since: now });
    assert_eq!(status_of("NVDA"), EntityStatus::Active { since: now });
    assert_eq!(status_of("INTC"), EntityStatus::PendingReactivation { since: now });
    assert!(status_of("AAPL").is_active());
    assert_eq!(entities.len(), 4);

    // 과거 데이터는 삭제되지 않음
    assert_eq!(obs.store.rows(EARNINGS_CALENDAR).await.len(), 2);
}

#[tokio::test]
async fn reactivation_is_confirmed_on_next_run() {
    let mut first = Harness::new();
    first.store.seed_entity(entity("INTC", StatusKind::Inactive)).await;
    first.store.seed_entity(entity("AMD", StatusKind::Inactive)).await;
    let store = first.store.clone();
    let first_at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
    let second_at = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();

    first.universe.members = vec![member("INTC"), member("AMD")];
    let (ctx, _) = first.context();
    run_monitored_stocks_at(&ctx, first_at).await.unwrap();

    // 첫 실행은 대기 상태까지만
    assert!(store
        .monitored_entities()
        .await
        .unwrap()
        .iter()
        .all(|e| e.status == EntityStatus::PendingReactivation { since: first_at }));

    let mut second = Harness::new();
    second.store = store.clone();
    second.universe.members = vec![member("INTC")];
    let (ctx, _) = second.context();
    let stats = run_monitored_stocks_at(&ctx, second_at).await.unwrap();

    assert_eq!(stats.updated, 2);
    let entities = store.monitored_entities().await.unwrap();
    let status_of = |symbol: &str| entities.iter().find(|e| e.symbol == symbol).unwrap().status;
    assert_eq!(status_of("INTC"), EntityStatus::Active { since: second_at });
    assert_eq!(status_of("AMD"), EntityStatus::Inactive { since: second_at });
}

#[tokio::test]
async fn empty_universe_aborts_membership_diff() {
    let harness = Harness::new();
    harness.store.seed_entity(entity("AAPL", StatusKind::Active)).await;
    let (ctx, obs) = harness.context();

    let stats = run_monitored_stocks_at(&ctx, Utc::now()).await.unwrap();

    assert_eq!(stats.empty, 1);
    let entities = obs.store.monitored_entities().await.unwrap();
    assert!(entities[0].status.is_active());
}

// ==================== 휴장일 ====================

#[tokio::test]
async fn holidays_sync_translates_and_notifies() {
    let path = std::env::temp_dir().join(format!("hangon-holidays-{}.toml", std::process::id()));
    std::fs::write(
        &path,
        r#"
[[holiday]]
date = "2025-01-01"
country = "KR"
name = "New Year's Day"

[[holiday]]
date = "2025-01-20"
country = "US"
name = "Martin Luther King Jr. Day"
"#,
    )
    .unwrap();

    let mut harness = Harness::new();
    harness.config = test_config(&[("HOLIDAYS_FILE", path.to_str().unwrap())]);
    harness.generator = Some(Arc::new(ScriptedGenerator::new(vec![Ok(
        r#"{"New Year's Day": "신정"}"#,
    )])));
    let (ctx, obs) = harness.context();
    let evening_before = chrono_tz::Asia::Seoul
        .with_ymd_and_hms(2024, 12, 31, 21, 0, 0)
        .unwrap()
        .with_timezone(&Utc);

    let stats = run_holidays_at(&ctx, evening_before).await.unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(stats.inserted, 2);
    let rows = obs.store.rows(MARKET_HOLIDAYS).await;
    let kr = rows.iter().find(|r| r.key() == "2025-01-01").unwrap();
    let us = rows.iter().find(|r| r.key() == "2025-01-20").unwrap();
    assert_eq!(kr.payload.get_str("name_ko"), Some("신정"));
    assert_eq!(us.payload.get_str("name_ko"), Some("Martin Luther King Jr. Day"));

    let sent = obs.sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].category, NotificationCategory::MarketHolidays);
    assert!(sent[0].body.contains("신정"));
}

#[tokio::test]
async fn missing_holiday_file_is_config_error() {
    let mut harness = Harness::new();
    harness.config = test_config(&[("HOLIDAYS_FILE", "/nonexistent/holidays.toml")]);
    let (ctx, _obs) = harness.context();

    assert!(matches!(
        run_holidays_at(&ctx, Utc::now()).await,
        Err(CollectorError::Config(_))
    ));
}
