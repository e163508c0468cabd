//! 트래커 통합 테스트용 가짜 소스

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use hangon_collector::{CollectorConfig, CollectorContext};
use hangon_core::{QuarterFigure, UniverseMember};
use hangon_data::{
    CompanyProfile, CreditBalanceRow, CreditBalanceSource, DataError, EarningsEvent,
    EarningsProvider, MemoryTableStore, PricePoint, QuoteProvider, ResponseFormat, TableStore,
    TextGenerator, UniverseSource,
};
use hangon_notification::{
    Notification, NotificationHub, NotificationResult, NotificationSender, Revalidator,
};

pub const VALID_ANALYSIS: &str = r#"{
    "title": "빚투 심리 완화",
    "summary": "신용잔고 감소",
    "analysis": "예탁금 대비 신용 비율이 낮아지고 있음",
    "recommendation": ["분할 매수"]
}"#;

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// 시세 소스
#[derive(Default)]
pub struct FakeQuotes {
    pub history: HashMap<String, Vec<PricePoint>>,
    pub points: HashMap<String, PricePoint>,
}

#[async_trait]
impl QuoteProvider for FakeQuotes {
    async fn fetch_history(&self, symbol: &str, _days: u32) -> hangon_data::Result<Vec<PricePoint>> {
        self.history
            .get(symbol)
            .cloned()
            .ok_or_else(|| DataError::FetchError(format!("no history for {}", symbol)))
    }

    async fn fetch_point(&self, symbol: &str) -> hangon_data::Result<Option<PricePoint>> {
        Ok(self.points.get(symbol).copied())
    }
}

/// 실적 소스
#[derive(Default)]
pub struct FakeEarnings {
    pub upcoming: HashMap<String, Vec<EarningsEvent>>,
    pub quarters: HashMap<String, Vec<QuarterFigure>>,
    pub websites: HashMap<String, String>,
    /// 종목 정보 조회가 실패하는 종목
    pub failing_profiles: Vec<String>,
}

#[async_trait]
impl EarningsProvider for FakeEarnings {
    async fn upcoming_earnings(&self, symbol: &str) -> hangon_data::Result<Vec<EarningsEvent>> {
        Ok(self.upcoming.get(symbol).cloned().unwrap_or_default())
    }

    async fn quarterly_figures(&self, symbol: &str) -> hangon_data::Result<Vec<QuarterFigure>> {
        Ok(self.quarters.get(symbol).cloned().unwrap_or_default())
    }

    async fn company_profile(&self, symbol: &str) -> hangon_data::Result<CompanyProfile> {
        if self.failing_profiles.iter().any(|s| s == symbol) {
            return Err(DataError::FetchError(format!("no profile for {}", symbol)));
        }
        Ok(CompanyProfile {
            company_name: Some(format!("{} Inc.", symbol)),
            website: self.websites.get(symbol).cloned(),
        })
    }
}

/// 페이지당 10행을 돌려주는 신용잔고 소스 (최신 행 먼저)
#[derive(Default)]
pub struct FakeCreditSource {
    pub rows: Vec<CreditBalanceRow>,
    pub requested: Mutex<Vec<u32>>,
}

impl FakeCreditSource {
    pub fn with_days(last: &str, days: usize) -> Self {
        let last = date(last);
        let rows = (0..days)
            .map(|i| CreditBalanceRow {
                date: last - Duration::days(i as i64),
                customer_deposit: 54_000_000_000_000 + i as i64 * 100_000_000,
                total: 17_000_000_000_000 - i as i64 * 100_000_000,
            })
            .collect();
        Self {
            rows,
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn requested(&self) -> Vec<u32> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl CreditBalanceSource for FakeCreditSource {
    async fn fetch_pages(&self, pages: u32) -> hangon_data::Result<Vec<CreditBalanceRow>> {
        self.requested.lock().unwrap().push(pages);
        Ok(self.rows.iter().take(pages as usize * 10).cloned().collect())
    }
}

/// 유니버스 소스
#[derive(Default)]
pub struct FakeUniverse {
    pub members: Vec<UniverseMember>,
}

#[async_trait]
impl UniverseSource for FakeUniverse {
    async fn fetch_universe(&self) -> hangon_data::Result<Vec<UniverseMember>> {
        Ok(self.members.clone())
    }
}

/// 미리 정한 응답을 순서대로 돌려주는 생성기
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<&str, &str>>) -> Self {
        Self {
            responses: Mutex::new(
                responses
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str, _format: ResponseFormat) -> hangon_data::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("no scripted response".to_string()));
        next.map_err(DataError::GenerationError)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// 보낸 알림 기록
#[derive(Clone, Default)]
pub struct RecordingSender {
    pub sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// 무효화 요청 기록
#[derive(Default)]
pub struct RecordingRevalidator {
    pub paths: Mutex<Vec<String>>,
    pub tags: Mutex<Vec<String>>,
}

impl RecordingRevalidator {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub fn tags(&self) -> Vec<String> {
        self.tags.lock().unwrap().clone()
    }
}

#[async_trait]
impl Revalidator for RecordingRevalidator {
    async fn revalidate_path(&self, path: &str) -> bool {
        self.paths.lock().unwrap().push(path.to_string());
        true
    }

    async fn revalidate_tag(&self, tag: &str) -> bool {
        self.tags.lock().unwrap().push(tag.to_string());
        true
    }
}

/// 평일 종가 시리즈
pub fn weekday_series(start: &str, end: &str, close: impl Fn(usize) -> f64) -> Vec<PricePoint> {
    let mut points = Vec::new();
    let mut day = date(start);
    let end = date(end);
    while day <= end {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            points.push(PricePoint {
                date: day,
                close: close(points.len()),
            });
        }
        day += Duration::days(1);
    }
    points
}

pub fn test_config(overrides: &[(&str, &str)]) -> CollectorConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("REQUEST_DELAY_MS".to_string(), "0".to_string()),
        ("EARNINGS_FALLBACK_SYMBOLS".to_string(), "AAPL".to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }
    CollectorConfig::from_lookup(|key| vars.get(key).cloned())
}

/// 테스트 컨텍스트 구성 요소
pub struct Harness {
    pub store: Arc<MemoryTableStore>,
    pub quotes: FakeQuotes,
    pub earnings: FakeEarnings,
    pub credit: Arc<FakeCreditSource>,
    pub universe: FakeUniverse,
    pub generator: Option<Arc<ScriptedGenerator>>,
    pub sender: RecordingSender,
    pub revalidator: Arc<RecordingRevalidator>,
    pub config: CollectorConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryTableStore::new()),
            quotes: FakeQuotes::default(),
            earnings: FakeEarnings::default(),
            credit: Arc::new(FakeCreditSource::default()),
            universe: FakeUniverse::default(),
            generator: None,
            sender: RecordingSender::default(),
            revalidator: Arc::new(RecordingRevalidator::default()),
            config: test_config(&[]),
        }
    }

    pub fn context(self) -> (CollectorContext, Observers) {
        let observers = Observers {
            store: self.store.clone(),
            credit: self.credit.clone(),
            generator: self.generator.clone(),
            sender: self.sender.clone(),
            revalidator: self.revalidator.clone(),
        };

        let ctx = CollectorContext {
            config: self.config,
            store: self.store as Arc<dyn TableStore>,
            quotes: Arc::new(self.quotes),
            earnings: Arc::new(self.earnings),
            credit_source: self.credit,
            universe: Arc::new(self.universe),
            generator: self.generator.map(|g| g as Arc<dyn TextGenerator>),
            notifier: Arc::new(NotificationHub::new().with_sender(Box::new(self.sender))),
            revalidator: self.revalidator,
        };

        (ctx, observers)
    }
}

/// 실행 후 확인용 핸들
pub struct Observers {
    pub store: Arc<MemoryTableStore>,
    pub credit: Arc<FakeCreditSource>,
    pub generator: Option<Arc<ScriptedGenerator>>,
    pub sender: RecordingSender,
    pub revalidator: Arc<RecordingRevalidator>,
}
