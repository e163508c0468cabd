//! 증시 휴장일 동기화 및 알림.
//!
//! 휴장일 목록은 TOML 파일에서 읽습니다:
//!
//! ```toml
//! [[holiday]]
//! date = "2025-01-01"
//! country = "KR"
//! name = "New Year's Day"
//! name_ko = "신정"
//!
//! [[holiday]]
//! date = "2025-11-28"
//! country = "US"
//! name = "Day after Thanksgiving"
//! kind = "half_day"
//! close_time = "13:00"
//! ```
//!
//! 알림 시점 (한국 시간):
//! - 한국 휴장일: 전날 21시
//! - 미국 휴장일: 당일 9시

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Timelike, Utc};
use hangon_core::{sync_span, TableSchema, TimeSeriesRecord, MARKET_HOLIDAYS};
use hangon_data::{generate_json_or, FieldPreservingUpserter};
use hangon_notification::{Notification, NotificationCategory};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::CollectorError;
use crate::{CollectionStats, CollectorContext, Result};

pub const FRONTEND_PATH: &str = "/market-holidays";

/// 한국 휴장일 알림 시각 (전날)
const KR_NOTIFY_HOUR: u32 = 21;
/// 미국 휴장일 알림 시각 (당일)
const US_NOTIFY_HOUR: u32 = 9;

/// 휴장 유형
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HolidayKind {
    #[default]
    Holiday,
    /// 조기 폐장
    HalfDay,
}

impl HolidayKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Holiday => "holiday",
            Self::HalfDay => "half_day",
        }
    }
}

/// 휴장일 항목
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayEntry {
    pub date: NaiveDate,
    /// `KR` 또는 `US`
    pub country: String,
    pub name: String,
    #[serde(default)]
    pub name_ko: Option<String>,
    #[serde(default)]
    pub kind: HolidayKind,
    /// 조기 폐장 시각 (`HH:MM`, 현지 시간)
    #[serde(default)]
    pub close_time: Option<String>,
}

impl HolidayEntry {
    /// 한국어 이름 (없으면 원래 이름)
    pub fn display_name(&self) -> &str {
        self.name_ko.as_deref().unwrap_or(&self.name)
    }

    pub fn to_record(&self) -> TimeSeriesRecord {
        TimeSeriesRecord::composite(self.date.format("%Y-%m-%d").to_string(), self.country.clone())
            .with_field("name", self.name.clone())
            .with_field("name_ko", self.display_name().to_string())
            .with_field("kind", self.kind.as_str())
            .with_field("close_time", self.close_time.clone())
    }
}

/// 휴장일 달력 파일
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HolidayCalendar {
    #[serde(default, rename = "holiday")]
    pub holidays: Vec<HolidayEntry>,
}

impl HolidayCalendar {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| CollectorError::Config(format!("휴장일 파일 파싱 실패: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CollectorError::Config(format!("휴장일 파일 읽기 실패 ({}): {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// 한국어 이름이 없는 항목의 원래 이름 (중복 제거)
    pub fn untranslated_names(&self) -> Vec<String> {
        self.holidays
            .iter()
            .filter(|h| h.name_ko.is_none())
            .map(|h| h.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// 번역 결과 적용. 번역이 없는 이름은 원래 이름을 사용합니다.
    pub fn apply_translations(&mut self, translations: &HashMap<String, String>) {
        for holiday in self.holidays.iter_mut().filter(|h| h.name_ko.is_none()) {
            let name_ko = translations
                .get(&holiday.name)
                .filter(|t| !t.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| holiday.name.clone());
            holiday.name_ko = Some(name_ko);
        }
    }
}

fn translation_prompt(names: &[String]) -> String {
    format!(
        "다음 증시 휴장일 이름을 한국어로 번역하세요. \
         원래 이름을 키, 한국어 이름을 값으로 하는 JSON 객체로만 답하세요.\n{}",
        names
            .iter()
            .map(|n| format!("- {}", n))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// 지금(`now`) 보내야 할 휴장일 알림
pub fn due_notifications(holidays: &[HolidayEntry], now: DateTime<Utc>) -> Vec<Notification> {
    let local = now.with_timezone(&chrono_tz::Asia::Seoul);
    let today = local.date_naive();
    let tomorrow = today + ChronoDuration::days(1);
    let hour = local.hour();

    holidays
        .iter()
        .filter_map(|h| match h.country.as_str() {
            "KR" if hour == KR_NOTIFY_HOUR && h.date == tomorrow => Some(kr_notification(h)),
            "US" if hour == US_NOTIFY_HOUR && h.date == today => Some(us_notification(h)),
            _ => None,
        })
        .collect()
}

fn kr_notification(holiday: &HolidayEntry) -> Notification {
    let body = match holiday.kind {
        HolidayKind::Holiday => format!(
            "내일({})은 {}(으)로 한국 증시가 휴장합니다.",
            holiday.date.format("%m/%d"),
            holiday.display_name()
        ),
        HolidayKind::HalfDay => format!(
            "내일({})은 {}(으)로 한국 증시가 {}에 조기 폐장합니다.",
            holiday.date.format("%m/%d"),
            holiday.display_name(),
            holiday.close_time.as_deref().unwrap_or("단축 시간")
        ),
    };
    Notification::new(NotificationCategory::MarketHolidays, "📅 한국 증시 휴장 안내", body)
        .with_url(FRONTEND_PATH)
}

fn us_notification(holiday: &HolidayEntry) -> Notification {
    let body = match holiday.kind {
        HolidayKind::Holiday => format!(
            "오늘({})은 {}(으)로 미국 증시가 휴장합니다.",
            holiday.date.format("%m/%d"),
            holiday.display_name()
        ),
        HolidayKind::HalfDay => format!(
            "오늘({})은 {}(으)로 미국 증시가 {}(현지 시간)에 조기 폐장합니다.",
            holiday.date.format("%m/%d"),
            holiday.display_name(),
            holiday.close_time.as_deref().unwrap_or("단축 시간")
        ),
    };
    Notification::new(NotificationCategory::MarketHolidays, "🇺🇸 미국 증시 휴장 안내", body)
        .with_url(FRONTEND_PATH)
}

/// 휴장일 동기화
pub async fn run_holidays(ctx: &CollectorContext) -> Result<CollectionStats> {
    run_holidays_at(ctx, Utc::now()).await
}

pub async fn run_holidays_at(ctx: &CollectorContext, now: DateTime<Utc>) -> Result<CollectionStats> {
    collect(ctx, now)
        .instrument(sync_span!("holidays", MARKET_HOLIDAYS))
        .await
}

async fn collect(ctx: &CollectorContext, now: DateTime<Utc>) -> Result<CollectionStats> {
    let start = Instant::now();
    let mut stats = CollectionStats::new();

    // 1. 달력 로드
    let mut calendar = HolidayCalendar::load(&ctx.config.holidays.file)?;
    stats.fetched = calendar.holidays.len();
    if calendar.holidays.is_empty() {
        tracing::warn!(file = %ctx.config.holidays.file, "휴장일 목록이 비어 있음");
        stats.empty += 1;
    }

    // 2. 한국어 이름 번역
    let untranslated = calendar.untranslated_names();
    if !untranslated.is_empty() {
        let translations: HashMap<String, String> = match &ctx.generator {
            Some(generator) => {
                generate_json_or(
                    generator.as_ref(),
                    &translation_prompt(&untranslated),
                    ctx.config.llm.max_attempts,
                    HashMap::new(),
                )
                .await
            }
            None => HashMap::new(),
        };
        tracing::info!(
            names = untranslated.len(),
            translated = translations.len(),
            "휴장일 이름 번역"
        );
        calendar.apply_translations(&translations);
    }

    // 3. 저장
    let records: Vec<TimeSeriesRecord> = calendar.holidays.iter().map(HolidayEntry::to_record).collect();
    let upserter = FieldPreservingUpserter::new(ctx.store.clone(), TableSchema::market_holidays());
    let report = upserter.apply_batch(&records).await;
    stats.absorb(&report);

    // 4. 알림
    for notification in due_notifications(&calendar.holidays, now) {
        tracing::info!(title = %notification.title, "휴장일 알림");
        if let Err(e) = ctx.notifier.notify(&notification).await {
            tracing::warn!(error = %e, "휴장일 알림 전송 실패");
        }
    }

    if report.written() > 0 {
        ctx.revalidator.revalidate_path(FRONTEND_PATH).await;
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}
