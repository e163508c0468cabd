//! 실적 발표 일정 수집 (예상치).
//!
//! 발표 실적(`eps_actual`, `revenue_actual`)은 보호 필드이므로 예상치를 다시
//! 받아도 이미 채워진 실적은 유지됩니다. 소스가 주지 않은 값은 레코드에
//! 넣지 않으며, 종목 코드 이름이나 FMP 로고 같은 대체값은 저장된 값이
//! 없을 때만 씁니다.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use chrono::NaiveDate;
use hangon_core::{
    format_revenue, sync_span, Payload, TableSchema, TimeSeriesRecord, EARNINGS_CALENDAR,
};
use hangon_data::{generate_json_or, CompanyProfile, EarningsEvent, FieldPreservingUpserter};
use serde_json::Value;
use tracing::Instrument;

use super::{country_of, today_kst};
use crate::{CollectionStats, CollectorContext, Result};

pub const CACHE_TAG: &str = "earnings-calendar";

const LOGO_DEV_URL: &str = "https://img.logo.dev";
const FMP_LOGO_URL: &str = "https://financialmodelingprep.com/image-stock";

/// 수집 대상 종목
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedSymbol {
    pub symbol: String,
    pub company_name: Option<String>,
    pub country: String,
}

/// 레코드에 쓸 회사 표시 정보 (모르면 `None`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanyIdentity {
    pub company_name: Option<String>,
    pub logo_url: Option<String>,
}

/// 홈페이지 주소에서 도메인 추출
fn website_domain(website: &str) -> Option<&str> {
    let trimmed = website.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    without_www.split('/').next().filter(|d| !d.is_empty())
}

/// logo.dev 로고 URL
pub fn logo_url_for(website: &str, token: Option<&str>) -> Option<String> {
    let domain = website_domain(website)?;
    Some(match token {
        Some(token) => format!("{}/{}?token={}", LOGO_DEV_URL, domain, token),
        None => format!("{}/{}", LOGO_DEV_URL, domain),
    })
}

/// 홈페이지를 모를 때 쓰는 FMP 로고 URL
pub fn fallback_logo_url(symbol: &str) -> String {
    let base = symbol.split('.').next().unwrap_or(symbol);
    format!("{}/{}.png", FMP_LOGO_URL, base)
}

/// 저장된 값이 없을 때만 채울 대체값
fn fallback_fields(target: &TrackedSymbol) -> Payload {
    let mut fallbacks = Payload::new();
    fallbacks.insert("company_name", target.symbol.clone());
    fallbacks.insert("logo_url", fallback_logo_url(&target.symbol));
    fallbacks
}

/// 실적 일정 레코드 생성 (실적 필드는 비워 둠)
pub fn earnings_record(
    target: &TrackedSymbol,
    identity: &CompanyIdentity,
    event: &EarningsEvent,
) -> TimeSeriesRecord {
    let mut record =
        TimeSeriesRecord::composite(event.date.format("%Y-%m-%d").to_string(), target.symbol.clone())
            .with_field("symbol", target.symbol.clone())
            .with_field("country", target.country.clone())
            .with_field("eps_actual", Value::Null)
            .with_field("revenue_actual", Value::Null)
            .with_field("revenue_actual_formatted", Value::Null);

    if let Some(name) = &identity.company_name {
        record.payload.insert("company_name", name.clone());
    }
    if let Some(logo) = &identity.logo_url {
        record.payload.insert("logo_url", logo.clone());
    }
    if let Some(eps) = event.eps_estimate {
        record.payload.insert("eps_estimate", eps);
    }
    if let Some(revenue) = event.revenue_estimate {
        record.payload.insert("revenue_estimate", revenue);
        record.payload.insert(
            "revenue_estimate_formatted",
            format_revenue(Some(revenue), &target.country),
        );
    }
    record
}

/// 오늘 이후 일정만, 날짜순으로 최대 `limit`개
pub fn upcoming_only(mut events: Vec<EarningsEvent>, today: NaiveDate, limit: usize) -> Vec<EarningsEvent> {
    events.retain(|e| e.date >= today);
    events.sort_by_key(|e| e.date);
    events.dedup_by_key(|e| e.date);
    events.truncate(limit);
    events
}

/// 활성 모니터링 종목, 없으면 설정의 기본 종목
async fn tracked_symbols(ctx: &CollectorContext) -> Result<Vec<TrackedSymbol>> {
    let active: Vec<TrackedSymbol> = ctx
        .store
        .monitored_entities()
        .await?
        .into_iter()
        .filter(|e| e.status.is_active())
        .map(|e| TrackedSymbol {
            country: e.country.clone().unwrap_or_else(|| country_of(&e.symbol).to_string()),
            symbol: e.symbol,
            company_name: e.company_name,
        })
        .collect();

    if !active.is_empty() {
        return Ok(active);
    }

    tracing::info!("모니터링 종목 없음, 기본 종목 사용");
    Ok(ctx
        .config
        .earnings
        .fallback_symbols
        .iter()
        .map(|symbol| TrackedSymbol {
            symbol: symbol.clone(),
            company_name: None,
            country: country_of(symbol).to_string(),
        })
        .collect())
}

/// 실적 발표 일정 수집 (한국 시간 오늘 기준)
pub async fn run_earnings_tracker(ctx: &CollectorContext) -> Result<CollectionStats> {
    run_earnings_tracker_at(ctx, today_kst()).await
}

pub async fn run_earnings_tracker_at(ctx: &CollectorContext, today: NaiveDate) -> Result<CollectionStats> {
    collect(ctx, today)
        .instrument(sync_span!("earnings_tracker", EARNINGS_CALENDAR))
        .await
}

fn translation_prompt(names: &[String]) -> String {
    format!(
        "다음 미국 기업명을 한국에서 통용되는 한글 이름으로 바꾸세요. \
         원래 이름을 키, 한글 이름을 값으로 하는 JSON 객체로만 답하세요.\n{}",
        names.join("\n")
    )
}

/// 미국 기업명 한글 변환 (생성기가 없거나 실패하면 빈 맵)
async fn translate_company_names(ctx: &CollectorContext, names: Vec<String>) -> HashMap<String, String> {
    let (Some(generator), false) = (&ctx.generator, names.is_empty()) else {
        return HashMap::new();
    };
    let translations: HashMap<String, String> = generate_json_or(
        generator.as_ref(),
        &translation_prompt(&names),
        ctx.config.llm.max_attempts,
        HashMap::new(),
    )
    .await;
    tracing::info!(names = names.len(), translated = translations.len(), "기업명 한글 변환");
    translations
}

/// 저장된 행에 값이 없는 필드만 대체값으로 채움
async fn fill_fallbacks(ctx: &CollectorContext, record: &mut TimeSeriesRecord, fallbacks: &Payload) {
    let missing: Vec<(String, Value)> = fallbacks
        .iter()
        .filter(|(field, _)| !record.payload.contains(field))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect();
    if missing.is_empty() {
        return;
    }

    let existing = match ctx.store.select_by_key(EARNINGS_CALENDAR, &record.natural_key).await {
        Ok(existing) => existing,
        Err(e) => {
            tracing::warn!(key = %record.natural_key, error = %e, "기존 실적 행 조회 실패, 대체값 생략");
            return;
        }
    };

    for (field, value) in missing {
        let stored = existing
            .as_ref()
            .is_some_and(|payload| payload.is_field_populated(&field));
        if !stored {
            record.payload.insert(field, value);
        }
    }
}

/// 조회 결과 (번역 전)
struct Fetched {
    target: TrackedSymbol,
    events: Vec<EarningsEvent>,
    /// 조회 실패 시 `None`
    profile: Option<CompanyProfile>,
}

impl Fetched {
    fn english_name(&self) -> Option<&str> {
        self.target
            .company_name
            .as_deref()
            .or_else(|| self.profile.as_ref().and_then(|p| p.company_name.as_deref()))
    }
}

async fn collect(ctx: &CollectorContext, today: NaiveDate) -> Result<CollectionStats> {
    let start = Instant::now();
    let mut stats = CollectionStats::new();
    let targets = tracked_symbols(ctx).await?;
    let upserter = FieldPreservingUpserter::new(ctx.store.clone(), TableSchema::earnings_calendar());
    let delay = ctx.config.request_delay();
    let logodev_key = ctx.config.earnings.logodev_key.as_deref();

    tracing::info!(symbols = targets.len(), "실적 일정 수집 시작");

    // 1. 일정과 종목 정보 조회
    let mut fetched = Vec::new();
    for (i, target) in targets.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }

        let events = match ctx.earnings.upcoming_earnings(&target.symbol).await {
            Ok(events) => upcoming_only(events, today, ctx.config.earnings.max_events_per_symbol),
            Err(e) => {
                tracing::warn!(symbol = %target.symbol, error = %e, "실적 일정 조회 실패");
                stats.errors += 1;
                continue;
            }
        };

        if events.is_empty() {
            tracing::debug!(symbol = %target.symbol, "예정된 실적 발표 없음");
            stats.empty += 1;
            continue;
        }

        let profile = match ctx.earnings.company_profile(&target.symbol).await {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::debug!(symbol = %target.symbol, error = %e, "종목 정보 조회 실패");
                None
            }
        };

        fetched.push(Fetched {
            target,
            events,
            profile,
        });
    }

    // 2. 미국 기업명 한글 변환 (한 번에)
    let us_names: Vec<String> = fetched
        .iter()
        .filter(|f| f.target.country == "US")
        .filter_map(|f| f.english_name().map(str::to_string))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let translations = translate_company_names(ctx, us_names).await;

    // 3. 레코드 생성 및 저장
    for item in &fetched {
        let company_name = item.english_name().map(|name| {
            translations
                .get(name)
                .filter(|ko| !ko.trim().is_empty())
                .cloned()
                .unwrap_or_else(|| name.to_string())
        });
        let logo_url = item
            .profile
            .as_ref()
            .and_then(|p| p.website.as_deref())
            .and_then(|website| logo_url_for(website, logodev_key));
        let identity = CompanyIdentity {
            company_name,
            logo_url,
        };
        let fallbacks = fallback_fields(&item.target);

        let mut records = Vec::with_capacity(item.events.len());
        for event in &item.events {
            let mut record = earnings_record(&item.target, &identity, event);
            fill_fallbacks(ctx, &mut record, &fallbacks).await;
            records.push(record);
        }
        stats.fetched += records.len();

        let report = upserter.apply_batch(&records).await;
        tracing::debug!(symbol = %item.target.symbol, ?report, "실적 일정 저장");
        stats.absorb(&report);
    }

    if stats.written() > 0 {
        ctx.revalidator.revalidate_tag(CACHE_TAG).await;
    }

    stats.elapsed = start.elapsed();
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(date: &str) -> EarningsEvent {
        EarningsEvent {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            eps_estimate: Some(1.5),
            revenue_estimate: Some(120_000_000_000.0),
        }
    }

    #[test]
    fn test_upcoming_only_filters_past_and_limits() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let events = vec![
            event("2024-07-25"),
            event("2024-03-20"),
            event("2024-04-25"),
            event("2024-04-25"),
            event("2024-10-30"),
        ];

        let upcoming = upcoming_only(events, today, 2);

        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0].date, NaiveDate::from_ymd_opt(2024, 4, 25).unwrap());
        assert_eq!(upcoming[1].date, NaiveDate::from_ymd_opt(2024, 7, 25).unwrap());
    }

    #[test]
    fn test_record_leaves_actuals_empty() {
        let target = TrackedSymbol {
            symbol: "AAPL".into(),
            company_name: None,
            country: "US".into(),
        };
        let identity = CompanyIdentity {
            company_name: Some("애플".into()),
            logo_url: None,
        };

        let record = earnings_record(&target, &identity, &event("2024-04-25"));

        assert_eq!(record.natural_key.secondary_key.as_deref(), Some("AAPL"));
        assert_eq!(record.payload.get_str("company_name"), Some("애플"));
        assert_eq!(record.payload.get_f64("eps_estimate"), Some(1.5));
        assert_eq!(record.payload.get_str("revenue_estimate_formatted"), Some("1200.0억 달러"));
        assert!(!record.payload.is_field_populated("revenue_actual"));
        assert!(record.payload.contains("eps_actual"));
        assert!(!record.payload.contains("logo_url"));
    }

    #[test]
    fn test_record_omits_unknown_estimates() {
        let target = TrackedSymbol {
            symbol: "005930.KS".into(),
            company_name: Some("삼성전자".into()),
            country: "KR".into(),
        };
        let event = EarningsEvent {
            date: NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
            eps_estimate: None,
            revenue_estimate: None,
        };

        let record = earnings_record(&target, &CompanyIdentity::default(), &event);

        assert!(!record.payload.contains("company_name"));
        assert!(!record.payload.contains("eps_estimate"));
        assert!(!record.payload.contains("revenue_estimate_formatted"));
    }

    #[test]
    fn test_logo_urls() {
        assert_eq!(
            logo_url_for("https://www.nvidia.com/en-us/", None).as_deref(),
            Some("https://img.logo.dev/nvidia.com")
        );
        assert_eq!(
            logo_url_for("http://apple.com", Some("pk_123")).as_deref(),
            Some("https://img.logo.dev/apple.com?token=pk_123")
        );
        assert_eq!(logo_url_for("  ", None), None);
        assert_eq!(
            fallback_logo_url("005930.KS"),
            "https://financialmodelingprep.com/image-stock/005930.png"
        );
    }
}
