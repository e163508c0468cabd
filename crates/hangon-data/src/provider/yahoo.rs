//! Yahoo Finance 어댑터.
//!
//! - 시세: `yahoo_finance_api` 커넥터 (일봉)
//! - 실적: quoteSummary JSON (`calendarEvents`, `incomeStatementHistoryQuarterly`,
//!   `earningsHistory` 모듈)
//! - 종목 정보: quoteSummary `quoteType`, `assetProfile` 모듈
//!
//! Yahoo 타임스탬프는 UTC이므로 거래소 현지 날짜로 변환합니다. 코스피 일봉은
//! 한국 시간 자정(전날 15:00 UTC)에 찍히기 때문에 UTC 날짜를 그대로 쓰면
//! 하루씩 밀립니다.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use hangon_core::QuarterFigure;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;
use yahoo_finance_api as yahoo;

use super::{CompanyProfile, EarningsEvent, EarningsProvider, PricePoint, QuoteProvider};
use crate::error::{DataError, Result};

/// 심볼의 거래소 시간대.
pub fn exchange_timezone(symbol: &str) -> Tz {
    let upper = symbol.to_uppercase();
    if upper.ends_with(".KS") || upper.ends_with(".KQ") || upper.starts_with("^KS") || upper.starts_with("^KQ") {
        chrono_tz::Asia::Seoul
    } else {
        chrono_tz::America::New_York
    }
}

/// 유닉스 타임스탬프 → 거래소 현지 날짜.
pub fn local_trade_date(timestamp: i64, tz: Tz) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.with_timezone(&tz).date_naive())
}

fn range_for_days(days: u32) -> &'static str {
    match days {
        0..=5 => "5d",
        6..=30 => "1mo",
        31..=90 => "3mo",
        91..=180 => "6mo",
        181..=365 => "1y",
        _ => "2y",
    }
}

/// Yahoo Finance 시세 소스.
pub struct YahooQuoteProvider {
    connector: yahoo::YahooConnector,
}

impl YahooQuoteProvider {
    pub fn new() -> Result<Self> {
        let connector = yahoo::YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl QuoteProvider for YahooQuoteProvider {
    async fn fetch_history(&self, symbol: &str, days: u32) -> Result<Vec<PricePoint>> {
        let range = range_for_days(days);
        debug!(symbol, range, "Yahoo Finance 일봉 조회");

        let response = self
            .connector
            .get_quote_range(symbol, "1d", range)
            .await
            .map_err(|e| DataError::FetchError(format!("Yahoo Finance API 오류 ({}): {}", symbol, e)))?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::ParseError(format!("Quote 파싱 오류: {}", e)))?;

        let tz = exchange_timezone(symbol);
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for quote in quotes {
            if !quote.close.is_finite() || quote.close <= 0.0 {
                continue;
            }
            if let Some(date) = local_trade_date(quote.timestamp as i64, tz) {
                by_date.insert(date, quote.close);
            }
        }

        Ok(by_date
            .into_iter()
            .map(|(date, close)| PricePoint { date, close })
            .collect())
    }

    async fn fetch_point(&self, symbol: &str) -> Result<Option<PricePoint>> {
        Ok(self.fetch_history(symbol, 5).await?.pop())
    }
}

/// quoteSummary 기반 실적 소스.
pub struct YahooEarningsProvider {
    client: Client,
    base_url: String,
}

impl YahooEarningsProvider {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0")
            .build()
            .map_err(|e| DataError::ConfigError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: "https://query2.finance.yahoo.com".to_string(),
        })
    }

    /// 주소 변경 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn quote_summary(&self, symbol: &str, modules: &str) -> Result<Value> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.base_url.trim_end_matches('/'),
            symbol
        );
        let response = self
            .client
            .get(&url)
            .query(&[("modules", modules)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DataError::FetchError(format!(
                "quoteSummary {} → HTTP {}",
                symbol,
                response.status().as_u16()
            )));
        }

        let body: Value = response.json().await?;
        body.pointer("/quoteSummary/result/0")
            .cloned()
            .ok_or_else(|| DataError::FetchError(format!("quoteSummary 결과 없음: {}", symbol)))
    }
}

#[async_trait]
impl EarningsProvider for YahooEarningsProvider {
    async fn upcoming_earnings(&self, symbol: &str) -> Result<Vec<EarningsEvent>> {
        let summary = self.quote_summary(symbol, "calendarEvents").await?;
        Ok(parse_upcoming_earnings(&summary, exchange_timezone(symbol)))
    }

    async fn quarterly_figures(&self, symbol: &str) -> Result<Vec<QuarterFigure>> {
        let summary = self
            .quote_summary(symbol, "incomeStatementHistoryQuarterly,earningsHistory")
            .await?;
        Ok(parse_quarterly_figures(&summary))
    }

    async fn company_profile(&self, symbol: &str) -> Result<CompanyProfile> {
        let summary = self.quote_summary(symbol, "quoteType,assetProfile").await?;
        Ok(parse_company_profile(&summary))
    }
}

fn raw_f64(value: &Value, pointer: &str) -> Option<f64> {
    value
        .pointer(pointer)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
}

fn non_blank(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `quoteType` + `assetProfile` 파싱.
pub fn parse_company_profile(summary: &Value) -> CompanyProfile {
    CompanyProfile {
        company_name: non_blank(summary, "/quoteType/longName")
            .or_else(|| non_blank(summary, "/quoteType/shortName")),
        website: non_blank(summary, "/assetProfile/website"),
    }
}

/// `calendarEvents.earnings` 파싱.
///
/// 발표일이 범위(2개)로 오면 각 날짜가 별도 이벤트가 되지 않도록 첫 날짜만
/// 사용합니다.
pub fn parse_upcoming_earnings(summary: &Value, tz: Tz) -> Vec<EarningsEvent> {
    let Some(earnings) = summary.pointer("/calendarEvents/earnings") else {
        return Vec::new();
    };

    let date = earnings
        .pointer("/earningsDate/0/raw")
        .and_then(Value::as_i64)
        .and_then(|ts| local_trade_date(ts, tz));

    match date {
        Some(date) => vec![EarningsEvent {
            date,
            eps_estimate: raw_f64(earnings, "/earningsAverage/raw"),
            revenue_estimate: raw_f64(earnings, "/revenueAverage/raw"),
        }],
        None => Vec::new(),
    }
}

/// 분기 손익계산서 + EPS 히스토리 파싱 (분기 종료일 기준 병합).
pub fn parse_quarterly_figures(summary: &Value) -> Vec<QuarterFigure> {
    let mut figures: BTreeMap<NaiveDate, QuarterFigure> = BTreeMap::new();

    let statements = summary
        .pointer("/incomeStatementHistoryQuarterly/incomeStatementHistory")
        .and_then(Value::as_array);
    for statement in statements.into_iter().flatten() {
        let Some(end_date) = statement
            .pointer("/endDate/raw")
            .and_then(Value::as_i64)
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .map(|dt| dt.date_naive())
        else {
            continue;
        };
        let entry = figures.entry(end_date).or_insert(QuarterFigure {
            end_date,
            revenue: None,
            eps: None,
        });
        entry.revenue = raw_f64(statement, "/totalRevenue/raw");
    }

    let history = summary
        .pointer("/earningsHistory/history")
        .and_then(Value::as_array);
    for item in history.into_iter().flatten() {
        let Some(end_date) = item
            .pointer("/quarter/raw")
            .and_then(Value::as_i64)
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .map(|dt| dt.date_naive())
        else {
            continue;
        };
        let entry = figures.entry(end_date).or_insert(QuarterFigure {
            end_date,
            revenue: None,
            eps: None,
        });
        entry.eps = raw_f64(item, "/epsActual/raw");
    }

    figures.into_values().collect()
}
