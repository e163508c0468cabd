//! 네이버 금융 크롤러.
//!
//! ## 데이터 소스
//! - `/sise/sise_deposit.naver`: 고객예탁금, 신용융자 잔고 (억원 단위)
//! - `/sise/sise_market_sum.naver`: 코스피 시가총액 순위
//!
//! HTML 파싱은 네트워크와 분리된 순수 함수(`parse_*`)로 두어 고정 HTML로
//! 테스트합니다.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use hangon_core::{TimeSeriesRecord, UniverseMember};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::CreditBalanceSource;
use crate::error::{DataError, Result};

const BASE_URL: &str = "https://finance.naver.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// 억원 → 원
const HUNDRED_MILLION: i64 = 100_000_000;

/// 신용융자 잔고 한 행.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalanceRow {
    pub date: NaiveDate,
    /// 고객예탁금 (원)
    pub customer_deposit: i64,
    /// 신용융자 합계 (원)
    pub total: i64,
}

impl CreditBalanceRow {
    pub fn to_record(&self) -> TimeSeriesRecord {
        TimeSeriesRecord::dated(self.date.format("%Y-%m-%d").to_string())
            .with_field("customer_deposit", self.customer_deposit)
            .with_field("total", self.total)
    }
}

/// 네이버 금융 크롤러.
pub struct NaverFinanceFetcher {
    client: Client,
    base_url: String,
    /// 요청 간 딜레이
    request_delay: Duration,
}

impl NaverFinanceFetcher {
    pub fn new(request_delay: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DataError::ConfigError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            request_delay,
        })
    }

    /// 주소 변경 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }

    async fn fetch_html(&self, path: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(DataError::FetchError(format!(
                "{} → HTTP {}",
                url,
                response.status().as_u16()
            )));
        }
        // Content-Type의 charset(euc-kr)으로 디코딩
        Ok(response.text().await?)
    }

    /// 코스피 시가총액 상위 `limit`개 종목.
    pub async fn kospi_top(&self, limit: usize) -> Result<Vec<UniverseMember>> {
        let html = self.fetch_html("/sise/sise_market_sum.naver?sosok=0&page=1").await?;
        let members = parse_market_sum_page(&html, limit)?;
        debug!(count = members.len(), "코스피 상위 종목 수집");
        Ok(members)
    }
}

#[async_trait]
impl CreditBalanceSource for NaverFinanceFetcher {
    async fn fetch_pages(&self, pages: u32) -> Result<Vec<CreditBalanceRow>> {
        let mut rows = Vec::new();
        let mut failed_pages = 0u32;

        for page in 1..=pages {
            let path = format!("/sise/sise_deposit.naver?page={}", page);
            match self.fetch_html(&path).await {
                Ok(html) => match parse_credit_balance_page(&html) {
                    Ok(parsed) => rows.extend(parsed),
                    Err(e) => {
                        warn!(page, error = %e, "신용잔고 페이지 파싱 실패");
                        failed_pages += 1;
                    }
                },
                Err(e) => {
                    warn!(page, error = %e, "신용잔고 페이지 수집 실패");
                    failed_pages += 1;
                }
            }

            if page < pages {
                tokio::time::sleep(self.request_delay).await;
            }
        }

        // 모든 페이지가 실패하면 "소스 불가"로 구분
        if pages > 0 && failed_pages == pages {
            return Err(DataError::FetchError(format!(
                "신용잔고 {}페이지 모두 실패",
                pages
            )));
        }

        Ok(rows)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| DataError::ParseError(format!("선택자 {}: {:?}", css, e)))
}

/// 네이버 날짜 (`25.01.24` 또는 `2025.01.24`).
fn parse_naver_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, "%y.%m.%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y.%m.%d"))
        .ok()
}

/// 쉼표가 들어간 정수 (`"1,234"`).
fn parse_grouped_int(text: &str) -> Option<i64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    cleaned.parse().ok()
}

/// `sise_deposit` 페이지 파싱.
///
/// 열 순서: 날짜 | 고객예탁금 | 증감 | 신용잔고 | 증감 | ...
/// 날짜나 숫자를 읽을 수 없는 행은 건너뜁니다.
pub fn parse_credit_balance_page(html: &str) -> Result<Vec<CreditBalanceRow>> {
    let document = Html::parse_document(html);
    let table_sel = selector("table.type_1")?;
    let tr_sel = selector("tr")?;
    let td_sel = selector("td")?;

    let Some(table) = document.select(&table_sel).next() else {
        return Err(DataError::ParseError("table.type_1 없음".to_string()));
    };

    let mut rows = Vec::new();
    for tr in table.select(&tr_sel) {
        let cols: Vec<String> = tr
            .select(&td_sel)
            .map(|td| td.text().collect::<String>().trim().to_string())
            .collect();
        if cols.len() < 5 {
            continue;
        }
        let Some(date) = parse_naver_date(&cols[0]) else {
            continue;
        };
        let (Some(deposit), Some(total)) = (parse_grouped_int(&cols[1]), parse_grouped_int(&cols[3]))
        else {
            continue;
        };

        rows.push(CreditBalanceRow {
            date,
            customer_deposit: deposit * HUNDRED_MILLION,
            total: total * HUNDRED_MILLION,
        });
    }

    Ok(rows)
}

/// `sise_market_sum` 페이지에서 상위 `limit`개 종목 추출.
pub fn parse_market_sum_page(html: &str, limit: usize) -> Result<Vec<UniverseMember>> {
    let document = Html::parse_document(html);
    let link_sel = selector("a.tltle")?;

    let members = document
        .select(&link_sel)
        .filter_map(|a| {
            let code = a.value().attr("href")?.rsplit('=').next()?.trim().to_string();
            if code.is_empty() {
                return None;
            }
            let name = a.text().collect::<String>().trim().to_string();
            Some(UniverseMember {
                symbol: format!("{}.KS", code),
                company_name: (!name.is_empty()).then_some(name),
                country: "KR".to_string(),
            })
        })
        .take(limit)
        .collect();

    Ok(members)
}
