//! 위키백과 지수 구성 종목 크롤러.
//!
//! S&P 100 문서의 구성 종목 표(`Symbol`, `Name` 열)를 읽습니다.
//! 표 구조가 바뀌어 아무것도 못 읽으면 빈 목록 대신 파싱 오류를 돌려줍니다.

use std::time::Duration;

use hangon_core::UniverseMember;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::error::{DataError, Result};

const BASE_URL: &str = "https://en.wikipedia.org";
const SP100_PATH: &str = "/wiki/S%26P_100";

/// 위키백과 크롤러.
pub struct WikipediaIndexFetcher {
    client: Client,
    base_url: String,
}

impl WikipediaIndexFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0")
            .build()
            .map_err(|e| DataError::ConfigError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
        })
    }

    /// 주소 변경 (테스트용).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 현재 S&P 100 구성 종목.
    pub async fn sp100(&self) -> Result<Vec<UniverseMember>> {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), SP100_PATH);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(DataError::FetchError(format!(
                "{} → HTTP {}",
                url,
                response.status().as_u16()
            )));
        }

        let members = parse_constituents_table(&response.text().await?)?;
        debug!(count = members.len(), "S&P 100 구성 종목 수집");
        Ok(members)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| DataError::ParseError(format!("선택자 {}: {:?}", css, e)))
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

/// `Symbol` 열이 있는 첫 번째 표에서 종목 추출.
///
/// 클래스 주식 표기(`BRK.B`)는 Yahoo 형식(`BRK-B`)으로 바꿉니다.
pub fn parse_constituents_table(html: &str) -> Result<Vec<UniverseMember>> {
    let document = Html::parse_document(html);
    let table_sel = selector("table.wikitable")?;
    let tr_sel = selector("tr")?;
    let th_sel = selector("th")?;
    let td_sel = selector("td")?;

    for table in document.select(&table_sel) {
        let Some(header) = table.select(&tr_sel).next() else {
            continue;
        };
        let headers: Vec<String> = header.select(&th_sel).map(cell_text).collect();
        let Some(symbol_col) = headers.iter().position(|h| h == "Symbol") else {
            continue;
        };
        let name_col = headers.iter().position(|h| h == "Name" || h == "Company");

        let members: Vec<UniverseMember> = table
            .select(&tr_sel)
            .filter_map(|tr| {
                let cells: Vec<String> = tr.select(&td_sel).map(cell_text).collect();
                let symbol = cells.get(symbol_col)?.replace('.', "-");
                if symbol.is_empty() {
                    return None;
                }
                let company_name = name_col
                    .and_then(|col| cells.get(col))
                    .filter(|name| !name.is_empty())
                    .cloned();
                Some(UniverseMember {
                    symbol,
                    company_name,
                    country: "US".to_string(),
                })
            })
            .collect();

        if !members.is_empty() {
            return Ok(members);
        }
    }

    Err(DataError::ParseError("Symbol 열이 있는 구성 종목 표 없음".to_string()))
}
