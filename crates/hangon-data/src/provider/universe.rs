//! 모니터링 유니버스 (미국 + 코스피).
//!
//! 미국 종목은 설정된 고정 목록이 있으면 그것을, 없으면 S&P 100 구성
//! 종목을 씁니다. 한쪽이라도 비어 있으면 편출 처리가 전부 비활성화로
//! 번지지 않도록 소스 실패로 취급합니다.

use async_trait::async_trait;
use hangon_core::UniverseMember;
use tracing::info;

use super::{NaverFinanceFetcher, UniverseSource, WikipediaIndexFetcher};
use crate::error::{DataError, Result};

/// S&P 100(또는 고정 목록) + 코스피 상위 N 유니버스.
pub struct IndexUniverse {
    naver: NaverFinanceFetcher,
    wikipedia: WikipediaIndexFetcher,
    /// 비어 있으면 S&P 100 수집
    us_symbols: Vec<String>,
    kospi_top: usize,
}

impl IndexUniverse {
    pub fn new(
        naver: NaverFinanceFetcher,
        wikipedia: WikipediaIndexFetcher,
        us_symbols: Vec<String>,
        kospi_top: usize,
    ) -> Self {
        Self {
            naver,
            wikipedia,
            us_symbols,
            kospi_top,
        }
    }

    async fn us_members(&self) -> Result<Vec<UniverseMember>> {
        let members = if self.us_symbols.is_empty() {
            self.wikipedia.sp100().await?
        } else {
            self.us_symbols
                .iter()
                .map(|symbol| UniverseMember {
                    symbol: symbol.clone(),
                    company_name: None,
                    country: "US".to_string(),
                })
                .collect()
        };

        if members.is_empty() {
            return Err(DataError::FetchError("미국 유니버스가 비어 있음".to_string()));
        }
        Ok(members)
    }
}

#[async_trait]
impl UniverseSource for IndexUniverse {
    async fn fetch_universe(&self) -> Result<Vec<UniverseMember>> {
        let mut members = self.us_members().await?;
        let us_count = members.len();

        if self.kospi_top > 0 {
            let kospi = self.naver.kospi_top(self.kospi_top).await?;
            if kospi.is_empty() {
                return Err(DataError::FetchError("코스피 유니버스가 비어 있음".to_string()));
            }
            members.extend(kospi);
        }

        info!(us = us_count, kr = members.len() - us_count, "유니버스 수집");
        Ok(members)
    }
}
