//! 테이블 스키마와 보호 필드 선언.
//!
//! 보호 필드(protected field)는 한 번 채워지면 이후의 부분 쓰기로
//! 절대 덮어쓰지 않는 컬럼입니다. 예를 들어 실적 발표 후 기록된
//! `revenue_actual`은 예상치만 담긴 재수집 레코드로 지워지면 안 됩니다.

use std::collections::BTreeSet;

/// 테이블별 보호 필드 집합.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedFields(BTreeSet<&'static str>);

impl ProtectedFields {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn of(fields: &[&'static str]) -> Self {
        Self(fields.iter().copied().collect())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &&'static str> {
        self.0.iter()
    }
}

/// 테이블 스키마 선언.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    /// 테이블 이름
    pub name: &'static str,
    /// 보호 필드
    pub protected: ProtectedFields,
}

impl TableSchema {
    pub fn new(name: &'static str, protected: ProtectedFields) -> Self {
        Self { name, protected }
    }

    /// 보호 필드가 없는 테이블은 충돌 시 덮어쓰기 upsert로 충분합니다.
    pub fn has_protected_fields(&self) -> bool {
        !self.protected.is_empty()
    }

    /// 신용융자 잔고 히스토리 (키: 날짜).
    pub fn credit_balance_history() -> Self {
        Self::new(CREDIT_BALANCE_HISTORY, ProtectedFields::none())
    }

    /// 한미 증시 상관계수 (키: 날짜 + 유형).
    pub fn market_correlations() -> Self {
        Self::new(MARKET_CORRELATIONS, ProtectedFields::none())
    }

    /// 실적 캘린더 (키: 날짜 + 심볼).
    pub fn earnings_calendar() -> Self {
        Self::new(
            EARNINGS_CALENDAR,
            ProtectedFields::of(&["eps_actual", "revenue_actual", "revenue_actual_formatted"]),
        )
    }

    /// 증시 휴장일 (키: 날짜 + 국가).
    pub fn market_holidays() -> Self {
        Self::new(MARKET_HOLIDAYS, ProtectedFields::none())
    }
}

pub const CREDIT_BALANCE_HISTORY: &str = "credit_balance_history";
pub const MARKET_CORRELATIONS: &str = "market_correlations";
pub const EARNINGS_CALENDAR: &str = "earnings_calendar";
pub const MARKET_HOLIDAYS: &str = "market_holidays";
