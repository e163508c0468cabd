//! 모니터링 종목 상태 (소프트 삭제).
//!
//! 종목이 유니버스에서 빠져도 행을 지우지 않고 상태만 전이합니다.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 종목 상태와 전이 시각.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntityStatus {
    Active { since: DateTime<Utc> },
    Inactive { since: DateTime<Utc> },
    PendingReactivation { since: DateTime<Utc> },
}

impl EntityStatus {
    pub fn kind(&self) -> StatusKind {
        match self {
            Self::Active { .. } => StatusKind::Active,
            Self::Inactive { .. } => StatusKind::Inactive,
            Self::PendingReactivation { .. } => StatusKind::PendingReactivation,
        }
    }

    pub fn since(&self) -> DateTime<Utc> {
        match self {
            Self::Active { since } | Self::Inactive { since } | Self::PendingReactivation { since } => *since,
        }
    }

    pub fn from_parts(kind: StatusKind, since: DateTime<Utc>) -> Self {
        match kind {
            StatusKind::Active => Self::Active { since },
            StatusKind::Inactive => Self::Inactive { since },
            StatusKind::PendingReactivation => Self::PendingReactivation { since },
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// 저장소의 `status` 컬럼 값.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Active,
    Inactive,
    PendingReactivation,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::PendingReactivation => "pending_reactivation",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "pending_reactivation" => Ok(Self::PendingReactivation),
            other => Err(CoreError::InvalidValue(format!("알 수 없는 상태: {}", other))),
        }
    }
}

/// 저장된 모니터링 종목.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoredEntity {
    pub symbol: String,
    pub company_name: Option<String>,
    pub country: Option<String>,
    #[serde(flatten)]
    pub status: EntityStatus,
}

/// 유니버스 후보 종목.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniverseMember {
    pub symbol: String,
    pub company_name: Option<String>,
    pub country: String,
}

/// 멤버십 비교 결과.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipDiff {
    /// 처음 보는 종목
    pub added: Vec<UniverseMember>,
    /// 비활성 상태에서 다시 편입된 종목 (재활성화 대기로 전환)
    pub reactivated: Vec<UniverseMember>,
    /// 재활성화 대기 중 다음 실행에서도 유니버스에 남은 종목
    pub confirmed: Vec<UniverseMember>,
    /// 유니버스에서 빠진 활성 또는 대기 종목
    pub removed: Vec<String>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.reactivated.is_empty()
            && self.confirmed.is_empty()
            && self.removed.is_empty()
    }
}

/// 현재 유니버스와 저장된 종목 목록 비교.
///
/// 재편입은 두 번의 실행에 걸쳐 확정됩니다. 비활성 종목이 돌아오면
/// `PendingReactivation`이 되고, 다음 실행의 유니버스에도 있어야 `Active`가
/// 됩니다. 그 사이에 다시 빠지면 `Inactive`로 돌아갑니다.
pub fn diff_membership(universe: &[UniverseMember], stored: &[MonitoredEntity]) -> MembershipDiff {
    let stored_by_symbol: BTreeMap<&str, &MonitoredEntity> =
        stored.iter().map(|e| (e.symbol.as_str(), e)).collect();
    let universe_symbols: BTreeSet<&str> = universe.iter().map(|m| m.symbol.as_str()).collect();

    let mut diff = MembershipDiff::default();
    let mut seen = BTreeSet::new();
    for member in universe {
        if !seen.insert(member.symbol.as_str()) {
            continue;
        }
        match stored_by_symbol.get(member.symbol.as_str()).map(|e| e.status.kind()) {
            None => diff.added.push(member.clone()),
            Some(StatusKind::Inactive) => diff.reactivated.push(member.clone()),
            Some(StatusKind::PendingReactivation) => diff.confirmed.push(member.clone()),
            Some(StatusKind::Active) => {}
        }
    }

    diff.removed = stored
        .iter()
        .filter(|e| {
            e.status.kind() != StatusKind::Inactive && !universe_symbols.contains(e.symbol.as_str())
        })
        .map(|e| e.symbol.clone())
        .collect();

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(symbol: &str) -> UniverseMember {
        UniverseMember {
            symbol: symbol.into(),
            company_name: None,
            country: "US".into(),
        }
    }

    fn stored(symbol: &str, kind: StatusKind) -> MonitoredEntity {
        MonitoredEntity {
            symbol: symbol.into(),
            company_name: None,
            country: Some("US".into()),
            status: EntityStatus::from_parts(kind, Utc::now()),
        }
    }

    #[test]
    fn test_diff_added_removed_reactivated() {
        let universe = vec![member("AAPL"), member("NVDA"), member("INTC")];
        let rows = vec![
            stored("AAPL", StatusKind::Active),
            stored("MSFT", StatusKind::Active),
            stored("INTC", StatusKind::Inactive),
        ];

        let diff = diff_membership(&universe, &rows);

        assert_eq!(diff.added, vec![member("NVDA")]);
        assert_eq!(diff.reactivated, vec![member("INTC")]);
        assert_eq!(diff.removed, vec!["MSFT".to_string()]);
    }

    #[test]
    fn test_pending_rows_confirm_or_fall_back() {
        let rows = vec![
            stored("INTC", StatusKind::PendingReactivation),
            stored("AMD", StatusKind::PendingReactivation),
        ];

        let diff = diff_membership(&[member("INTC")], &rows);

        assert_eq!(diff.confirmed, vec![member("INTC")]);
        assert!(diff.reactivated.is_empty());
        assert_eq!(diff.removed, vec!["AMD".to_string()]);
    }

    #[test]
    fn test_inactive_rows_are_not_removed_twice() {
        let rows = vec![stored("INTC", StatusKind::Inactive)];
        let diff = diff_membership(&[member("AAPL")], &rows);
        assert!(diff.removed.is_empty());
    }

    #[test]
    fn test_status_kind_roundtrip() {
        for kind in [
            StatusKind::Active,
            StatusKind::Inactive,
            StatusKind::PendingReactivation,
        ] {
            assert_eq!(kind.as_str().parse::<StatusKind>().unwrap(), kind);
        }
        assert!("deleted".parse::<StatusKind>().is_err());
    }
}
