//! 소스 조정(Source Reconciler).
//!
//! 새로 수집한 후보 배치를 현재 워터마크와 비교하여 신규/기존 레코드로
//! 분할합니다. 부수효과가 없는 순수 함수입니다.
//!
//! 수집 범위는 의도적으로 기존 범위와 겹치므로 (늦게 도착하거나 정정된
//! 데이터 대응), 워터마크와 같은 키는 이미 수집된 것으로 보고 신규에서
//! 제외합니다.

use std::collections::BTreeMap;

use crate::domain::record::{NaturalKey, TimeSeriesRecord};

/// 조정 결과 구분.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// 후보가 하나도 없음 (소스가 빈 결과를 반환)
    SourceEmpty,
    /// 후보는 있으나 모두 이미 수집됨
    NothingNew,
    /// 신규 레코드 N건
    NewRecords(usize),
}

/// 배치 분할 결과.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// 워터마크보다 큰 키의 레코드 (키 오름차순)
    pub new_records: Vec<TimeSeriesRecord>,
    /// 워터마크 이하 키의 레코드 (보호 필드 채우기용)
    pub known_records: Vec<TimeSeriesRecord>,
    /// 조정 후 워터마크
    pub next_watermark: Option<String>,
    pub outcome: ReconcileOutcome,
}

impl Reconciliation {
    pub fn has_new(&self) -> bool {
        !self.new_records.is_empty()
    }
}

/// 후보 배치를 워터마크 기준으로 분할.
///
/// 같은 자연 키가 배치 안에 여러 번 나오면 마지막 항목만 남깁니다.
pub fn reconcile(
    existing_max_key: Option<&str>,
    candidates: Vec<TimeSeriesRecord>,
) -> Reconciliation {
    if candidates.is_empty() {
        return Reconciliation {
            new_records: Vec::new(),
            known_records: Vec::new(),
            next_watermark: existing_max_key.map(str::to_string),
            outcome: ReconcileOutcome::SourceEmpty,
        };
    }

    let mut unique: BTreeMap<NaturalKey, TimeSeriesRecord> = BTreeMap::new();
    for record in candidates {
        unique.insert(record.natural_key.clone(), record);
    }

    let mut new_records = Vec::new();
    let mut known_records = Vec::new();
    for record in unique.into_values() {
        let is_new = match existing_max_key {
            None => true,
            Some(watermark) => record.key() > watermark,
        };
        if is_new {
            new_records.push(record);
        } else {
            known_records.push(record);
        }
    }

    let candidate_max = new_records
        .iter()
        .chain(known_records.iter())
        .map(|r| r.key())
        .max();
    let next_watermark = match (existing_max_key, candidate_max) {
        (Some(existing), Some(candidate)) => Some(existing.max(candidate).to_string()),
        (Some(existing), None) => Some(existing.to_string()),
        (None, candidate) => candidate.map(str::to_string),
    };

    let outcome = if new_records.is_empty() {
        ReconcileOutcome::NothingNew
    } else {
        ReconcileOutcome::NewRecords(new_records.len())
    };

    Reconciliation {
        new_records,
        known_records,
        next_watermark,
        outcome,
    }
}
