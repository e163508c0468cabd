//! 보호 필드를 유지하는 upsert 계획.
//!
//! 저장소 I/O 없이, 들어온 레코드와 기존 행을 비교하여 실제로 보낼
//! 필드만 계산합니다. 실행은 `hangon-data::upsert`가 담당합니다.

use crate::domain::record::{Payload, TimeSeriesRecord};
use crate::domain::schema::TableSchema;

/// 레코드 하나에 대한 쓰기 계획.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertPlan {
    /// 기존 행이 없음: 전체 payload 삽입
    Insert(Payload),
    /// 기존 행 존재: 보낼 필드만 담은 패치
    Update(Payload),
    /// 보낼 필드 없음
    Skip,
}

impl UpsertPlan {
    /// 쓰기 계획 계산.
    ///
    /// - 기존 행에서 이미 채워진 보호 필드는 패치에서 제외
    /// - 들어온 값이 비어 있는 보호 필드도 제외 (보내도 바뀌는 것이 없음)
    /// - 보호되지 않은 필드는 그대로 전송 (null 포함)
    pub fn for_record(
        schema: &TableSchema,
        record: &TimeSeriesRecord,
        existing: Option<&Payload>,
    ) -> Self {
        let Some(existing) = existing else {
            return Self::Insert(record.payload.clone());
        };

        let patch: Payload = record
            .payload
            .iter()
            .filter(|(field, value)| {
                if !schema.protected.contains(field) {
                    return true;
                }
                !existing.is_field_populated(field) && crate::domain::record::is_populated(value)
            })
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();

        if patch.is_empty() {
            Self::Skip
        } else {
            Self::Update(patch)
        }
    }

    /// 실제로 전송되는 payload.
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Insert(p) | Self::Update(p) => Some(p),
            Self::Skip => None,
        }
    }
}
