//! 시계열 레코드와 자연 키.
//!
//! 외부 소스에서 수집한 관측값 하나를 `(key, secondary_key)` 자연 키와
//! 이름 있는 필드 묶음(`Payload`)으로 표현합니다.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// 레코드의 자연 키.
///
/// `key`는 문자열 비교로 전순서가 정의됩니다 (ISO 날짜 `YYYY-MM-DD`는
/// 문자열 순서와 시간 순서가 일치). `secondary_key`는 심볼, 국가처럼
/// 복합 키를 구성할 때 사용합니다.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NaturalKey {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_key: Option<String>,
}

impl NaturalKey {
    /// 단일 키 (예: 날짜).
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secondary_key: None,
        }
    }

    /// 복합 키 (예: 날짜 + 심볼).
    pub fn composite(key: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secondary_key: Some(secondary.into()),
        }
    }

    /// 저장소 컬럼 값 (`secondary_key`가 없으면 빈 문자열).
    pub fn secondary_or_empty(&self) -> &str {
        self.secondary_key.as_deref().unwrap_or("")
    }

    /// 저장소 컬럼 값에서 복원 (빈 문자열은 `None`).
    pub fn from_columns(key: String, secondary: String) -> Self {
        Self {
            key,
            secondary_key: if secondary.is_empty() {
                None
            } else {
                Some(secondary)
            },
        }
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secondary_key {
            Some(secondary) => write!(f, "{}/{}", self.key, secondary),
            None => write!(f, "{}", self.key),
        }
    }
}

/// 값이 "채워진" 상태인지 판정.
///
/// `null`, 숫자 0, 빈 문자열은 아직 채울 수 있는 값으로 간주합니다.
pub fn is_populated(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// 이름 있는 필드 묶음.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// 필드가 존재하고 채워진 값인지 확인.
    pub fn is_field_populated(&self, field: &str) -> bool {
        self.0.get(field).map(is_populated).unwrap_or(false)
    }

    pub fn get_f64(&self, field: &str) -> Option<f64> {
        self.0.get(field).and_then(Value::as_f64)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// `other`의 필드로 덮어쓰기 (저장소의 부분 업데이트와 같은 의미).
    pub fn merge(&mut self, other: &Payload) {
        for (field, value) in &other.0 {
            self.0.insert(field.clone(), value.clone());
        }
    }

    /// JSON 객체로 변환.
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }

    /// JSON 객체에서 변환 (객체가 아니면 빈 payload).
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map.into_iter().collect()),
            _ => Self::default(),
        }
    }
}

impl FromIterator<(String, Value)> for Payload {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Payload {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// 자연 키로 식별되는 관측값 하나.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    #[serde(flatten)]
    pub natural_key: NaturalKey,
    pub payload: Payload,
}

impl TimeSeriesRecord {
    /// 날짜 단일 키 레코드.
    pub fn dated(key: impl Into<String>) -> Self {
        Self {
            natural_key: NaturalKey::new(key),
            payload: Payload::new(),
        }
    }

    /// 복합 키 레코드.
    pub fn composite(key: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            natural_key: NaturalKey::composite(key, secondary),
            payload: Payload::new(),
        }
    }

    /// 필드 추가 (builder).
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(field, value);
        self
    }

    pub fn key(&self) -> &str {
        &self.natural_key.key
    }
}
