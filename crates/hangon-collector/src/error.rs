//! 에러 타입 정의.

use std::fmt;

use hangon_data::DataError;
use hangon_notification::NotificationError;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 저장소/데이터 소스 계층 에러
    Data(DataError),
    /// 알림 구성 에러
    Notification(NotificationError),
    /// 설정 에러
    Config(String),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(e) => write!(f, "Data error: {}", e),
            Self::Notification(e) => write!(f, "Notification error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for CollectorError {}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Data(err)
    }
}

impl From<NotificationError> for CollectorError {
    fn from(err: NotificationError) -> Self {
        Self::Notification(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
