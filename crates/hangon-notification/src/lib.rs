//! # Hangon Notification
//!
//! 수집 결과 알림 및 프론트엔드 캐시 무효화.
//!
//! 지원 채널:
//! - Telegram (운영자 채팅방)
//! - 웹 푸시 큐 (`notification_queue` 테이블)

pub mod hub;
pub mod push_queue;
pub mod revalidate;
pub mod telegram;
pub mod types;

pub use hub::*;
pub use push_queue::*;
pub use revalidate::*;
pub use telegram::*;
pub use types::*;
