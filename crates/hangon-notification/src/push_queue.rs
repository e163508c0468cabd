//! 웹 푸시 발송 큐.
//!
//! 알림을 `notification_queue` 테이블에 적재하면 프론트엔드 쪽 발송기가
//! 구독자에게 푸시를 보냅니다.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::types::{Notification, NotificationResult, NotificationSender};

/// `notification_queue` 적재 전송기.
pub struct PushQueueSender {
    pool: PgPool,
    enabled: bool,
}

impl PushQueueSender {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            enabled: true,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[async_trait]
impl NotificationSender for PushQueueSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        debug!(category = notification.category.as_str(), "푸시 큐 적재");

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO notification_queue (title, body, url, category, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.url)
        .bind(notification.category.as_str())
        .bind(notification.timestamp)
        .fetch_one(&self.pool)
        .await?;

        info!(id, category = notification.category.as_str(), "푸시 알림 큐 등록");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "push_queue"
    }
}
