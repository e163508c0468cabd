//! 알림 허브.
//!
//! 등록된 전송기 전체로 알림을 전파합니다.

use tracing::{error, info, warn};

use crate::types::{Notification, NotificationError, NotificationResult, NotificationSender};

/// 여러 채널로 알림을 보내는 허브.
#[derive(Default)]
pub struct NotificationHub {
    senders: Vec<Box<dyn NotificationSender>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 전송기를 추가합니다.
    pub fn add_sender(&mut self, sender: Box<dyn NotificationSender>) {
        info!(sender = sender.name(), "알림 전송기 추가");
        self.senders.push(sender);
    }

    pub fn with_sender(mut self, sender: Box<dyn NotificationSender>) -> Self {
        self.add_sender(sender);
        self
    }

    /// 활성화된 전송기가 하나라도 있는지.
    pub fn has_enabled(&self) -> bool {
        self.senders.iter().any(|s| s.is_enabled())
    }

    /// 활성화된 모든 전송기로 알림을 보냅니다.
    ///
    /// 일부 채널 실패는 경고만 남기고, 전송에 성공한 채널 수를 반환합니다.
    /// 활성 채널이 모두 실패하면 에러입니다.
    pub async fn notify(&self, notification: &Notification) -> NotificationResult<usize> {
        let mut delivered = 0;
        let mut attempted = 0;
        let mut last_error = None;

        for sender in self.senders.iter().filter(|s| s.is_enabled()) {
            attempted += 1;
            match sender.send(notification).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        sender = sender.name(),
                        category = notification.category.as_str(),
                        error = %e,
                        "알림 전송 실패"
                    );
                    last_error = Some(e);
                }
            }
        }

        if attempted > 0 && delivered == 0 {
            error!(title = %notification.title, "모든 알림 채널 전송 실패");
            return Err(last_error
                .unwrap_or_else(|| NotificationError::SendFailed("알 수 없는 오류".to_string())));
        }

        Ok(delivered)
    }
}
