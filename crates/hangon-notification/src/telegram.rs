//! 텔레그램 알림 전송기.
//!
//! Telegram Bot API `sendMessage`로 운영자 채팅방에 알림을 보냅니다.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::types::{Notification, NotificationError, NotificationResult, NotificationSender};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// 텔레그램 알림 전송 설정.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// @BotFather에서 받은 봇 토큰
    pub bot_token: String,
    /// 메시지를 보낼 채팅 ID
    pub chat_id: String,
    /// 전송 활성화 여부
    pub enabled: bool,
    /// 프론트엔드 주소 (링크 생성용)
    pub site_url: Option<String>,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            enabled: true,
            site_url: None,
        }
    }

    pub fn with_site_url(mut self, site_url: impl Into<String>) -> Self {
        self.site_url = Some(site_url.into());
        self
    }

    /// 환경 변수에서 설정을 생성합니다. 토큰이나 채팅 ID가 없으면 `None`.
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").ok()?;
        let enabled = std::env::var("TELEGRAM_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);

        Some(Self {
            enabled,
            ..Self::new(bot_token, chat_id)
        })
    }
}

/// 텔레그램 알림 전송기.
pub struct TelegramSender {
    config: TelegramConfig,
    client: reqwest::Client,
    api_base: String,
}

impl TelegramSender {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// API 주소 변경 (테스트용).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn from_env() -> Option<Self> {
        TelegramConfig::from_env().map(Self::new)
    }

    /// 알림을 HTML 메시지로 포맷합니다.
    fn format_message(&self, notification: &Notification) -> String {
        let mut message = format!(
            "<b>{}</b>\n\n{}",
            escape_html(&notification.title),
            escape_html(&notification.body)
        );

        if let Some(path) = &notification.url {
            let link = match &self.config.site_url {
                Some(site) => format!("{}{}", site.trim_end_matches('/'), path),
                None => path.clone(),
            };
            message.push_str(&format!("\n\n🔗 {}", escape_html(&link)));
        }

        message
    }

    async fn send_message(&self, text: &str) -> NotificationResult<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.config.bot_token
        );

        let params = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        debug!(chat_id = %self.config.chat_id, "텔레그램 메시지 전송");

        let response = self.client.post(&url).json(&params).send().await?;

        if response.status().is_success() {
            info!("텔레그램 알림 전송 완료");
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            warn!("텔레그램 요청 한도 초과");
            return Err(NotificationError::RateLimited(60));
        }

        error!(status = %status, body = %body, "텔레그램 전송 실패");
        Err(NotificationError::SendFailed(format!("HTTP {}: {}", status, body)))
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        if !self.is_enabled() {
            debug!("텔레그램 알림 비활성화, 건너뜀");
            return Ok(());
        }

        let message = self.format_message(notification);
        self.send_message(&message).await
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.bot_token.is_empty() && !self.config.chat_id.is_empty()
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
