//! 프론트엔드 캐시 무효화 훅.
//!
//! `GET {FRONTEND_URL}/api/revalidate?secret=..&path=..` (또는 `tag=`) 호출.
//! 비밀키가 없으면 호출하지 않습니다. 실패는 수집 결과에 영향을 주지 않고
//! `false`만 반환합니다.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::types::{NotificationError, NotificationResult};

pub const DEFAULT_FRONTEND_URL: &str = "https://hangon.co.kr";

/// 캐시 무효화 대상.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidateTarget<'a> {
    Path(&'a str),
    Tag(&'a str),
}

impl RevalidateTarget<'_> {
    fn query_pair(&self) -> (&'static str, &str) {
        match self {
            Self::Path(path) => ("path", path),
            Self::Tag(tag) => ("tag", tag),
        }
    }
}

/// 캐시 무효화 trait.
#[async_trait]
pub trait Revalidator: Send + Sync {
    /// 경로 캐시 무효화. 성공 시 `true`.
    async fn revalidate_path(&self, path: &str) -> bool;

    /// 태그 캐시 무효화. 성공 시 `true`.
    async fn revalidate_tag(&self, tag: &str) -> bool;
}

/// HTTP 캐시 무효화 클라이언트.
pub struct HttpRevalidator {
    client: reqwest::Client,
    frontend_url: String,
    secret: Option<String>,
}

impl HttpRevalidator {
    pub fn new(frontend_url: impl Into<String>, secret: Option<String>) -> NotificationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotificationError::InvalidConfig(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            frontend_url: frontend_url.into(),
            secret: secret.filter(|s| !s.is_empty()),
        })
    }

    /// `FRONTEND_URL`, `REVALIDATE_SECRET` 환경 변수로 생성합니다.
    pub fn from_env() -> NotificationResult<Self> {
        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string());
        Self::new(frontend_url, std::env::var("REVALIDATE_SECRET").ok())
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    async fn revalidate(&self, target: RevalidateTarget<'_>) -> bool {
        let Some(secret) = &self.secret else {
            debug!(?target, "REVALIDATE_SECRET 없음, 캐시 무효화 건너뜀");
            return false;
        };

        let url = format!("{}/api/revalidate", self.frontend_url.trim_end_matches('/'));
        let (name, value) = target.query_pair();

        match self
            .client
            .get(&url)
            .query(&[("secret", secret.as_str()), (name, value)])
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(?target, "캐시 무효화 완료");
                true
            }
            Ok(response) => {
                warn!(?target, status = %response.status(), "캐시 무효화 실패");
                false
            }
            Err(e) => {
                warn!(?target, error = %e, "캐시 무효화 요청 오류");
                false
            }
        }
    }
}

#[async_trait]
impl Revalidator for HttpRevalidator {
    async fn revalidate_path(&self, path: &str) -> bool {
        self.revalidate(RevalidateTarget::Path(path)).await
    }

    async fn revalidate_tag(&self, tag: &str) -> bool {
        self.revalidate(RevalidateTarget::Tag(tag)).await
    }
}
