//! 실행 컨텍스트.
//!
//! 한 번의 실행 동안 사용할 저장소와 외부 클라이언트 핸들을 묶습니다.
//! 트래커는 전역 상태 없이 이 컨텍스트만 받습니다.

use std::sync::Arc;

use hangon_data::{
    CreditBalanceSource, Database, DatabaseConfig, EarningsProvider, GeminiClient, IndexUniverse,
    MemoryTableStore, NaverFinanceFetcher, PgTableStore, QuoteProvider, TableStore, TextGenerator,
    UniverseSource, WikipediaIndexFetcher, YahooEarningsProvider, YahooQuoteProvider,
};
use hangon_notification::{
    HttpRevalidator, NotificationHub, PushQueueSender, Revalidator, TelegramConfig, TelegramSender,
};
use tracing::{info, warn};

use crate::error::CollectorError;
use crate::{CollectorConfig, Result};

/// 트래커 실행 컨텍스트
pub struct CollectorContext {
    pub config: CollectorConfig,
    pub store: Arc<dyn TableStore>,
    pub quotes: Arc<dyn QuoteProvider>,
    pub earnings: Arc<dyn EarningsProvider>,
    pub credit_source: Arc<dyn CreditBalanceSource>,
    pub universe: Arc<dyn UniverseSource>,
    /// 텍스트 생성기 (API 키가 없으면 `None`)
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub notifier: Arc<NotificationHub>,
    pub revalidator: Arc<dyn Revalidator>,
}

impl CollectorContext {
    /// 설정으로 실제 어댑터를 구성합니다.
    ///
    /// `dry_run`이면 메모리 저장소를 쓰고 푸시 큐에 적재하지 않습니다.
    pub async fn connect(config: CollectorConfig, dry_run: bool) -> Result<Self> {
        let (store, pool): (Arc<dyn TableStore>, _) = if dry_run {
            info!("dry-run: 메모리 저장소 사용");
            (Arc::new(MemoryTableStore::new()), None)
        } else {
            let settings = config.require_database()?;
            let mut db_config = DatabaseConfig::new(settings.url.clone());
            db_config.max_connections = settings.max_connections;
            let database = Database::connect(&db_config).await?;
            let pool = database.pool().clone();
            (Arc::new(PgTableStore::new(pool.clone())), Some(pool))
        };

        let generator: Option<Arc<dyn TextGenerator>> = match &config.llm.api_key {
            Some(key) => Some(Arc::new(GeminiClient::new(key.clone(), config.llm.model.clone())?)),
            None => {
                warn!("GEMINI_API_KEY 없음, 분석 재계산과 번역 비활성화");
                None
            }
        };

        let mut hub = NotificationHub::new();
        if let Some(telegram) = TelegramConfig::from_env() {
            let telegram = telegram.with_site_url(config.notify.frontend_url.clone());
            hub.add_sender(Box::new(TelegramSender::new(telegram)));
        }
        if let Some(pool) = pool {
            hub.add_sender(Box::new(
                PushQueueSender::new(pool).with_enabled(config.notify.push_queue_enabled),
            ));
        }

        let revalidator = HttpRevalidator::new(
            config.notify.frontend_url.clone(),
            config.notify.revalidate_secret.clone(),
        )?;

        let delay = config.request_delay();
        let universe = IndexUniverse::new(
            NaverFinanceFetcher::new(delay)?,
            WikipediaIndexFetcher::new()?,
            config.universe.us_symbols.clone(),
            config.universe.kospi_top,
        );

        Ok(Self {
            store,
            quotes: Arc::new(YahooQuoteProvider::new()?),
            earnings: Arc::new(YahooEarningsProvider::new()?),
            credit_source: Arc::new(NaverFinanceFetcher::new(delay)?),
            universe: Arc::new(universe),
            generator,
            notifier: Arc::new(hub),
            revalidator: Arc::new(revalidator),
            config,
        })
    }

    /// 텍스트 생성기가 필요한 작업용 (없으면 설정 에러)
    pub fn require_generator(&self) -> Result<Arc<dyn TextGenerator>> {
        self.generator.clone().ok_or_else(|| {
            CollectorError::Config("GEMINI_API_KEY 환경변수가 설정되지 않았습니다".to_string())
        })
    }

    /// 데이터베이스 스키마 마이그레이션
    pub async fn migrate(config: &CollectorConfig) -> Result<()> {
        let settings = config.require_database()?;
        let database = Database::connect(&DatabaseConfig::new(settings.url.clone())).await?;
        database.migrate().await?;
        Ok(())
    }
}
