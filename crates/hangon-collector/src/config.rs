//! 환경변수 기반 설정 모듈.

use crate::error::CollectorError;
use crate::Result;
use std::time::Duration;

pub const DEFAULT_FALLBACK_SYMBOLS: &str = "AAPL,MSFT,NVDA,005930.KS,000660.KS";
pub const DEFAULT_FRONTEND_URL: &str = "https://hangon.co.kr";

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 설정 (`--dry-run`이면 없어도 됨)
    pub database: Option<DatabaseSettings>,
    /// LLM 설정
    pub llm: LlmConfig,
    /// 신용융자 잔고 수집 설정
    pub credit_balance: CreditBalanceConfig,
    /// 시장 상관관계 수집 설정
    pub correlation: CorrelationConfig,
    /// 실적 발표 수집 설정
    pub earnings: EarningsConfig,
    /// 모니터링 유니버스 설정
    pub universe: UniverseConfig,
    /// 휴장일 설정
    pub holidays: HolidayConfig,
    /// 알림/캐시 무효화 설정
    pub notify: NotifyConfig,
    /// 소스 요청 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

/// LLM 설정
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Gemini API 키 (없으면 분석 재계산 불가)
    pub api_key: Option<String>,
    pub model: String,
    /// 호출 최대 횟수
    pub max_attempts: u32,
}

/// 신용융자 잔고 수집 설정
#[derive(Debug, Clone)]
pub struct CreditBalanceConfig {
    /// 워터마크가 없을 때 수집할 페이지 수
    pub backfill_pages: u32,
    /// 평상시 수집할 페이지 수
    pub incremental_pages: u32,
    /// 분석 프롬프트에 넣을 행 수
    pub context_rows: usize,
}

/// 시장 상관관계 수집 설정
#[derive(Debug, Clone)]
pub struct CorrelationConfig {
    /// 워터마크가 없을 때 저장할 행 수
    pub backfill_days: u32,
    /// 평상시 저장할 행 수
    pub incremental_days: u32,
    /// 지수 히스토리 조회 기간 (달력 기준 일수)
    pub history_days: u32,
    /// 이동 상관계수 창 크기
    pub window: usize,
}

/// 실적 발표 수집 설정
#[derive(Debug, Clone)]
pub struct EarningsConfig {
    /// 모니터링 종목이 없을 때 사용할 종목
    pub fallback_symbols: Vec<String>,
    /// 종목당 최대 발표 일정 수
    pub max_events_per_symbol: usize,
    /// 분기 매칭 허용 일수
    pub quarter_window_days: i64,
    /// logo.dev 공개 토큰
    pub logodev_key: Option<String>,
}

/// 모니터링 유니버스 설정
#[derive(Debug, Clone)]
pub struct UniverseConfig {
    /// 고정 미국 종목 (비어 있으면 S&P 100 구성 종목)
    pub us_symbols: Vec<String>,
    /// 코스피 시가총액 상위 N
    pub kospi_top: usize,
}

/// 휴장일 설정
#[derive(Debug, Clone)]
pub struct HolidayConfig {
    /// 휴장일 TOML 파일 경로
    pub file: String,
}

/// 알림/캐시 무효화 설정
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub frontend_url: String,
    pub revalidate_secret: Option<String>,
    /// `notification_queue` 적재 여부
    pub push_queue_enabled: bool,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 워크플로우 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함)
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 키 조회 함수로 설정 생성
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = var("DATABASE_URL").map(|url| DatabaseSettings {
            url,
            max_connections: parse_or(var("DATABASE_MAX_CONNECTIONS"), 5),
        });

        Self {
            database,
            llm: LlmConfig {
                api_key: var("GEMINI_API_KEY"),
                model: var("GEMINI_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string()),
                max_attempts: parse_or(var("LLM_MAX_ATTEMPTS"), 3u32).max(1),
            },
            credit_balance: CreditBalanceConfig {
                backfill_pages: parse_or(var("CREDIT_BACKFILL_PAGES"), 15),
                incremental_pages: parse_or(var("CREDIT_INCREMENTAL_PAGES"), 1),
                context_rows: parse_or(var("CREDIT_CONTEXT_ROWS"), 30_usize).max(1),
            },
            correlation: CorrelationConfig {
                backfill_days: parse_or(var("CORRELATION_BACKFILL_DAYS"), 60),
                incremental_days: parse_or(var("CORRELATION_INCREMENTAL_DAYS"), 5),
                history_days: parse_or(var("CORRELATION_HISTORY_DAYS"), 100),
                window: 20,
            },
            earnings: EarningsConfig {
                fallback_symbols: split_list(
                    &var("EARNINGS_FALLBACK_SYMBOLS").unwrap_or_else(|| DEFAULT_FALLBACK_SYMBOLS.to_string()),
                ),
                max_events_per_symbol: 8,
                quarter_window_days: hangon_core::DEFAULT_QUARTER_WINDOW_DAYS,
                logodev_key: var("LOGODEV_PUBLISHABLE_KEY"),
            },
            universe: UniverseConfig {
                us_symbols: var("UNIVERSE_US_SYMBOLS")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
                kospi_top: parse_or(var("UNIVERSE_KOSPI_TOP"), 50),
            },
            holidays: HolidayConfig {
                file: var("HOLIDAYS_FILE").unwrap_or_else(|| "holidays.toml".to_string()),
            },
            notify: NotifyConfig {
                frontend_url: var("FRONTEND_URL").unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
                revalidate_secret: var("REVALIDATE_SECRET"),
                push_queue_enabled: bool_or(var("PUSH_QUEUE_ENABLED"), true),
            },
            request_delay_ms: parse_or(var("REQUEST_DELAY_MS"), 500),
            daemon: DaemonConfig {
                interval_minutes: parse_or(var("DAEMON_INTERVAL_MINUTES"), 60),
            },
        }
    }

    /// 데이터베이스 설정 (없으면 설정 에러)
    pub fn require_database(&self) -> Result<&DatabaseSettings> {
        self.database.as_ref().ok_or_else(|| {
            CollectorError::Config("DATABASE_URL 환경변수가 설정되지 않았습니다".to_string())
        })
    }

    /// 소스 요청 간 딜레이를 Duration으로 반환
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl DaemonConfig {
    /// 워크플로우 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }
}

/// 값 파싱 (실패 시 기본값 사용)
fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// bool 값 파싱
fn bool_or(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

/// 쉼표 구분 목록
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
