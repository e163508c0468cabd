//! Hangon collector CLI.

use clap::{Parser, Subcommand};
use hangon_collector::{ensure_ready, run_trackers, CollectorConfig, CollectorContext, Tracker};
use hangon_core::{init_logging, logging::format_from_env, LogConfig};

#[derive(Parser)]
#[command(name = "hangon-collector")]
#[command(about = "Hangon market data collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// 데이터베이스 대신 메모리 저장소 사용 (알림 큐 적재 안 함)
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// 신용융자 잔고 수집 및 분석
    CreditBalance,

    /// 코스피-S&P500 상관관계 수집
    Correlation,

    /// 실적 발표 일정 수집 (예상치)
    Earnings,

    /// 발표된 실적 채우기
    EarningsUpdate,

    /// 모니터링 종목 유니버스 동기화
    MonitoredStocks,

    /// 휴장일 동기화 및 알림
    Holidays,

    /// 전체 워크플로우 실행
    RunAll,

    /// 데몬 모드: 주기적으로 전체 워크플로우 실행
    Daemon,

    /// 데이터베이스 마이그레이션
    Migrate,
}

impl Commands {
    fn trackers(&self) -> Vec<Tracker> {
        match self {
            Self::CreditBalance => vec![Tracker::CreditBalance],
            Self::Correlation => vec![Tracker::Correlation],
            Self::Earnings => vec![Tracker::EarningsTracker],
            Self::EarningsUpdate => vec![Tracker::EarningsUpdater],
            Self::MonitoredStocks => vec![Tracker::MonitoredStocks],
            Self::Holidays => vec![Tracker::Holidays],
            Self::RunAll | Self::Daemon => Tracker::ALL.to_vec(),
            Self::Migrate => Vec::new(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    // 로깅 초기화
    let level = &cli.log_level;
    let directives = format!(
        "hangon_collector={level},hangon_data={level},hangon_core={level},hangon_notification={level}"
    );
    init_logging(LogConfig::new(directives).with_format(format_from_env()))?;

    tracing::info!("Hangon Data Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env();

    if let Commands::Migrate = cli.command {
        CollectorContext::migrate(&config).await?;
        return Ok(());
    }

    let ctx = CollectorContext::connect(config, cli.dry_run).await?;
    let trackers = cli.command.trackers();
    ensure_ready(&ctx, &trackers)?;

    // 명령 실행
    match cli.command {
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}분) ===",
                ctx.config.daemon.interval_minutes
            );

            let mut interval = tokio::time::interval(ctx.config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("종료 신호 수신, 데몬 종료 중...");
                        break;
                    }
                    _ = interval.tick() => {
                        tracing::info!("=== 워크플로우 실행 시작 ===");
                        run_trackers(&ctx, &trackers).await;
                        tracing::info!(
                            "=== 워크플로우 완료, 다음 실행: {}분 후 ===",
                            ctx.config.daemon.interval_minutes
                        );
                    }
                }
            }
        }
        _ => {
            tracing::info!("=== 워크플로우 시작 ===");
            let results = run_trackers(&ctx, &trackers).await;
            let failed = results.iter().filter(|(_, r)| r.is_err()).count();
            tracing::info!(failed, "=== 워크플로우 완료 ===");

            // 단일 트래커 실행은 실패를 종료 코드로 전달
            if trackers.len() == 1 {
                if let Some((_, Err(e))) = results.into_iter().next() {
                    return Err(e.into());
                }
            }
        }
    }

    tracing::info!("Hangon Data Collector 종료");
    Ok(())
}
