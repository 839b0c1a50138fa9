//! PlugLine 폴링 데몬 - 무인 계측 수집
//!
//! 시작 시 디스커버리 한 라운드를 돌리고, 이후 알려진 모든 장치를
//! 고정 주기로 폴링해 계측 레코드를 데이터 로그에 적재한다.
//! 장치별 실패는 기록만 하고 폴링은 계속된다.
//!
//! 사용법 (raw 소켓 권한 필요):
//!   sudo cargo run --release --bin plugline-daemon -- -i eth0 --datalog /var/log/plugline.tsv

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use plugline::{Config, DataLog, Engine};

/// 데몬 설정
struct DaemonConfig {
    datalog_path: Option<PathBuf>,
    poll_interval_secs: u64,
    rediscover_every: u32,
    verbose: bool,
    config: Config,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            datalog_path: None,
            poll_interval_secs: 30,
            rediscover_every: 20,
            verbose: false,
            config: Config::default(),
        }
    }
}

fn parse_args() -> DaemonConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut daemon = DaemonConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--interface" | "-i" => {
                if i + 1 < args.len() {
                    daemon.config.interface = args[i + 1].clone();
                    i += 1;
                }
            }
            "--device" | "-d" => {
                if i + 1 < args.len() {
                    let entry = args[i + 1].parse().expect("유효한 장치 항목 필요 (주소=라벨)");
                    daemon.config.devices.push(entry);
                    i += 1;
                }
            }
            "--secret" => {
                if i + 1 < args.len() {
                    daemon.config.shared_secret = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--datalog" | "-o" => {
                if i + 1 < args.len() {
                    daemon.datalog_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--interval" => {
                if i + 1 < args.len() {
                    daemon.poll_interval_secs = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--rediscover-every" => {
                if i + 1 < args.len() {
                    daemon.rediscover_every = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--verbose" | "-v" => {
                daemon.verbose = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"PlugLine Daemon - PL7667 스마트 플러그 무인 폴링

디스커버리 후 알려진 모든 장치를 고정 주기로 폴링하고
계측 레코드를 탭 구분 데이터 로그에 적재한다. CAP_NET_RAW 필요.

사용법:
  sudo cargo run --release --bin plugline-daemon -- [OPTIONS]

옵션:
  -i, --interface <IF>       바인드할 네트워크 인터페이스 (필수)
  -d, --device <ENTRY>       알려진 장치 선언, 반복 가능 (aa:bb:cc:dd:ee:ff=라벨)
  --secret <STR>             펌웨어 공유 시크릿
  -o, --datalog <PATH>       계측 레코드 파일 (append)
  --interval <SECS>          폴링 주기 (기본: 30)
  --rediscover-every <N>     N번째 폴링마다 디스커버리 재실행 (기본: 20, 0=안 함)
  -v, --verbose              debug 레벨 로그
  -h, --help                 이 도움말 출력

레코드 형식 (탭 구분):
  unix_time  장치주소  전원(0|1)  전력(W)
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    daemon
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let daemon = parse_args();

    let level = if daemon.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.to_string())),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let datalog = match &daemon.datalog_path {
        Some(path) => Some(DataLog::open(path)?),
        None => None,
    };

    let engine = Engine::start(daemon.config).await?;
    let controller = engine.controller();

    let found = engine.discover().await?;
    info!("초기 디스커버리: {}개 장치", found.len());

    let interval = Duration::from_secs(daemon.poll_interval_secs.max(1));
    let mut ticks: u32 = 0;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("종료 신호 수신");
                break;
            }
        }

        ticks += 1;
        if daemon.rediscover_every > 0 && ticks % daemon.rediscover_every == 0 {
            match engine.discover().await {
                Ok(found) => info!("재디스커버리: {}개 장치", found.len()),
                Err(e) => warn!("재디스커버리 실패: {}", e),
            }
        }

        // 장치별 실패는 기록만 하고 나머지 장치 폴링은 계속한다
        for device in engine.registry().devices() {
            match controller.get_status(device.addr).await {
                Ok(state) => {
                    info!(
                        "폴링: {} power={:?} watts={:?}",
                        device.addr, state.is_on, state.watts
                    );
                    if let Some(log) = &datalog {
                        log.log(device.addr, state.is_on, state.watts);
                    }
                }
                Err(e) => warn!("폴링 실패: {} {}", device.addr, e),
            }
        }
    }

    engine.shutdown().await;
    info!("{}", engine.stats().summary());
    Ok(())
}
