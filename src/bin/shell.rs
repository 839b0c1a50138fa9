//! PlugLine 대화형 셸 - Asoka PL7667 스마트 플러그 제어
//!
//! raw Ethernet 링크 계층 프로토콜 엔진 위의 운영자 REPL
//! - 디스커버리 / 전원 제어 / 상태 조회 / 일괄 폴링
//! - 프로토콜 로직은 전부 엔진에 있고 셸은 결과를 표시만 한다
//!
//! 사용법 (raw 소켓 권한 필요):
//!   sudo cargo run --release --bin plugline-shell -- --interface eth0
//!
//! 예시:
//!   sudo cargo run --release --bin plugline-shell -- -i eth0 -d 00:b0:52:01:02:03=거실

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use plugline::{Config, Device, Engine, Error, ProtocolError};

/// 셸 설정
struct ShellConfig {
    verbose: bool,
    config: Config,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            config: Config::default(),
        }
    }
}

fn parse_args() -> ShellConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut shell = ShellConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--interface" | "-i" => {
                if i + 1 < args.len() {
                    shell.config.interface = args[i + 1].clone();
                    i += 1;
                }
            }
            "--device" | "-d" => {
                if i + 1 < args.len() {
                    let entry = args[i + 1].parse().expect("유효한 장치 항목 필요 (주소=라벨)");
                    shell.config.devices.push(entry);
                    i += 1;
                }
            }
            "--secret" => {
                if i + 1 < args.len() {
                    shell.config.shared_secret = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--window-ms" => {
                if i + 1 < args.len() {
                    shell.config.discover_window_ms =
                        args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--retries" => {
                if i + 1 < args.len() {
                    shell.config.max_retries = args[i + 1].parse().expect("유효한 숫자 필요");
                    i += 1;
                }
            }
            "--fast" => {
                let interface = shell.config.interface.clone();
                let devices = std::mem::take(&mut shell.config.devices);
                shell.config = Config::fast_lan(interface);
                shell.config.devices = devices;
            }
            "--lossy" => {
                let interface = shell.config.interface.clone();
                let devices = std::mem::take(&mut shell.config.devices);
                shell.config = Config::lossy_segment(interface);
                shell.config.devices = devices;
            }
            "--verbose" | "-v" => {
                shell.verbose = true;
            }
            "--help" | "-h" => {
                println!(
                    r#"PlugLine Shell - Asoka PL7667 스마트 플러그 대화형 제어

raw Ethernet(IP 없음) 링크 계층 프로토콜로 로컬 세그먼트의
PL7667-ETH / PL7667-SW 플러그를 제어한다. CAP_NET_RAW 권한 필요.

사용법:
  sudo cargo run --release --bin plugline-shell -- [OPTIONS]

옵션:
  -i, --interface <IF>   바인드할 네트워크 인터페이스 (필수)
  -d, --device <ENTRY>   알려진 장치 선언, 반복 가능 (aa:bb:cc:dd:ee:ff=라벨)
  --secret <STR>         펌웨어 공유 시크릿 (요구하는 경우만)
  --window-ms <MS>       디스커버리 수집 윈도우 (기본: 2000)
  --retries <N>          요청당 최대 재시도 횟수 (기본: 3)
  --fast                 유선 LAN 프리셋 (짧은 마감시한)
  --lossy                손실 잦은 세그먼트 프리셋 (긴 마감시한)
  -v, --verbose          debug 레벨 로그
  -h, --help             이 도움말 출력

셸 명령:
  discover               브로드캐스트 열거 실행
  list                   알려진 장치 목록
  on <장치>              전원 켜기 (목록 번호 또는 주소)
  off <장치>             전원 끄기
  status <장치>          상태/계측 조회
  poll                   모든 장치 상태 조회 (장치별 에러, 중단 없음)
  stats                  엔진 통계
  quit                   종료
"#
                );
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    shell
}

/// 목록 번호(1부터) 또는 하드웨어 주소로 장치 지정
fn resolve_device(arg: &str, listing: &[Device]) -> Option<plugline::DeviceAddr> {
    if let Ok(index) = arg.parse::<usize>() {
        return listing.get(index.checked_sub(1)?).map(|d| d.addr);
    }
    arg.parse().ok()
}

fn print_listing(listing: &[Device], stale_after: std::time::Duration) {
    if listing.is_empty() {
        println!("알려진 장치 없음 (discover를 실행하세요)");
        return;
    }
    for (i, device) in listing.iter().enumerate() {
        let power = match device.state.is_on {
            Some(true) => "ON ",
            Some(false) => "OFF",
            None => "?  ",
        };
        let watts = match device.state.watts {
            Some(w) => format!("{:6.1}W", w),
            None => "      -".to_string(),
        };
        let model = match device.state.model {
            Some(m) => m.to_string(),
            None => "?".to_string(),
        };
        let stale = if device.is_stale(stale_after) { " [stale]" } else { "" };
        println!(
            "{:3}. {}  {}  {} {}  {}{}",
            i + 1,
            device.addr,
            power,
            watts,
            model,
            device.display_name(),
            stale,
        );
    }
}

fn describe_error(err: &Error) -> String {
    match err {
        Error::Protocol(ProtocolError::RetriesExhausted { attempts, .. }) => {
            format!("응답 없음 ({}회 재시도 후 포기)", attempts)
        }
        Error::Protocol(ProtocolError::Timeout { .. }) => "작업 시한 초과".to_string(),
        Error::Protocol(ProtocolError::DeviceRejected { reason, .. }) => {
            format!("장치 거부: {}", reason)
        }
        other => other.to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let shell = parse_args();

    // 로깅 설정 (RUST_LOG가 있으면 우선)
    let level = if shell.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.to_string())),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let stale_after = std::time::Duration::from_millis(shell.config.stale_after_ms);
    let interface = shell.config.interface.clone();
    let engine = Engine::start(shell.config).await?;
    let controller = engine.controller();

    println!(
        "PlugLine Shell / if={} local={} known={} (help: 명령 목록)",
        interface,
        engine.local_addr(),
        engine.registry().len()
    );

    let mut listing: Vec<Device> = engine.registry().devices();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("plugline> ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let mut words = line.split_whitespace();
        let command = match words.next() {
            Some(word) => word,
            None => continue,
        };

        match (command, words.next()) {
            ("discover", _) => match engine.discover().await {
                Ok(devices) => {
                    println!("{}개 장치 발견", devices.len());
                    listing = engine.registry().devices();
                    print_listing(&listing, stale_after);
                }
                Err(e) => println!("디스커버리 실패: {}", e),
            },
            ("list", _) => {
                listing = engine.registry().devices();
                print_listing(&listing, stale_after);
            }
            ("on", Some(arg)) | ("off", Some(arg)) => {
                let on = command == "on";
                match resolve_device(arg, &listing) {
                    Some(addr) => match controller.set_power(addr, on).await {
                        Ok(state) => println!(
                            "{} → {}",
                            addr,
                            if state.is_on == Some(true) { "ON" } else { "OFF" }
                        ),
                        Err(e) => println!("{}: {}", addr, describe_error(&e)),
                    },
                    None => println!("장치를 찾을 수 없음: {}", arg),
                }
            }
            ("status", Some(arg)) => match resolve_device(arg, &listing) {
                Some(addr) => match controller.get_status(addr).await {
                    Ok(state) => {
                        println!(
                            "{}: power={:?} watts={:?} model={:?}",
                            addr, state.is_on, state.watts, state.model
                        );
                    }
                    Err(e) => println!("{}: {}", addr, describe_error(&e)),
                },
                None => println!("장치를 찾을 수 없음: {}", arg),
            },
            ("on", None) | ("off", None) | ("status", None) => {
                println!("장치를 지정하세요 (목록 번호 또는 주소)");
            }
            ("poll", _) => {
                // 일괄 폴링: 장치별로 에러를 보고하되 전체를 중단하지 않는다
                listing = engine.registry().devices();
                for device in &listing {
                    match controller.get_status(device.addr).await {
                        Ok(state) => println!(
                            "{} ({}): power={:?} watts={:?}",
                            device.addr,
                            device.display_name(),
                            state.is_on,
                            state.watts
                        ),
                        Err(e) => {
                            warn!("폴링 실패: {}", device.addr);
                            println!(
                                "{} ({}): {}",
                                device.addr,
                                device.display_name(),
                                describe_error(&e)
                            );
                        }
                    }
                }
                listing = engine.registry().devices();
            }
            ("stats", _) => println!("{}", engine.stats().summary()),
            ("help", _) => println!(
                "명령: discover | list | on <장치> | off <장치> | status <장치> | poll | stats | quit"
            ),
            ("quit", _) | ("exit", _) => break,
            _ => println!("알 수 없는 명령: {} (help 참고)", command),
        }
    }

    engine.shutdown().await;
    println!("{}", engine.stats().summary());
    Ok(())
}
