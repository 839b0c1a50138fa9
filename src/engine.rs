//! 엔진 조립과 공개 명령 API
//!
//! `Engine::start`가 트랜스포트·송신 펌프·수신 루프·코어 태스크를 한 번에
//! 배선한다. 수신 루프는 디코드한 프레임을 명령 채널로 코어에 넘기고,
//! 코어는 송신을 송신 펌프 채널로 내보낸다. 호출자는 `Controller` 핸들로
//! 명령을 내리고 결과가 해소될 때까지 대기한다 (바쁜 대기 없음).

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::addr::DeviceAddr;
use crate::command;
use crate::config::Config;
use crate::correlator::{EngineCmd, EngineCore};
use crate::error::{Error, ProtocolError, Result};
use crate::frame::Frame;
use crate::registry::{Device, DeviceRegistry, DeviceState};
use crate::stats::EngineStats;
use crate::transport::RawTransport;

/// PlugLine 프로토콜 엔진
///
/// 장치 하나의 무응답이 다른 장치 작업에 영향을 주지 않는다.
/// 치명적 실패는 시작 시점의 트랜스포트 바인드뿐이다.
pub struct Engine {
    config: Config,
    local: DeviceAddr,
    registry: Arc<DeviceRegistry>,
    stats: Arc<RwLock<EngineStats>>,
    cmd_tx: mpsc::Sender<EngineCmd>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// 엔진 시작: 소켓 바인드 + 태스크 배선
    ///
    /// 인터페이스/권한 문제는 여기서 즉시 실패한다.
    pub async fn start(config: Config) -> Result<Engine> {
        config.validate()?;

        let transport = Arc::new(RawTransport::bind(&config.interface)?);
        let local = transport.local_addr();

        let registry = Arc::new(DeviceRegistry::new());
        registry.seed(&config.devices);

        let stats = Arc::new(RwLock::new(EngineStats::new()));
        let (cmd_tx, cmd_rx) = mpsc::channel(config.channel_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.channel_capacity);

        let core = EngineCore::new(
            config.clone(),
            registry.clone(),
            stats.clone(),
            outbound_tx,
            cmd_tx.clone(),
        );
        let core_task = tokio::spawn(core.run(cmd_rx));
        let send_task = tokio::spawn(send_pump(transport.clone(), outbound_rx, stats.clone()));
        let recv_task = tokio::spawn(recv_loop(transport.clone(), cmd_tx.clone(), stats.clone()));

        info!(
            "PlugLine 엔진 시작: if={} local={} devices={}",
            config.interface,
            local,
            config.devices.len()
        );

        Ok(Self {
            config,
            local,
            registry,
            stats,
            cmd_tx,
            tasks: Mutex::new(vec![core_task, send_task, recv_task]),
        })
    }

    /// 명령 핸들 (복제 가능, 태스크 간 공유용)
    pub fn controller(&self) -> Controller {
        Controller {
            config: self.config.clone(),
            local: self.local,
            registry: self.registry.clone(),
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// 장치/세션 레지스트리
    pub fn registry(&self) -> Arc<DeviceRegistry> {
        self.registry.clone()
    }

    /// 이 스테이션의 하드웨어 주소
    pub fn local_addr(&self) -> DeviceAddr {
        self.local
    }

    /// 누적 통계 스냅샷
    pub fn stats(&self) -> EngineStats {
        self.stats.read().clone()
    }

    /// 설정된 stale 임계값
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_millis(self.config.stale_after_ms)
    }

    /// 디스커버리 한 라운드 실행
    ///
    /// 브로드캐스트 한 번 후 수집 윈도우만큼 기다렸다가 스냅샷을 돌려준다.
    /// 응답이 없어도 윈도우를 넘겨 기다리지 않는다.
    pub async fn discover(&self) -> Result<Vec<Device>> {
        let txid = self.registry.next_transaction_id(DeviceAddr::BROADCAST);
        let probe = Frame::discover_request(self.local, txid);
        let bytes = Bytes::from(probe.encode()?);

        self.cmd_tx
            .send(EngineCmd::StartDiscovery { txid, frame: bytes })
            .await
            .map_err(|_| Error::EngineStopped)?;

        tokio::time::sleep(Duration::from_millis(self.config.discover_window_ms)).await;

        let (result_tx, result_rx) = oneshot::channel();
        self.cmd_tx
            .send(EngineCmd::FinishDiscovery { txid, result_tx })
            .await
            .map_err(|_| Error::EngineStopped)?;
        result_rx.await.map_err(|_| Error::EngineStopped)
    }

    /// 엔진 정지: 코어에 종료를 알리고 남은 태스크를 중단한다
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCmd::Shutdown).await;
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("PlugLine 엔진 정지");
    }
}

/// 송신 펌프: 코어의 송신 요청을 소켓으로 직렬화
async fn send_pump(
    transport: Arc<RawTransport>,
    mut outbound_rx: mpsc::Receiver<(DeviceAddr, Bytes)>,
    stats: Arc<RwLock<EngineStats>>,
) {
    while let Some((dst, bytes)) = outbound_rx.recv().await {
        match transport.send(dst, &bytes).await {
            Ok(()) => {
                stats.write().frames_sent += 1;
            }
            // fire-and-forget: 실패한 송신은 재시도 타이머가 되살린다
            Err(e) => warn!("프레임 송신 실패: dst={} {}", dst, e),
        }
    }
    debug!("송신 펌프 종료");
}

/// 수신 루프: 디코드 후 코어로 전달, 외부/손상 트래픽은 기록 후 폐기
async fn recv_loop(
    transport: Arc<RawTransport>,
    cmd_tx: mpsc::Sender<EngineCmd>,
    stats: Arc<RwLock<EngineStats>>,
) {
    loop {
        let (src, payload) = match transport.recv().await {
            Ok(received) => received,
            Err(e) => {
                warn!("수신 에러: {}", e);
                continue;
            }
        };
        stats.write().frames_received += 1;

        match Frame::decode(&payload) {
            Ok(frame) => {
                if cmd_tx.send(EngineCmd::Inbound(frame)).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                // 공유 세그먼트의 외부/손상 프레임은 호출자에게 전파하지 않는다
                stats.write().decode_failures += 1;
                debug!("디코드 실패, 프레임 폐기: src={} {}", src, e);
            }
        }
    }
    debug!("수신 루프 종료");
}

/// 장치 명령 핸들
///
/// `set_power`/`get_status`는 호출 태스크를 결과 해소까지 중단시키되
/// 다른 장치로 향하는 작업은 막지 않는다. 같은 장치로의 동시 명령은
/// 세션 슬롯으로 직렬화된다.
#[derive(Clone)]
pub struct Controller {
    config: Config,
    local: DeviceAddr,
    registry: Arc<DeviceRegistry>,
    cmd_tx: mpsc::Sender<EngineCmd>,
}

impl Controller {
    /// 전원 설정. 멱등 명령이라 타임아웃 자동 재시도가 안전하다.
    pub async fn set_power(&self, addr: DeviceAddr, on: bool) -> Result<DeviceState> {
        self.execute(addr, command::set_power(on, self.config.shared_secret.as_deref()))
            .await
    }

    /// 상태/계측 조회
    pub async fn get_status(&self, addr: DeviceAddr) -> Result<DeviceState> {
        self.execute(addr, command::query_status(self.config.shared_secret.as_deref()))
            .await
    }

    async fn execute(&self, addr: DeviceAddr, body: Bytes) -> Result<DeviceState> {
        // 장치당 미해결 요청 1개: 슬롯을 잡은 뒤에야 트랜잭션 ID를 발급한다
        let session = self.registry.session(addr);
        let _slot = session.slot.lock().await;
        let txid = session.next_txid();

        let frame = Frame::command_request(self.local, addr, txid, body);
        let bytes = Bytes::from(frame.encode()?);

        let (result_tx, result_rx) = oneshot::channel();
        self.cmd_tx
            .send(EngineCmd::Submit {
                addr,
                txid,
                frame: bytes,
                result_tx,
            })
            .await
            .map_err(|_| Error::EngineStopped)?;

        let op_deadline = Duration::from_millis(self.config.op_timeout_ms);
        let outcome = match tokio::time::timeout(op_deadline, result_rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => return Err(Error::EngineStopped),
            Err(_) => {
                // 작업 전체 시한: 요청을 취소하고 더 재시도하지 않는다
                let _ = self.cmd_tx.send(EngineCmd::Cancel { addr, txid }).await;
                return Err(ProtocolError::Timeout { addr }.into());
            }
        };

        let body = outcome.map_err(Error::Protocol)?;
        match command::parse_reply(&body) {
            Some(reply) => Ok(DeviceState::from_reply(&reply)),
            None => Err(ProtocolError::UnexpectedReply {
                addr,
                detail: format!("응답 본문 해석 불가 ({} 바이트)", body.len()),
            }
            .into()),
        }
    }
}
