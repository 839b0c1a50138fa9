//! 요청 상관기 (프로토콜 코어 상태 머신)
//!
//! 미해결 요청을 (장치 주소, 트랜잭션 ID)로 관리하고 수신 프레임을
//! 타입별로 분배한다. 요청별 상태 전이:
//! `Sent → (Matched | TimedOut → Retried → Sent | RetriesExhausted | Cancelled)`
//!
//! 모든 상태는 단일 태스크(`EngineCore::run`)가 소유하고 명령 채널로만
//! 접근하므로 매칭 경로에 락이 없다. 시도별 마감시한은 요청마다 띄우는
//! 타이머 태스크가 같은 명령 채널로 되돌려 보내며, 매칭/취소 시 중단해
//! 타이머가 누수되지 않는다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::addr::DeviceAddr;
use crate::command;
use crate::config::Config;
use crate::discovery::DiscoveryRound;
use crate::error::ProtocolError;
use crate::frame::{Frame, FrameType};
use crate::registry::{Device, DeviceRegistry, DeviceState};
use crate::stats::EngineStats;

/// 명령 요청의 최종 결과: 응답 본문 또는 프로토콜 에러
pub(crate) type CommandOutcome = std::result::Result<Bytes, ProtocolError>;

/// 엔진 코어 명령
pub(crate) enum EngineCmd {
    /// 인코드된 요청 제출 (송신 + 마감시한 등록)
    Submit {
        addr: DeviceAddr,
        txid: u16,
        frame: Bytes,
        result_tx: oneshot::Sender<CommandOutcome>,
    },

    /// 수신 루프가 디코드한 프레임
    Inbound(Frame),

    /// 시도 마감시한 도래 (타이머 태스크 발신)
    Deadline {
        addr: DeviceAddr,
        txid: u16,
        attempt: u32,
    },

    /// 호출자 취소 (작업 전체 시한 초과)
    Cancel { addr: DeviceAddr, txid: u16 },

    /// 디스커버리 라운드 시작 (브로드캐스트 송신 포함)
    StartDiscovery { txid: u16, frame: Bytes },

    /// 디스커버리 윈도우 종료, 스냅샷 반환
    FinishDiscovery {
        txid: u16,
        result_tx: oneshot::Sender<Vec<Device>>,
    },

    /// 엔진 정지
    Shutdown,
}

/// 미해결 요청
struct PendingRequest {
    /// 인코드된 요청 프레임 (재전송 시 그대로 다시 송신)
    frame: Bytes,

    /// 지금까지의 재시도 횟수
    attempt: u32,

    /// 호출자 결과 채널
    result_tx: oneshot::Sender<CommandOutcome>,

    /// 현재 시도의 마감시한 타이머
    timer: JoinHandle<()>,
}

/// 엔진 코어 상태 (단일 태스크에서만 접근)
pub(crate) struct EngineCore {
    config: Config,
    pending: HashMap<(DeviceAddr, u16), PendingRequest>,
    rounds: HashMap<u16, DiscoveryRound>,
    registry: Arc<DeviceRegistry>,
    stats: Arc<RwLock<EngineStats>>,
    outbound_tx: mpsc::Sender<(DeviceAddr, Bytes)>,
    cmd_tx: mpsc::Sender<EngineCmd>,
}

impl EngineCore {
    pub(crate) fn new(
        config: Config,
        registry: Arc<DeviceRegistry>,
        stats: Arc<RwLock<EngineStats>>,
        outbound_tx: mpsc::Sender<(DeviceAddr, Bytes)>,
        cmd_tx: mpsc::Sender<EngineCmd>,
    ) -> Self {
        Self {
            config,
            pending: HashMap::new(),
            rounds: HashMap::new(),
            registry,
            stats,
            outbound_tx,
            cmd_tx,
        }
    }

    /// 명령 루프. Shutdown 또는 채널 종료 시 반환한다.
    pub(crate) async fn run(mut self, mut cmd_rx: mpsc::Receiver<EngineCmd>) {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                EngineCmd::Submit {
                    addr,
                    txid,
                    frame,
                    result_tx,
                } => {
                    self.handle_submit(addr, txid, frame, result_tx).await;
                }
                EngineCmd::Inbound(frame) => {
                    self.handle_inbound(frame).await;
                }
                EngineCmd::Deadline {
                    addr,
                    txid,
                    attempt,
                } => {
                    self.handle_deadline(addr, txid, attempt).await;
                }
                EngineCmd::Cancel { addr, txid } => {
                    self.handle_cancel(addr, txid);
                }
                EngineCmd::StartDiscovery { txid, frame } => {
                    self.handle_start_discovery(txid, frame).await;
                }
                EngineCmd::FinishDiscovery { txid, result_tx } => {
                    self.handle_finish_discovery(txid, result_tx);
                }
                EngineCmd::Shutdown => {
                    break;
                }
            }
        }

        // 남은 타이머 중단, 대기 중인 호출자는 채널 종료로 해제
        for (_, pending) in self.pending.drain() {
            pending.timer.abort();
        }
        self.rounds.clear();
        info!("엔진 코어 정지");
    }

    /// 시도 n의 마감시한: base × 2^n, 상한 retry_max_ms
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        let ms = self
            .config
            .retry_base_ms
            .saturating_mul(factor)
            .min(self.config.retry_max_ms);
        Duration::from_millis(ms)
    }

    /// 마감시한 타이머 태스크 생성
    fn spawn_deadline(&self, addr: DeviceAddr, txid: u16, attempt: u32) -> JoinHandle<()> {
        let delay = self.backoff_delay(attempt);
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = cmd_tx
                .send(EngineCmd::Deadline {
                    addr,
                    txid,
                    attempt,
                })
                .await;
        })
    }

    async fn handle_submit(
        &mut self,
        addr: DeviceAddr,
        txid: u16,
        frame: Bytes,
        result_tx: oneshot::Sender<CommandOutcome>,
    ) {
        if self.outbound_tx.send((addr, frame.clone())).await.is_err() {
            // 송신 경로가 닫혔으면 호출자도 채널 종료로 해제된다
            warn!("송신 채널 닫힘: {} txid={}", addr, txid);
            return;
        }

        let timer = self.spawn_deadline(addr, txid, 0);
        self.pending.insert(
            (addr, txid),
            PendingRequest {
                frame,
                attempt: 0,
                result_tx,
                timer,
            },
        );

        let mut stats = self.stats.write();
        stats.requests_submitted += 1;
        debug!("요청 제출: {} txid={}", addr, txid);
    }

    async fn handle_deadline(&mut self, addr: DeviceAddr, txid: u16, attempt: u32) {
        let key = (addr, txid);
        match self.pending.get(&key) {
            // 이미 매칭/취소됐거나 재시도가 타이머를 앞질렀으면 무시
            None => return,
            Some(pending) if pending.attempt != attempt => return,
            Some(_) => {}
        }

        if attempt >= self.config.max_retries {
            let pending = self.pending.remove(&key).expect("checked above");
            pending.timer.abort();
            self.stats.write().retries_exhausted += 1;
            warn!(
                "재시도 소진: {} txid={} attempts={}",
                addr, txid, attempt
            );
            let _ = pending.result_tx.send(Err(ProtocolError::RetriesExhausted {
                addr,
                attempts: attempt,
            }));
            return;
        }

        // 동일한 프레임을 그대로 재전송하고 마감시한을 새로 건다
        let next_attempt = attempt + 1;
        let frame = {
            let pending = self.pending.get_mut(&key).expect("checked above");
            pending.attempt = next_attempt;
            pending.frame.clone()
        };

        if self.outbound_tx.send((addr, frame)).await.is_err() {
            warn!("재전송 실패 (송신 채널 닫힘): {} txid={}", addr, txid);
            self.pending.remove(&key).map(|p| p.timer.abort());
            return;
        }

        self.stats.write().retries += 1;
        debug!(
            "재전송: {} txid={} attempt={}/{}",
            addr, txid, next_attempt, self.config.max_retries
        );

        let timer = self.spawn_deadline(addr, txid, next_attempt);
        if let Some(pending) = self.pending.get_mut(&key) {
            pending.timer = timer;
        }
    }

    async fn handle_inbound(&mut self, frame: Frame) {
        match frame.header.frame_type {
            FrameType::CommandReply => self.handle_reply(frame, false),
            FrameType::Error => self.handle_reply(frame, true),
            FrameType::DiscoverReply => self.handle_discover_reply(frame),
            // 세그먼트에 엔진이 둘 이상 돌면 남의 요청도 보인다
            FrameType::DiscoverRequest | FrameType::CommandRequest => {
                debug!(
                    "요청 프레임 무시: type={:?} src={}",
                    frame.header.frame_type, frame.header.src
                );
            }
        }
    }

    /// CommandReply/Error 프레임을 미해결 요청에 매칭
    fn handle_reply(&mut self, frame: Frame, is_rejection: bool) {
        let src = frame.header.src;
        let txid = frame.header.txid;

        let pending = match self.pending.remove(&(src, txid)) {
            Some(pending) => pending,
            None => {
                // 지연 중복, 소진 후 도착, 비요청 통지: 기록만 하고 폐기
                self.stats.write().unmatched_replies += 1;
                debug!("매칭 없는 응답 폐기: src={} txid={}", src, txid);
                return;
            }
        };
        pending.timer.abort();

        if is_rejection {
            let reason = command::parse_rejection(&frame.body);
            self.stats.write().rejections += 1;
            warn!("장치 거부: {} txid={} {}", src, txid, reason);
            let _ = pending.result_tx.send(Err(ProtocolError::DeviceRejected {
                addr: src,
                reason,
            }));
            return;
        }

        // 해석 가능한 응답만 레지스트리에 반영한다
        if let Some(reply) = command::parse_reply(&frame.body) {
            self.registry
                .record_seen(src, DeviceState::from_reply(&reply));
        }

        let mut stats = self.stats.write();
        stats.replies_matched += 1;
        stats.last_reply_time = Some(std::time::Instant::now());
        drop(stats);

        debug!("응답 매칭: src={} txid={}", src, txid);
        let _ = pending.result_tx.send(Ok(frame.body));
    }

    fn handle_discover_reply(&mut self, frame: Frame) {
        let src = frame.header.src;
        self.stats.write().discover_replies += 1;

        let round = match self.rounds.get_mut(&frame.header.txid) {
            Some(round) => round,
            None => {
                // 윈도우가 끝난 뒤 도착한 응답
                self.stats.write().unmatched_replies += 1;
                debug!("라운드 없는 디스커버리 응답 폐기: src={}", src);
                return;
            }
        };

        let state = match command::parse_reply(&frame.body) {
            Some(command::ReplyBody::Meter(report)) => DeviceState::from(&report),
            _ => {
                debug!("디스커버리 응답 본문 해석 실패: src={}", src);
                return;
            }
        };

        if round.record(src) {
            debug!("장치 발견: {}", src);
        }
        self.registry.record_seen(src, state);
    }

    fn handle_cancel(&mut self, addr: DeviceAddr, txid: u16) {
        // 이미 해소된 요청의 취소는 정상 경합이므로 무시
        if let Some(pending) = self.pending.remove(&(addr, txid)) {
            pending.timer.abort();
            self.stats.write().cancelled += 1;
            debug!("요청 취소: {} txid={}", addr, txid);
        }
    }

    async fn handle_start_discovery(&mut self, txid: u16, frame: Bytes) {
        if self
            .outbound_tx
            .send((DeviceAddr::BROADCAST, frame))
            .await
            .is_err()
        {
            warn!("디스커버리 브로드캐스트 실패 (송신 채널 닫힘)");
        }
        self.stats.write().discover_rounds += 1;
        self.rounds.insert(txid, DiscoveryRound::new(txid));
        info!("디스커버리 시작: txid={}", txid);
    }

    fn handle_finish_discovery(&mut self, txid: u16, result_tx: oneshot::Sender<Vec<Device>>) {
        let devices = match self.rounds.remove(&txid) {
            Some(round) => {
                info!(
                    "디스커버리 완료: {} 장치 / {} 응답 ({:.0}ms 윈도우)",
                    round.unique_count(),
                    round.reply_count(),
                    round.elapsed().as_secs_f64() * 1000.0
                );
                round.snapshot(&self.registry)
            }
            None => Vec::new(),
        };
        let _ = result_tx.send(devices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MeterReport;

    fn addr(last: u8) -> DeviceAddr {
        DeviceAddr::new([0x00, 0xB0, 0x52, 0x00, 0x00, last])
    }

    fn local() -> DeviceAddr {
        DeviceAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01])
    }

    fn test_config() -> Config {
        Config {
            interface: "test0".into(),
            retry_base_ms: 10,
            retry_max_ms: 40,
            max_retries: 3,
            ..Config::default()
        }
    }

    struct TestRig {
        cmd_tx: mpsc::Sender<EngineCmd>,
        outbound_rx: mpsc::Receiver<(DeviceAddr, Bytes)>,
        registry: Arc<DeviceRegistry>,
        stats: Arc<RwLock<EngineStats>>,
    }

    fn spawn_core(config: Config) -> TestRig {
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (outbound_tx, outbound_rx) = mpsc::channel(64);
        let registry = Arc::new(DeviceRegistry::new());
        let stats = Arc::new(RwLock::new(EngineStats::new()));
        let core = EngineCore::new(
            config,
            registry.clone(),
            stats.clone(),
            outbound_tx,
            cmd_tx.clone(),
        );
        tokio::spawn(core.run(cmd_rx));
        TestRig {
            cmd_tx,
            outbound_rx,
            registry,
            stats,
        }
    }

    async fn submit(
        rig: &TestRig,
        dst: DeviceAddr,
        txid: u16,
    ) -> oneshot::Receiver<CommandOutcome> {
        let frame = Frame::command_request(local(), dst, txid, command::set_power(true, None));
        let (result_tx, result_rx) = oneshot::channel();
        rig.cmd_tx
            .send(EngineCmd::Submit {
                addr: dst,
                txid,
                frame: Bytes::from(frame.encode().unwrap()),
                result_tx,
            })
            .await
            .unwrap();
        result_rx
    }

    #[tokio::test]
    async fn test_submit_matches_reply() {
        let mut rig = spawn_core(test_config());
        let result_rx = submit(&rig, addr(1), 5).await;

        let (dst, _bytes) = rig.outbound_rx.recv().await.unwrap();
        assert_eq!(dst, addr(1));

        let reply = Frame::command_reply(addr(1), local(), 5, command::power_ack(true));
        rig.cmd_tx.send(EngineCmd::Inbound(reply)).await.unwrap();

        let body = result_rx.await.unwrap().unwrap();
        assert_eq!(command::parse_reply(&body), Some(command::ReplyBody::PowerAck { is_on: true }));

        // 매칭된 응답은 레지스트리에 반영된다
        let device = rig.registry.get(addr(1)).unwrap();
        assert_eq!(device.state.is_on, Some(true));
        assert!(device.last_seen.is_some());
        assert_eq!(rig.stats.read().replies_matched, 1);
    }

    #[tokio::test]
    async fn test_mismatched_reply_never_resolves() {
        let mut rig = spawn_core(test_config());
        let mut result_rx = submit(&rig, addr(1), 5).await;
        rig.outbound_rx.recv().await.unwrap();

        // 다른 장치에서 온 같은 txid, 같은 장치의 다른 txid 모두 매칭 금지
        let wrong_src = Frame::command_reply(addr(2), local(), 5, command::power_ack(true));
        let wrong_txid = Frame::command_reply(addr(1), local(), 6, command::power_ack(true));
        rig.cmd_tx.send(EngineCmd::Inbound(wrong_src)).await.unwrap();
        rig.cmd_tx.send(EngineCmd::Inbound(wrong_txid)).await.unwrap();

        // 처리 순서를 보장하기 위해 라운드트립 한 번
        let (done_tx, done_rx) = oneshot::channel();
        rig.cmd_tx
            .send(EngineCmd::FinishDiscovery {
                txid: 0,
                result_tx: done_tx,
            })
            .await
            .unwrap();
        done_rx.await.unwrap();

        assert!(result_rx.try_recv().is_err());
        assert_eq!(rig.stats.read().unmatched_replies, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound_is_exact() {
        let mut rig = spawn_core(test_config());
        let result_rx = submit(&rig, addr(1), 9).await;

        // 최초 전송 + 정확히 max_retries번의 재전송, 매번 동일한 바이트
        let (_, first) = rig.outbound_rx.recv().await.unwrap();
        for _ in 0..3 {
            let (dst, bytes) = rig.outbound_rx.recv().await.unwrap();
            assert_eq!(dst, addr(1));
            assert_eq!(bytes, first);
        }

        let err = result_rx.await.unwrap().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::RetriesExhausted {
                addr: addr(1),
                attempts: 3
            }
        );

        let stats = rig.stats.read().clone();
        assert_eq!(stats.retries, 3);
        assert_eq!(stats.retries_exhausted, 1);

        // 소진 이후 더 이상 재전송이 없다
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rig.outbound_rx.try_recv().is_err());

        // 응답 없는 장치는 레지스트리에 기록되지 않는다
        assert!(rig.registry.get(addr(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_and_caps() {
        let mut rig = spawn_core(test_config());
        let _result_rx = submit(&rig, addr(1), 9).await;

        let start = tokio::time::Instant::now();
        rig.outbound_rx.recv().await.unwrap();
        let mut marks = Vec::new();
        for _ in 0..3 {
            rig.outbound_rx.recv().await.unwrap();
            marks.push(start.elapsed());
        }

        // base=10ms: 재전송 시점은 10, 10+20, 10+20+40(상한)
        assert!(marks[0] >= Duration::from_millis(10));
        assert!(marks[1] >= Duration::from_millis(30));
        assert!(marks[2] >= Duration::from_millis(70));
        assert!(marks[2] < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_retries() {
        let mut rig = spawn_core(test_config());
        let result_rx = submit(&rig, addr(1), 4).await;
        rig.outbound_rx.recv().await.unwrap();

        rig.cmd_tx
            .send(EngineCmd::Cancel {
                addr: addr(1),
                txid: 4,
            })
            .await
            .unwrap();

        // 호출자는 채널 종료로 해제되고 재전송은 더 일어나지 않는다
        assert!(result_rx.await.is_err());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rig.outbound_rx.try_recv().is_err());
        assert_eq!(rig.stats.read().cancelled, 1);
        assert_eq!(rig.stats.read().retries, 0);
    }

    #[tokio::test]
    async fn test_late_duplicate_dropped_without_registry_mutation() {
        let mut rig = spawn_core(test_config());
        let result_rx = submit(&rig, addr(1), 5).await;
        rig.outbound_rx.recv().await.unwrap();

        let reply = Frame::command_reply(addr(1), local(), 5, command::power_ack(true));
        rig.cmd_tx.send(EngineCmd::Inbound(reply)).await.unwrap();
        result_rx.await.unwrap().unwrap();

        let seen_at = rig.registry.get(addr(1)).unwrap().last_seen;

        // 같은 (주소, txid)의 지연 중복: 상태도 타임스탬프도 바뀌지 않는다
        let duplicate = Frame::command_reply(addr(1), local(), 5, command::power_ack(false));
        rig.cmd_tx.send(EngineCmd::Inbound(duplicate)).await.unwrap();

        let (done_tx, done_rx) = oneshot::channel();
        rig.cmd_tx
            .send(EngineCmd::FinishDiscovery {
                txid: 0,
                result_tx: done_tx,
            })
            .await
            .unwrap();
        done_rx.await.unwrap();

        let device = rig.registry.get(addr(1)).unwrap();
        assert_eq!(device.state.is_on, Some(true));
        assert_eq!(device.last_seen, seen_at);
        assert_eq!(rig.stats.read().unmatched_replies, 1);
    }

    #[tokio::test]
    async fn test_error_frame_rejects_pending() {
        let mut rig = spawn_core(test_config());
        let result_rx = submit(&rig, addr(1), 8).await;
        rig.outbound_rx.recv().await.unwrap();

        let error = Frame::error(addr(1), local(), 8, command::rejection(3, "unpaired"));
        rig.cmd_tx.send(EngineCmd::Inbound(error)).await.unwrap();

        match result_rx.await.unwrap().unwrap_err() {
            ProtocolError::DeviceRejected { addr: a, reason } => {
                assert_eq!(a, addr(1));
                assert!(reason.contains("unpaired"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(rig.stats.read().rejections, 1);
    }

    #[tokio::test]
    async fn test_unsolicited_error_dropped() {
        let rig = spawn_core(test_config());
        let error = Frame::error(addr(1), local(), 99, command::rejection(1, "busy"));
        rig.cmd_tx.send(EngineCmd::Inbound(error)).await.unwrap();

        let (done_tx, done_rx) = oneshot::channel();
        rig.cmd_tx
            .send(EngineCmd::FinishDiscovery {
                txid: 0,
                result_tx: done_tx,
            })
            .await
            .unwrap();
        done_rx.await.unwrap();

        assert_eq!(rig.stats.read().unmatched_replies, 1);
        assert!(rig.registry.is_empty());
    }

    #[tokio::test]
    async fn test_discovery_round_collects_and_dedupes() {
        let mut rig = spawn_core(test_config());
        let probe = Frame::discover_request(local(), 42);
        rig.cmd_tx
            .send(EngineCmd::StartDiscovery {
                txid: 42,
                frame: Bytes::from(probe.encode().unwrap()),
            })
            .await
            .unwrap();

        let (dst, _) = rig.outbound_rx.recv().await.unwrap();
        assert!(dst.is_broadcast());

        let report_a = MeterReport::parse("3;AAAA;1.0;1;12.5").unwrap();
        let report_b = MeterReport::parse("2;BBBB;2.0;0;0.0;x;y;z").unwrap();
        for (src, report) in [(addr(1), &report_a), (addr(2), &report_b), (addr(1), &report_a)] {
            let reply = Frame::discover_reply(src, local(), 42, command::meter_reply(report));
            rig.cmd_tx.send(EngineCmd::Inbound(reply)).await.unwrap();
        }

        let (result_tx, result_rx) = oneshot::channel();
        rig.cmd_tx
            .send(EngineCmd::FinishDiscovery {
                txid: 42,
                result_tx,
            })
            .await
            .unwrap();

        let devices = result_rx.await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].addr, addr(1));
        assert_eq!(devices[1].addr, addr(2));
        assert!(devices.iter().all(|d| d.last_seen.is_some()));
        assert_eq!(devices[1].state.model, Some(crate::DeviceModel::Pl7667Eth));

        let stats = rig.stats.read().clone();
        assert_eq!(stats.discover_rounds, 1);
        assert_eq!(stats.discover_replies, 3);
    }

    #[tokio::test]
    async fn test_discover_reply_without_round_dropped() {
        let rig = spawn_core(test_config());
        let report = MeterReport::parse("3;AAAA;1.0;1;12.5").unwrap();
        let reply = Frame::discover_reply(addr(1), local(), 99, command::meter_reply(&report));
        rig.cmd_tx.send(EngineCmd::Inbound(reply)).await.unwrap();

        let (done_tx, done_rx) = oneshot::channel();
        rig.cmd_tx
            .send(EngineCmd::FinishDiscovery {
                txid: 0,
                result_tx: done_tx,
            })
            .await
            .unwrap();
        done_rx.await.unwrap();

        // 윈도우 밖 응답은 레지스트리를 건드리지 않는다
        assert!(rig.registry.is_empty());
        assert_eq!(rig.stats.read().unmatched_replies, 1);
    }

    #[tokio::test]
    async fn test_shutdown_releases_pending_and_timers() {
        let mut rig = spawn_core(test_config());
        let result_rx = submit(&rig, addr(1), 5).await;
        rig.outbound_rx.recv().await.unwrap();

        rig.cmd_tx.send(EngineCmd::Shutdown).await.unwrap();
        assert!(result_rx.await.is_err());
    }
}
