//! 장치/세션 레지스트리
//!
//! 하드웨어 주소 → 논리 장치 핸들 + 세션 상태의 스레드 안전 매핑.
//! 세션은 첫 요청 시 지연 생성되며, 장치당 미해결 요청 1개 규칙과
//! 트랜잭션 ID 발급을 담당한다.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::addr::DeviceAddr;
use crate::command::{DeviceModel, MeterReport, ReplyBody};
use crate::config::DeviceEntry;

/// 장치의 마지막 관측 상태
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceState {
    /// 장치 모델 (계측 레코드에서 식별)
    pub model: Option<DeviceModel>,

    /// 전원 상태
    pub is_on: Option<bool>,

    /// 순시 전력 (W)
    pub watts: Option<f64>,

    /// 펌웨어 식별 문자열 (시리얼, 버전 등)
    pub idents: Vec<String>,
}

impl DeviceState {
    /// 전원 상태만 갱신하는 부분 상태
    pub fn with_power(is_on: bool) -> Self {
        Self {
            is_on: Some(is_on),
            ..Self::default()
        }
    }

    /// 매칭된 응답 본문에서 상태 추출
    pub fn from_reply(reply: &ReplyBody) -> Self {
        match reply {
            ReplyBody::Meter(report) => report.into(),
            ReplyBody::PowerAck { is_on } => Self::with_power(*is_on),
            ReplyBody::StatePush { is_on } => Self::with_power(*is_on),
        }
    }

    /// 새 관측값으로 병합 (없는 필드는 기존 값 유지)
    fn merge(&mut self, incoming: &DeviceState) {
        if incoming.model.is_some() {
            self.model = incoming.model;
        }
        if incoming.is_on.is_some() {
            self.is_on = incoming.is_on;
        }
        if incoming.watts.is_some() {
            self.watts = incoming.watts;
        }
        if !incoming.idents.is_empty() {
            self.idents = incoming.idents.clone();
        }
    }
}

impl From<&MeterReport> for DeviceState {
    fn from(report: &MeterReport) -> Self {
        Self {
            model: Some(report.model),
            is_on: Some(report.is_on),
            watts: Some(report.watts),
            idents: report.idents.clone(),
        }
    }
}

/// 논리 장치 핸들
#[derive(Debug, Clone)]
pub struct Device {
    /// 하드웨어 주소 (불변 식별자)
    pub addr: DeviceAddr,

    /// 운영자 라벨 (설정에서)
    pub label: Option<String>,

    /// 마지막 관측 상태
    pub state: DeviceState,

    /// 마지막 응답 시각
    pub last_seen: Option<Instant>,
}

impl Device {
    fn new(addr: DeviceAddr, label: Option<String>) -> Self {
        Self {
            addr,
            label,
            state: DeviceState::default(),
            last_seen: None,
        }
    }

    /// 무응답 임계값 초과 여부
    pub fn is_stale(&self, threshold: Duration) -> bool {
        match self.last_seen {
            Some(at) => at.elapsed() > threshold,
            None => true,
        }
    }

    /// 표시용 이름 (라벨 우선, 없으면 주소)
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.addr.to_string(),
        }
    }
}

/// 장치별 세션
pub struct Session {
    /// 다음 트랜잭션 ID (시작값 무작위, u16 범위에서 순환)
    next_txid: AtomicU16,

    /// 장치당 미해결 요청 1개 보장 슬롯
    pub(crate) slot: Mutex<()>,
}

impl Session {
    fn new() -> Self {
        Self {
            next_txid: AtomicU16::new(rand::random()),
            slot: Mutex::new(()),
        }
    }

    /// 트랜잭션 ID 발급 (단조 증가, 순환)
    pub fn next_txid(&self) -> u16 {
        self.next_txid.fetch_add(1, Ordering::Relaxed)
    }
}

/// 장치/세션 레지스트리
///
/// 전역 싱글턴 없이 엔진 시작 시 하나 생성해 명시적으로 공유한다.
pub struct DeviceRegistry {
    devices: DashMap<DeviceAddr, Device>,
    sessions: DashMap<DeviceAddr, Arc<Session>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
            sessions: DashMap::new(),
        }
    }

    /// 설정에 선언된 장치 항목으로 초기화
    pub fn seed(&self, entries: &[DeviceEntry]) {
        for entry in entries {
            self.devices
                .entry(entry.addr)
                .or_insert_with(|| Device::new(entry.addr, entry.label.clone()));
        }
    }

    /// 세션 조회 (없으면 생성)
    pub fn session(&self, addr: DeviceAddr) -> Arc<Session> {
        self.sessions
            .entry(addr)
            .or_insert_with(|| Arc::new(Session::new()))
            .value()
            .clone()
    }

    /// 트랜잭션 ID 발급
    pub fn next_transaction_id(&self, addr: DeviceAddr) -> u16 {
        self.session(addr).next_txid()
    }

    /// 응답 관측 기록: 상태 병합 + last_seen 갱신
    pub fn record_seen(&self, addr: DeviceAddr, state: DeviceState) {
        let mut device = self
            .devices
            .entry(addr)
            .or_insert_with(|| Device::new(addr, None));
        device.state.merge(&state);
        device.last_seen = Some(Instant::now());
        debug!("장치 관측 기록: {} state={:?}", addr, device.state);
    }

    /// 장치 조회
    pub fn get(&self, addr: DeviceAddr) -> Option<Device> {
        self.devices.get(&addr).map(|d| d.value().clone())
    }

    /// 전체 장치 목록 (주소순 정렬)
    pub fn devices(&self) -> Vec<Device> {
        let mut all: Vec<Device> = self.devices.iter().map(|d| d.value().clone()).collect();
        all.sort_by_key(|d| d.addr);
        all
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
