//! # PlugLine
//!
//! Asoka PL7667 스마트 플러그 링크 계층 제어 엔진 (IP 없이 raw Ethernet)
//!
//! ## 핵심 특징
//! - **Raw Ethernet**: AF_PACKET 소켓으로 IP 스택 아래에서 직접 통신
//! - **디스커버리**: 브로드캐스트 열거 + 수집 윈도우 내 응답 집계
//! - **요청 상관**: (장치 주소, 트랜잭션 ID)로 응답 매칭
//! - **재시도**: 지수 백오프 기반 마감시한 재전송, 횟수 상한
//! - **직렬화 보장**: 장치당 미해결 요청 1개로 응답 모호성 제거
//! - **손실 허용**: 중복/지연/무순서 응답을 안전하게 폐기

pub mod addr;
pub mod command;
pub mod config;
pub mod correlator;
pub mod datalog;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod frame;
pub mod registry;
pub mod stats;
pub mod transport;

pub use addr::DeviceAddr;
pub use command::{DeviceModel, MeterReport, ReplyBody};
pub use config::{Config, DeviceEntry};
pub use datalog::DataLog;
pub use discovery::DiscoveryRound;
pub use engine::{Controller, Engine};
pub use error::{
    ConfigError, DecodeError, EncodeError, Error, ProtocolError, Result, TransportError,
};
pub use frame::{Frame, FrameHeader, FrameType};
pub use registry::{Device, DeviceRegistry, DeviceState};
pub use stats::EngineStats;
pub use transport::RawTransport;

/// 프로토콜 버전
pub const PROTOCOL_VERSION: u8 = 1;

/// 사설 EtherType (IEEE 802 로컬 실험 대역)
pub const ETHERTYPE: u16 = 0x88B5;

/// 매직 넘버 (프레임 식별용)
pub const MAGIC_NUMBER: u32 = 0x4153504C; // "ASPL"

/// 프레임 헤더 크기 (바이트, bincode 고정 폭)
pub const FRAME_HEADER_LEN: usize = 29;

/// Ethernet 페이로드 상한 (바이트)
pub const ETH_MTU: usize = 1500;

/// 프레임 본문 최대 크기 (바이트)
pub const MAX_BODY_LEN: usize = ETH_MTU - FRAME_HEADER_LEN;
