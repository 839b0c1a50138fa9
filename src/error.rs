//! 에러 타입 정의

use thiserror::Error;

use crate::addr::DeviceAddr;

/// 프레임 디코드 에러
///
/// 공유 세그먼트에는 외부 트래픽이 섞이므로 수신 경로에서는
/// 호출자에게 전파하지 않고 기록 후 폐기한다.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("잘못된 프레임: {0}")]
    Malformed(String),

    #[error("프레임 길이 부족: need {need}, got {got}")]
    TooShort { need: usize, got: usize },

    #[error("지원하지 않는 프로토콜 버전: expected {expected}, got {got}")]
    UnsupportedVersion { expected: u8, got: u8 },

    #[error("본문 CRC 불일치: expected {expected:08X}, got {got:08X}")]
    CrcMismatch { expected: u32, got: u32 },
}

/// 프레임 인코드 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("본문 크기 초과: 최대 {max} 바이트, got {got}")]
    PayloadTooLarge { max: usize, got: usize },
}

/// 트랜스포트 에러 (raw 소켓)
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("권한 부족: {interface} raw 소켓 열기에 CAP_NET_RAW 필요")]
    PermissionDenied { interface: String },

    #[error("인터페이스 없음: {interface}")]
    InterfaceNotFound { interface: String },

    #[error("송신 실패: {0}")]
    SendFailed(std::io::Error),

    #[error("소켓 IO 에러: {0}")]
    Io(#[from] std::io::Error),
}

/// 프로토콜 에러 (요청/응답 교환)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("작업 시한 초과: {addr}")]
    Timeout { addr: DeviceAddr },

    #[error("재시도 횟수 소진: {addr}, attempts={attempts}")]
    RetriesExhausted { addr: DeviceAddr, attempts: u32 },

    #[error("장치 거부: {addr}, reason={reason}")]
    DeviceRejected { addr: DeviceAddr, reason: String },

    #[error("예상 밖 응답: {addr}, {detail}")]
    UnexpectedReply { addr: DeviceAddr, detail: String },
}

/// 설정 에러
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("유효하지 않은 장치 주소: {value}")]
    InvalidAddress { value: String },

    #[error("인터페이스 이름 누락")]
    MissingInterface,
}

/// PlugLine 엔진 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("엔진 정지됨")]
    EngineStopped,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
