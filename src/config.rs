//! 엔진 설정

use std::str::FromStr;

use crate::addr::DeviceAddr;
use crate::error::ConfigError;

/// 설정에 선언된 장치 항목
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    /// 장치 하드웨어 주소
    pub addr: DeviceAddr,

    /// 운영자용 라벨
    pub label: Option<String>,
}

impl FromStr for DeviceEntry {
    type Err = ConfigError;

    /// "aa:bb:cc:dd:ee:ff" 또는 "aa:bb:cc:dd:ee:ff=라벨" 파싱
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_part, label) = match s.split_once('=') {
            Some((a, l)) => (a, Some(l.trim().to_string()).filter(|l| !l.is_empty())),
            None => (s, None),
        };
        Ok(Self {
            addr: addr_part.trim().parse()?,
            label,
        })
    }
}

/// PlugLine 엔진 설정
///
/// 시작 시점에 불변 구조체로 전달되며 엔진은 파일을 직접 읽지 않는다.
#[derive(Debug, Clone)]
pub struct Config {
    /// 바인드할 네트워크 인터페이스 이름
    pub interface: String,

    /// 설정에 미리 선언된 장치 목록 (주소 → 라벨)
    pub devices: Vec<DeviceEntry>,

    /// 펌웨어가 요구하는 경우의 공유 시크릿 (명령 본문 트레일러)
    pub shared_secret: Option<String>,

    /// 디스커버리 수집 윈도우 (밀리초)
    pub discover_window_ms: u64,

    /// 첫 시도 마감시한 (밀리초), 재시도마다 2배 백오프
    pub retry_base_ms: u64,

    /// 시도 마감시한 상한 (밀리초)
    pub retry_max_ms: u64,

    /// 최대 재시도 횟수
    pub max_retries: u32,

    /// 작업 전체 시한 (밀리초), 초과 시 요청 취소
    pub op_timeout_ms: u64,

    /// 이 시간 동안 응답 없는 장치는 stale로 표시 (밀리초)
    pub stale_after_ms: u64,

    /// 엔진 내부 채널 용량
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interface: String::new(),
            devices: Vec::new(),
            shared_secret: None,
            discover_window_ms: 2000,   // 2초 수집
            retry_base_ms: 250,         // 250ms → 500 → 1000 → ...
            retry_max_ms: 2000,         // 백오프 상한 2초
            max_retries: 3,
            op_timeout_ms: 10_000,      // 작업 전체 10초
            stale_after_ms: 60_000,     // 1분 무응답 시 stale
            channel_capacity: 1024,
        }
    }
}

impl Config {
    /// 인터페이스만 지정한 기본 설정
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            ..Self::default()
        }
    }

    /// 유선 LAN 등 손실이 드문 세그먼트용 설정
    pub fn fast_lan(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            discover_window_ms: 1000,
            retry_base_ms: 100,
            retry_max_ms: 500,
            max_retries: 2,
            op_timeout_ms: 3000,
            ..Self::default()
        }
    }

    /// 전력선/혼잡 세그먼트 등 손실이 잦은 환경용 설정
    pub fn lossy_segment(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            discover_window_ms: 4000,
            retry_base_ms: 500,
            retry_max_ms: 4000,
            max_retries: 5,
            op_timeout_ms: 30_000,
            stale_after_ms: 180_000,
            ..Self::default()
        }
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interface.trim().is_empty() {
            return Err(ConfigError::MissingInterface);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_entry_parse() {
        let entry: DeviceEntry = "00:b0:52:01:02:03=거실 램프".parse().unwrap();
        assert_eq!(entry.addr.to_string(), "00:b0:52:01:02:03");
        assert_eq!(entry.label.as_deref(), Some("거실 램프"));

        let bare: DeviceEntry = "00:b0:52:01:02:03".parse().unwrap();
        assert_eq!(bare.label, None);

        assert!("not-an-addr=x".parse::<DeviceEntry>().is_err());
    }

    #[test]
    fn test_validate_requires_interface() {
        let config = Config::default();
        assert_eq!(config.validate(), Err(ConfigError::MissingInterface));
        assert!(Config::new("eth0").validate().is_ok());
    }

    #[test]
    fn test_presets_keep_retry_ordering() {
        for config in [Config::fast_lan("eth0"), Config::lossy_segment("eth0")] {
            assert!(config.retry_base_ms <= config.retry_max_ms);
            assert!(config.op_timeout_ms > config.retry_max_ms);
        }
    }
}
