//! 장치 하드웨어 주소
//!
//! 6바이트 MAC 주소를 장치의 불변 식별자로 사용한다.
//! 맵 키로 쓰기 위한 전순서 외에 내부 구조에 의미를 두지 않는다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 장치 하드웨어 주소 (6바이트)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceAddr([u8; 6]);

impl DeviceAddr {
    /// 링크 계층 브로드캐스트 주소
    pub const BROADCAST: DeviceAddr = DeviceAddr([0xFF; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// 슬라이스에서 주소 추출 (6바이트 미만이면 None)
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let octets: [u8; 6] = bytes.get(..6)?.try_into().ok()?;
        Some(Self(octets))
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl FromStr for DeviceAddr {
    type Err = ConfigError;

    /// "aa:bb:cc:dd:ee:ff" 형식 파싱
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidAddress {
            value: s.to_string(),
        };

        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let addr: DeviceAddr = "00:b0:52:a1:02:03".parse().unwrap();
        assert_eq!(addr.as_bytes(), &[0x00, 0xB0, 0x52, 0xA1, 0x02, 0x03]);
        assert_eq!(addr.to_string(), "00:b0:52:a1:02:03");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        // 옥텟 수 부족
        assert!("00:b0:52".parse::<DeviceAddr>().is_err());
        // 옥텟 수 초과
        assert!("00:b0:52:a1:02:03:04".parse::<DeviceAddr>().is_err());
        // 16진수 아님
        assert!("00:b0:52:a1:02:zz".parse::<DeviceAddr>().is_err());
        // 옥텟 길이 오류
        assert!("0:b0:52:a1:02:033".parse::<DeviceAddr>().is_err());
        assert!("".parse::<DeviceAddr>().is_err());
    }

    #[test]
    fn test_broadcast() {
        let addr: DeviceAddr = "ff:ff:ff:ff:ff:ff".parse().unwrap();
        assert!(addr.is_broadcast());
        assert_eq!(addr, DeviceAddr::BROADCAST);
        assert!(!DeviceAddr::new([0; 6]).is_broadcast());
    }

    #[test]
    fn test_ordering_for_map_keys() {
        let a = DeviceAddr::new([0, 0, 0, 0, 0, 1]);
        let b = DeviceAddr::new([0, 0, 0, 0, 1, 0]);
        assert!(a < b);
        assert!(b < DeviceAddr::BROADCAST);
    }

    #[test]
    fn test_from_slice() {
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let addr = DeviceAddr::from_slice(&bytes).unwrap();
        assert_eq!(addr, DeviceAddr::new([1, 2, 3, 4, 5, 6]));
        assert!(DeviceAddr::from_slice(&bytes[..5]).is_none());
    }
}
