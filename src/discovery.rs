//! 디스커버리 수집
//!
//! 브로드캐스트 DISCOVER_REQUEST 한 번에 대해 수집 윈도우 동안 도착하는
//! DISCOVER_REPLY를 주소별로 중복 제거하며 집계한다. 브로드캐스트 폭주로
//! 같은 장치가 여러 번 응답해도 장치 항목은 하나만 만든다.
//! 라운드는 브로드캐스트의 트랜잭션 ID로 식별하므로 겹치는 라운드끼리
//! 응답이 섞이지 않는다.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use crate::addr::DeviceAddr;
use crate::registry::{Device, DeviceRegistry};

/// 진행 중인 디스커버리 라운드
pub struct DiscoveryRound {
    /// 라운드 식별자 (브로드캐스트의 트랜잭션 ID)
    pub txid: u16,

    /// 라운드 시작 시각
    started_at: Instant,

    /// 응답한 장치 집합 (주소순)
    seen: BTreeSet<DeviceAddr>,

    /// 수신한 응답 수 (중복 포함)
    replies: u64,
}

impl DiscoveryRound {
    pub fn new(txid: u16) -> Self {
        Self {
            txid,
            started_at: Instant::now(),
            seen: BTreeSet::new(),
            replies: 0,
        }
    }

    /// 응답 기록. 이 라운드에서 처음 본 주소면 true
    pub fn record(&mut self, addr: DeviceAddr) -> bool {
        self.replies += 1;
        self.seen.insert(addr)
    }

    /// 라운드 시작 후 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 고유 응답 장치 수
    pub fn unique_count(&self) -> usize {
        self.seen.len()
    }

    /// 수신 응답 수 (중복 포함)
    pub fn reply_count(&self) -> u64 {
        self.replies
    }

    /// 윈도우 종료 시의 장치 스냅샷 (주소순)
    pub fn snapshot(self, registry: &DeviceRegistry) -> Vec<Device> {
        self.seen
            .into_iter()
            .filter_map(|addr| registry.get(addr))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::DeviceState;

    fn addr(last: u8) -> DeviceAddr {
        DeviceAddr::new([0x00, 0xB0, 0x52, 0x00, 0x00, last])
    }

    #[test]
    fn test_dedupe_by_address() {
        let mut round = DiscoveryRound::new(7);
        assert!(round.record(addr(1)));
        assert!(round.record(addr(2)));
        // 브로드캐스트 폭주로 인한 중복 응답
        assert!(!round.record(addr(1)));

        assert_eq!(round.unique_count(), 2);
        assert_eq!(round.reply_count(), 3);
    }

    #[test]
    fn test_elapsed_tracks_round_age() {
        let round = DiscoveryRound::new(7);
        std::thread::sleep(Duration::from_millis(5));
        assert!(round.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_snapshot_in_address_order() {
        let registry = DeviceRegistry::new();
        let mut round = DiscoveryRound::new(1);
        for last in [3u8, 1, 2] {
            registry.record_seen(addr(last), DeviceState::with_power(true));
            round.record(addr(last));
        }

        let devices = round.snapshot(&registry);
        let addrs: Vec<DeviceAddr> = devices.iter().map(|d| d.addr).collect();
        assert_eq!(addrs, vec![addr(1), addr(2), addr(3)]);
        assert!(devices.iter().all(|d| d.last_seen.is_some()));
    }
}
