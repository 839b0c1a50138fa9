//! Raw 링크 계층 트랜스포트
//!
//! 지정된 인터페이스에 `AF_PACKET` 소켓 하나를 바인드하고 프로토콜
//! ethertype의 프레임만 주고받는다. 바인드에는 CAP_NET_RAW가 필요하며
//! 실패는 시작 시점에 즉시 드러난다. 트랜스포트는 프로토콜을 해석하지
//! 않는 바이트 파이프다. 커널이 ethertype으로 1차 필터링하고, 수신측은
//! 이 스테이션 앞으로 온 프레임(유니캐스트 또는 브로드캐스트)만 올린다.

use std::ffi::CString;
use std::fs;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use bytes::Bytes;
use tokio::io::unix::AsyncFd;
use tracing::{debug, info};

use crate::addr::DeviceAddr;
use crate::error::TransportError;
use crate::ETHERTYPE;

/// Ethernet 헤더 크기: dst(6) + src(6) + ethertype(2)
pub const ETH_HEADER_LEN: usize = 14;

/// 수신 버퍼 크기 (Ethernet 헤더 + MTU)
const RECV_BUF_LEN: usize = ETH_HEADER_LEN + 1500;

/// Raw 링크 계층 소켓
///
/// tokio 런타임 안에서 생성해야 한다 (`AsyncFd` 등록).
#[derive(Debug)]
pub struct RawTransport {
    fd: AsyncFd<OwnedFd>,
    ifindex: i32,
    local: DeviceAddr,
    interface: String,
}

impl RawTransport {
    /// 인터페이스에 raw 소켓 바인드
    ///
    /// 인터페이스가 없으면 `InterfaceNotFound`, 권한이 부족하면
    /// `PermissionDenied`. 어느 쪽도 재시도하지 않는다.
    pub fn bind(interface: &str) -> Result<Self, TransportError> {
        let not_found = || TransportError::InterfaceNotFound {
            interface: interface.to_string(),
        };

        let ifname = CString::new(interface).map_err(|_| not_found())?;
        let ifindex = unsafe { libc::if_nametoindex(ifname.as_ptr()) };
        if ifindex == 0 {
            return Err(not_found());
        }

        let proto = ETHERTYPE.to_be() as libc::c_int;
        let raw_fd = unsafe {
            libc::socket(
                libc::AF_PACKET,
                libc::SOCK_RAW | libc::SOCK_NONBLOCK | libc::SOCK_CLOEXEC,
                proto,
            )
        };
        if raw_fd < 0 {
            return Err(classify_os_error(
                io::Error::last_os_error(),
                interface,
            ));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };

        let mut sll: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as u16;
        sll.sll_protocol = ETHERTYPE.to_be();
        sll.sll_ifindex = ifindex as i32;
        let ret = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if ret < 0 {
            return Err(classify_os_error(
                io::Error::last_os_error(),
                interface,
            ));
        }

        let local = read_hardware_addr(interface)?;
        let fd = AsyncFd::new(fd).map_err(TransportError::Io)?;

        info!("raw 소켓 바인드: {} ({})", interface, local);
        Ok(Self {
            fd,
            ifindex: ifindex as i32,
            local,
            interface: interface.to_string(),
        })
    }

    /// 이 스테이션의 하드웨어 주소
    pub fn local_addr(&self) -> DeviceAddr {
        self.local
    }

    /// 바인드된 인터페이스 이름
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 프레임 송신 (fire-and-forget, 브로드캐스트 허용)
    ///
    /// AF_PACKET 송신은 프레임 단위로 원자적이므로 동시 호출에 안전하다.
    pub async fn send(&self, dst: DeviceAddr, payload: &[u8]) -> Result<(), TransportError> {
        let mut frame = Vec::with_capacity(ETH_HEADER_LEN + payload.len());
        frame.extend_from_slice(dst.as_bytes());
        frame.extend_from_slice(self.local.as_bytes());
        frame.extend_from_slice(&ETHERTYPE.to_be_bytes());
        frame.extend_from_slice(payload);

        let mut sll: libc::sockaddr_ll = unsafe { std::mem::zeroed() };
        sll.sll_family = libc::AF_PACKET as u16;
        sll.sll_protocol = ETHERTYPE.to_be();
        sll.sll_ifindex = self.ifindex;
        sll.sll_halen = 6;
        sll.sll_addr[..6].copy_from_slice(dst.as_bytes());

        loop {
            let mut guard = self.fd.writable().await.map_err(TransportError::Io)?;
            let result = guard.try_io(|inner| {
                let ret = unsafe {
                    libc::sendto(
                        inner.as_raw_fd(),
                        frame.as_ptr() as *const libc::c_void,
                        frame.len(),
                        0,
                        &sll as *const libc::sockaddr_ll as *const libc::sockaddr,
                        std::mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
                    )
                };
                if ret < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(())
                }
            });
            match result {
                Ok(Ok(())) => {
                    debug!("프레임 송신: dst={} len={}", dst, frame.len());
                    return Ok(());
                }
                Ok(Err(e)) => return Err(TransportError::SendFailed(e)),
                // WouldBlock: 쓰기 가능 대기 후 재시도
                Err(_) => continue,
            }
        }
    }

    /// 프레임 수신
    ///
    /// 프로토콜 ethertype이고 이 스테이션 앞으로 온(유니캐스트 또는
    /// 브로드캐스트) 프레임의 (송신 주소, 페이로드)를 돌려준다.
    /// 그 외 트래픽은 조용히 버린다.
    pub async fn recv(&self) -> Result<(DeviceAddr, Bytes), TransportError> {
        let mut buf = vec![0u8; RECV_BUF_LEN];
        loop {
            let mut guard = self.fd.readable().await.map_err(TransportError::Io)?;
            let result = guard.try_io(|inner| {
                let ret = unsafe {
                    libc::recv(
                        inner.as_raw_fd(),
                        buf.as_mut_ptr() as *mut libc::c_void,
                        buf.len(),
                        0,
                    )
                };
                if ret < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(ret as usize)
                }
            });
            match result {
                Ok(Ok(len)) => {
                    if let Some((src, payload)) = station_filter(self.local, &buf[..len]) {
                        return Ok((src, payload));
                    }
                }
                Ok(Err(e)) => return Err(TransportError::Io(e)),
                Err(_) => continue,
            }
        }
    }
}

/// 수신 프레임 필터: ethertype + 수신 주소 검사 후 페이로드 추출
fn station_filter(local: DeviceAddr, frame: &[u8]) -> Option<(DeviceAddr, Bytes)> {
    if frame.len() < ETH_HEADER_LEN {
        return None;
    }
    let dst = DeviceAddr::from_slice(&frame[0..6])?;
    let src = DeviceAddr::from_slice(&frame[6..12])?;
    let ethertype = u16::from_be_bytes([frame[12], frame[13]]);
    if ethertype != ETHERTYPE {
        return None;
    }
    if dst != local && !dst.is_broadcast() {
        return None;
    }
    Some((src, Bytes::copy_from_slice(&frame[ETH_HEADER_LEN..])))
}

/// `/sys/class/net/<if>/address`에서 로컬 하드웨어 주소 읽기
fn read_hardware_addr(interface: &str) -> Result<DeviceAddr, TransportError> {
    let path = format!("/sys/class/net/{}/address", interface);
    let text = fs::read_to_string(&path).map_err(|_| TransportError::InterfaceNotFound {
        interface: interface.to_string(),
    })?;
    text.trim().parse().map_err(|_| {
        TransportError::Io(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("하드웨어 주소 해석 실패: {}", path),
        ))
    })
}

fn classify_os_error(err: io::Error, interface: &str) -> TransportError {
    match err.raw_os_error() {
        Some(libc::EPERM) | Some(libc::EACCES) => TransportError::PermissionDenied {
            interface: interface.to_string(),
        },
        Some(libc::ENODEV) | Some(libc::ENXIO) => TransportError::InterfaceNotFound {
            interface: interface.to_string(),
        },
        _ => TransportError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> DeviceAddr {
        DeviceAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01])
    }

    fn eth_frame(dst: DeviceAddr, src: DeviceAddr, ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::new();
        frame.extend_from_slice(dst.as_bytes());
        frame.extend_from_slice(src.as_bytes());
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn test_filter_accepts_unicast_and_broadcast() {
        let src = DeviceAddr::new([0x00, 0xB0, 0x52, 0, 0, 9]);

        let unicast = eth_frame(local(), src, ETHERTYPE, b"hello");
        let (got_src, payload) = station_filter(local(), &unicast).unwrap();
        assert_eq!(got_src, src);
        assert_eq!(&payload[..], b"hello");

        let broadcast = eth_frame(DeviceAddr::BROADCAST, src, ETHERTYPE, b"probe");
        assert!(station_filter(local(), &broadcast).is_some());
    }

    #[test]
    fn test_filter_drops_foreign_traffic() {
        let src = DeviceAddr::new([0x00, 0xB0, 0x52, 0, 0, 9]);
        let other = DeviceAddr::new([0x02, 0, 0, 0, 0, 0x7F]);

        // 다른 스테이션 앞으로 온 프레임
        let misaddressed = eth_frame(other, src, ETHERTYPE, b"x");
        assert!(station_filter(local(), &misaddressed).is_none());

        // 다른 ethertype (일반 트래픽)
        let ipv4 = eth_frame(local(), src, 0x0800, b"x");
        assert!(station_filter(local(), &ipv4).is_none());

        // Ethernet 헤더보다 짧은 쓰레기
        assert!(station_filter(local(), &[0u8; 7]).is_none());
    }

    #[test]
    fn test_filter_passes_empty_payload() {
        let src = DeviceAddr::new([0x00, 0xB0, 0x52, 0, 0, 9]);
        let frame = eth_frame(local(), src, ETHERTYPE, &[]);
        let (_, payload) = station_filter(local(), &frame).unwrap();
        assert!(payload.is_empty());
    }

    #[tokio::test]
    async fn test_bind_unknown_interface() {
        let err = RawTransport::bind("plugline-no-such-if0").unwrap_err();
        assert!(matches!(err, TransportError::InterfaceNotFound { .. }));
    }
}
