//! 프로토콜 프레임 정의 및 코덱
//!
//! Ethernet 페이로드에 실리는 사설 프레임 형식.
//! 고정 헤더(매직/버전/타입/트랜잭션/주소/본문 길이/CRC) + 가변 본문.
//! 코덱은 순수 함수로 I/O가 없어 트랜스포트 없이 왕복 테스트가 가능하다.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::addr::DeviceAddr;
use crate::error::{DecodeError, EncodeError};
use crate::{FRAME_HEADER_LEN, MAGIC_NUMBER, MAX_BODY_LEN, PROTOCOL_VERSION};

/// 프레임 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrameType {
    /// 디스커버리 브로드캐스트
    DiscoverRequest = 1,

    /// 디스커버리 응답 (장치 → 엔진)
    DiscoverReply = 2,

    /// 명령 요청
    CommandRequest = 3,

    /// 명령 응답
    CommandReply = 4,

    /// 장치 거부/오류 통지
    Error = 5,
}

/// 프레임 헤더 (bincode 고정 폭, little-endian)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// 매직 넘버
    pub magic: u32,

    /// 프로토콜 버전
    pub version: u8,

    /// 프레임 타입
    pub frame_type: FrameType,

    /// 트랜잭션 ID (요청/응답 상관용)
    pub txid: u16,

    /// 송신 장치 주소
    pub src: DeviceAddr,

    /// 수신 장치 주소
    pub dst: DeviceAddr,

    /// 본문 길이 (헤더 제외)
    pub body_len: u16,

    /// 본문 CRC32
    pub body_crc: u32,
}

/// 프로토콜 프레임: 고정 헤더 + 가변 본문
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: FrameHeader,
    pub body: Bytes,
}

impl Frame {
    /// 새 프레임 생성 (본문 길이/CRC는 여기서 계산)
    pub fn new(frame_type: FrameType, txid: u16, src: DeviceAddr, dst: DeviceAddr, body: Bytes) -> Self {
        let header = FrameHeader {
            magic: MAGIC_NUMBER,
            version: PROTOCOL_VERSION,
            frame_type,
            txid,
            src,
            dst,
            body_len: body.len() as u16,
            body_crc: crc32fast::hash(&body),
        };
        Self { header, body }
    }

    /// 디스커버리 브로드캐스트 프레임
    pub fn discover_request(src: DeviceAddr, txid: u16) -> Self {
        Self::new(
            FrameType::DiscoverRequest,
            txid,
            src,
            DeviceAddr::BROADCAST,
            Bytes::new(),
        )
    }

    /// 디스커버리 응답 프레임
    pub fn discover_reply(src: DeviceAddr, dst: DeviceAddr, txid: u16, body: Bytes) -> Self {
        Self::new(FrameType::DiscoverReply, txid, src, dst, body)
    }

    /// 명령 요청 프레임
    pub fn command_request(src: DeviceAddr, dst: DeviceAddr, txid: u16, body: Bytes) -> Self {
        Self::new(FrameType::CommandRequest, txid, src, dst, body)
    }

    /// 명령 응답 프레임
    pub fn command_reply(src: DeviceAddr, dst: DeviceAddr, txid: u16, body: Bytes) -> Self {
        Self::new(FrameType::CommandReply, txid, src, dst, body)
    }

    /// 장치 거부 프레임
    pub fn error(src: DeviceAddr, dst: DeviceAddr, txid: u16, body: Bytes) -> Self {
        Self::new(FrameType::Error, txid, src, dst, body)
    }

    /// 바이트로 인코드
    ///
    /// 본문이 MTU를 넘으면 `PayloadTooLarge`. 그 외에는 실패하지 않는다.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        if self.body.len() > MAX_BODY_LEN {
            return Err(EncodeError::PayloadTooLarge {
                max: MAX_BODY_LEN,
                got: self.body.len(),
            });
        }

        let header_bytes = bincode::serialize(&self.header).unwrap_or_default();
        let mut buf = Vec::with_capacity(header_bytes.len() + self.body.len());
        buf.extend_from_slice(&header_bytes);
        buf.extend_from_slice(&self.body);
        Ok(buf)
    }

    /// 바이트에서 디코드
    ///
    /// Ethernet은 60바이트 미만 프레임을 0으로 패딩하므로
    /// 선언된 본문 길이 이후의 꼬리 바이트는 무시한다.
    pub fn decode(bytes: &[u8]) -> Result<Frame, DecodeError> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(DecodeError::TooShort {
                need: FRAME_HEADER_LEN,
                got: bytes.len(),
            });
        }

        // 매직/버전은 역직렬화 전에 직접 확인
        let magic = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if magic != MAGIC_NUMBER {
            return Err(DecodeError::Malformed(format!(
                "매직 넘버 불일치: expected {:08X}, got {:08X}",
                MAGIC_NUMBER, magic
            )));
        }

        let version = bytes[4];
        if version != PROTOCOL_VERSION {
            return Err(DecodeError::UnsupportedVersion {
                expected: PROTOCOL_VERSION,
                got: version,
            });
        }

        let header: FrameHeader = bincode::deserialize(&bytes[..FRAME_HEADER_LEN])
            .map_err(|e| DecodeError::Malformed(format!("헤더 해석 실패: {}", e)))?;

        let total = FRAME_HEADER_LEN + header.body_len as usize;
        if bytes.len() < total {
            return Err(DecodeError::TooShort {
                need: total,
                got: bytes.len(),
            });
        }

        let body = Bytes::copy_from_slice(&bytes[FRAME_HEADER_LEN..total]);
        let crc = crc32fast::hash(&body);
        if crc != header.body_crc {
            return Err(DecodeError::CrcMismatch {
                expected: header.body_crc,
                got: crc,
            });
        }

        Ok(Frame { header, body })
    }
}
