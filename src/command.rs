//! 명령 페이로드 정의
//!
//! PL7667 펌웨어가 정의한 명령/응답 본문 형식.
//! 요청: opcode(1) + 인자 길이(1) + 인자 + (설정 시) 시크릿 트레일러.
//! 응답: opcode(1) + 길이(1) + 메시지. 계측 응답은 세미콜론 구분 ASCII 레코드다.

use std::fmt;

use bytes::Bytes;

/// 상태/계측 조회 (디스커버리 프로브와 동일한 본문)
pub const OP_QUERY_STATUS: u8 = 0x00;

/// 전원 설정 (인자 1바이트: 0x01 on / 0x00 off)
pub const OP_SET_POWER: u8 = 0x08;

/// 계측 레코드 응답
pub const REPLY_METER_REPORT: u8 = 0x01;

/// 전원 설정 확인 응답
pub const REPLY_POWER_ACK: u8 = 0x09;

/// 비요청 상태 통지 (장치 버튼 조작 등)
pub const REPLY_STATE_PUSH: u8 = 0x0C;

/// 장치 모델
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceModel {
    /// 계측 레코드 코드 "2"
    Pl7667Eth,

    /// 계측 레코드 코드 "3"
    Pl7667Sw,
}

impl DeviceModel {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "2" => Some(DeviceModel::Pl7667Eth),
            "3" => Some(DeviceModel::Pl7667Sw),
            _ => None,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            DeviceModel::Pl7667Eth => "2",
            DeviceModel::Pl7667Sw => "3",
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceModel::Pl7667Eth => write!(f, "PL7667-ETH"),
            DeviceModel::Pl7667Sw => write!(f, "PL7667-SW"),
        }
    }
}

/// 계측 레코드
///
/// 필드 0 = 모델 코드, 필드 3 = 전원 상태(0/1), 필드 4 = 순시 전력(W).
/// 나머지 필드는 펌웨어 식별 문자열(시리얼, 버전 등)로 순서대로 보존한다.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterReport {
    pub model: DeviceModel,
    pub idents: Vec<String>,
    pub is_on: bool,
    pub watts: f64,
}

impl MeterReport {
    /// ASCII 레코드 파싱
    pub fn parse(record: &str) -> Option<Self> {
        let fields: Vec<&str> = record.split(';').collect();
        if fields.len() < 5 {
            return None;
        }

        let model = DeviceModel::from_code(fields[0])?;
        let is_on = match fields[3] {
            "0" => false,
            "1" => true,
            _ => return None,
        };
        let watts: f64 = fields[4].parse().ok()?;

        let idents = fields
            .iter()
            .enumerate()
            .filter(|(i, _)| !matches!(i, 0 | 3 | 4))
            .map(|(_, f)| f.to_string())
            .collect();

        Some(Self {
            model,
            idents,
            is_on,
            watts,
        })
    }

    /// ASCII 레코드 재구성 (파싱의 역연산)
    pub fn to_record(&self) -> String {
        let mut fields: Vec<String> = Vec::with_capacity(self.idents.len() + 3);
        fields.push(self.model.code().to_string());
        fields.push(self.idents.first().cloned().unwrap_or_default());
        fields.push(self.idents.get(1).cloned().unwrap_or_default());
        fields.push(if self.is_on { "1" } else { "0" }.to_string());
        fields.push(format!("{}", self.watts));
        fields.extend(self.idents.iter().skip(2).cloned());
        fields.join(";")
    }
}

/// 응답 본문
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    /// 계측 레코드 (상태 조회/디스커버리 응답)
    Meter(MeterReport),

    /// 전원 설정 확인
    PowerAck { is_on: bool },

    /// 비요청 상태 통지
    StatePush { is_on: bool },
}

/// 상태 조회 요청 본문
pub fn query_status(secret: Option<&str>) -> Bytes {
    let mut buf = vec![OP_QUERY_STATUS, 0x00];
    append_secret(&mut buf, secret);
    Bytes::from(buf)
}

/// 전원 설정 요청 본문
pub fn set_power(on: bool, secret: Option<&str>) -> Bytes {
    let mut buf = vec![OP_SET_POWER, 0x01, u8::from(on)];
    append_secret(&mut buf, secret);
    Bytes::from(buf)
}

/// 시크릿 트레일러: 길이(1) + UTF-8 바이트, 255바이트 상한
fn append_secret(buf: &mut Vec<u8>, secret: Option<&str>) {
    if let Some(secret) = secret {
        let bytes = secret.as_bytes();
        let len = bytes.len().min(u8::MAX as usize);
        buf.push(len as u8);
        buf.extend_from_slice(&bytes[..len]);
    }
}

/// 응답 본문 파싱
pub fn parse_reply(body: &[u8]) -> Option<ReplyBody> {
    if body.len() < 2 {
        return None;
    }
    let opcode = body[0];
    let len = body[1] as usize;
    let args = body.get(2..2 + len)?;

    match opcode {
        REPLY_METER_REPORT => {
            let record = std::str::from_utf8(args).ok()?;
            MeterReport::parse(record).map(ReplyBody::Meter)
        }
        REPLY_POWER_ACK => Some(ReplyBody::PowerAck {
            is_on: *args.first()? == 0x01,
        }),
        REPLY_STATE_PUSH => Some(ReplyBody::StatePush {
            is_on: *args.first()? == 0x01,
        }),
        _ => None,
    }
}

/// 계측 응답 본문 생성 (장치 측 형식)
pub fn meter_reply(report: &MeterReport) -> Bytes {
    let record = report.to_record();
    let mut buf = Vec::with_capacity(2 + record.len());
    buf.push(REPLY_METER_REPORT);
    buf.push(record.len().min(u8::MAX as usize) as u8);
    buf.extend_from_slice(record.as_bytes());
    Bytes::from(buf)
}

/// 전원 설정 확인 본문 생성 (장치 측 형식)
pub fn power_ack(on: bool) -> Bytes {
    Bytes::from(vec![REPLY_POWER_ACK, 0x01, u8::from(on)])
}

/// 거부 본문 생성: 사유 코드(1) + UTF-8 메시지
pub fn rejection(code: u8, message: &str) -> Bytes {
    let mut buf = Vec::with_capacity(1 + message.len());
    buf.push(code);
    buf.extend_from_slice(message.as_bytes());
    Bytes::from(buf)
}

/// 거부 본문 파싱 → 사람이 읽을 수 있는 사유
pub fn parse_rejection(body: &[u8]) -> String {
    match body.split_first() {
        Some((code, rest)) if !rest.is_empty() => {
            format!("code={}, {}", code, String::from_utf8_lossy(rest))
        }
        Some((code, _)) => format!("code={}", code),
        None => "code=?".to_string(),
    }
}
