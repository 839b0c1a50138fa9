//! 엔진 통계

use std::time::{Duration, Instant};

/// 엔진 누적 통계
#[derive(Debug, Clone)]
pub struct EngineStats {
    /// 엔진 시작 시각
    pub start_time: Instant,

    /// 송신 프레임 수
    pub frames_sent: u64,

    /// 수신 프레임 수 (프로토콜 ethertype 기준)
    pub frames_received: u64,

    /// 디코드 실패로 폐기한 프레임 수
    pub decode_failures: u64,

    /// 제출된 요청 수
    pub requests_submitted: u64,

    /// 매칭된 응답 수
    pub replies_matched: u64,

    /// 재전송 횟수
    pub retries: u64,

    /// 재시도 소진으로 실패한 요청 수
    pub retries_exhausted: u64,

    /// 장치 거부 수
    pub rejections: u64,

    /// 매칭 실패로 폐기한 응답 수 (지연 중복, 비요청 통지 포함)
    pub unmatched_replies: u64,

    /// 취소된 요청 수
    pub cancelled: u64,

    /// 디스커버리 라운드 수
    pub discover_rounds: u64,

    /// 디스커버리 응답 수 (중복 포함)
    pub discover_replies: u64,

    /// 마지막 응답 수신 시각
    pub last_reply_time: Option<Instant>,
}

impl EngineStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            frames_sent: 0,
            frames_received: 0,
            decode_failures: 0,
            requests_submitted: 0,
            replies_matched: 0,
            retries: 0,
            retries_exhausted: 0,
            rejections: 0,
            unmatched_replies: 0,
            cancelled: 0,
            discover_rounds: 0,
            discover_replies: 0,
            last_reply_time: None,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 첫 시도 성공률 추정 (재전송 비중 기반)
    pub fn first_try_rate(&self) -> f64 {
        let attempts = self.requests_submitted + self.retries;
        if attempts == 0 {
            return 1.0;
        }
        self.requests_submitted as f64 / attempts as f64
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.1}s | Frames tx/rx: {}/{} | Requests: {} (matched {}, retries {}, exhausted {}, rejected {}, cancelled {}) | Dropped: {} decode, {} unmatched | Discovery: {} rounds, {} replies",
            self.elapsed().as_secs_f64(),
            self.frames_sent,
            self.frames_received,
            self.requests_submitted,
            self.replies_matched,
            self.retries,
            self.retries_exhausted,
            self.rejections,
            self.cancelled,
            self.decode_failures,
            self.unmatched_replies,
            self.discover_rounds,
            self.discover_replies,
        )
    }
}

impl Default for EngineStats {
    fn default() -> Self {
        Self::new()
    }
}
