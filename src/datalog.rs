//! 계측 데이터 로그
//!
//! 성공한 상태/계측 응답을 탭 구분 레코드로 파일에 기록한다.
//! 레코드: `{unix_time:.2}\t{주소}\t{0|1}\t{watts:.1}` (미상 필드는 빈 칸).
//! 파일 IO는 전용 블로킹 쓰레드가 전담하고 엔진 태스크는 유한 채널로
//! 레코드를 넘기기만 하므로 디스크가 느려도 엔진이 멈추지 않는다.
//! 채널이 가득 차면 레코드를 버리고 경고만 남긴다.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_channel::{bounded, Sender, TrySendError};
use tracing::{info, warn};

use crate::addr::DeviceAddr;

/// 쓰레드로 넘기기 전 대기 가능한 레코드 수
const QUEUE_CAPACITY: usize = 1024;

/// 계측 데이터 로그 파일 핸들
pub struct DataLog {
    tx: Option<Sender<String>>,
    writer: Option<JoinHandle<()>>,
}

impl DataLog {
    /// 로그 파일을 append 모드로 열고 쓰기 쓰레드 시작
    ///
    /// 열기 실패는 호출자 쪽에서 즉시 드러난다.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("데이터 로그 열림: {}", path.display());

        let (tx, rx) = bounded::<String>(QUEUE_CAPACITY);
        let writer = std::thread::spawn(move || write_loop(file, rx));

        Ok(Self {
            tx: Some(tx),
            writer: Some(writer),
        })
    }

    /// 관측 레코드 기록
    ///
    /// 채널이 가득 차면 이번 레코드를 버린다 (엔진을 막지 않는다).
    pub fn log(&self, addr: DeviceAddr, is_on: Option<bool>, watts: Option<f64>) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let line = record_line(now, addr, is_on, watts);

        if let Some(tx) = &self.tx {
            match tx.try_send(line) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("데이터 로그 큐 포화, 레코드 폐기: {}", addr);
                }
                Err(TrySendError::Disconnected(_)) => {
                    warn!("데이터 로그 쓰레드 종료됨, 레코드 폐기: {}", addr);
                }
            }
        }
    }
}

impl Drop for DataLog {
    fn drop(&mut self) {
        // 송신단을 닫아 쓰레드를 끝내고, 남은 레코드가 쓰일 때까지 합류
        self.tx.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

fn write_loop(mut file: File, rx: crossbeam_channel::Receiver<String>) {
    for line in rx {
        if let Err(e) = file.write_all(line.as_bytes()).and_then(|_| file.flush()) {
            warn!("데이터 로그 쓰기 실패: {}", e);
        }
    }
}

/// 레코드 한 줄 구성 (순수 함수, 테스트용으로 분리)
fn record_line(unix_time: f64, addr: DeviceAddr, is_on: Option<bool>, watts: Option<f64>) -> String {
    let on_field = match is_on {
        Some(true) => "1",
        Some(false) => "0",
        None => "",
    };
    let watts_field = match watts {
        Some(w) => format!("{:.1}", w),
        None => String::new(),
    };
    format!("{:.2}\t{}\t{}\t{}\n", unix_time, addr, on_field, watts_field)
}
