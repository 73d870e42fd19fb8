//! 실시간 로그 감시기
//!
//! 대상마다 백그라운드 태스크 하나가 로그 디렉토리를 주기적으로 훑고,
//! 파일별로 마지막으로 읽은 바이트 오프셋 이후의 내용만 읽어 분류합니다.
//! `tail -f`와 유사하며, 파일 알림 대신 메타데이터 폴링을 사용합니다.
//!
//! # 오프셋 규칙
//! - 등록 시 모든 파일을 오프셋 0부터 한 번 읽습니다 (기존 내용 분류).
//! - 마지막 개행까지만 소비합니다. 개행이 없는 꼬리 라인은 다음 주기에 읽습니다.
//! - 파일 크기가 오프셋보다 작거나(truncation) inode가 바뀌면(rotation)
//!   오프셋을 0으로 되돌리고 처음부터 다시 읽습니다.
//! - 오프셋은 메모리에만 있습니다. 재시작하면 처음부터 다시 읽고,
//!   중복은 지문 기반 중복 제거가 흡수합니다.
//!
//! # 사용 예시
//! ```ignore
//! let watcher = LiveWatcher::new(config, classifiers, ingestor);
//! watcher.start_watching("hp-1", ProtocolKind::Ssh, "/var/lib/honeypots/hp-1/logs").await?;
//! // ...
//! watcher.stop_watching("hp-1").await;
//! ```

use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use hivewatch_core::metrics as m;
use hivewatch_core::types::ProtocolKind;

use crate::classifier::ClassifierSet;
use crate::config::WatcherConfig;
use crate::error::IngestError;
use crate::ingestor::{IngestPath, Ingestor};

/// 감시 태스크 종료 대기 시간
const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// 감시 태스크들이 공유하는 구성요소
struct WatchShared {
    config: WatcherConfig,
    classifiers: Arc<ClassifierSet>,
    ingestor: Arc<Ingestor>,
}

/// 감시 중인 대상의 태스크 핸들
struct WatchHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// 파일별 읽기 위치
#[derive(Debug, Default, Clone, Copy)]
struct FileCursor {
    /// 다음에 읽을 바이트 오프셋
    offset: u64,
    /// 마지막으로 본 inode (Unix 전용)
    inode: Option<u64>,
    /// 읽기 한도를 넘은 라인의 나머지를 다음 개행까지 버리는 중
    discard_head: bool,
}

/// 파일 하나를 읽은 결과
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadReport {
    /// 소비한 바이트 수
    pub(crate) bytes: u64,
    /// 분류기에 넘긴 라인 수
    pub(crate) lines: usize,
    /// 새로 저장된 이벤트 수
    pub(crate) accepted: usize,
}

/// 라인 묶음 하나를 처리한 결과
#[derive(Debug, Default)]
struct LineBatch {
    /// 분류기에 넘긴 라인 수
    lines: usize,
    /// 새로 저장된 이벤트 수
    accepted: usize,
    /// 처리가 끝난 바이트 수 (중단된 라인의 시작 위치)
    consumed: usize,
    /// 취소 또는 저장 실패로 중단됨
    interrupted: bool,
}

/// 대상 하나의 감시 상태 -- 감시 태스크만 소유하고 변경합니다.
struct TargetTail {
    target_id: String,
    protocol: ProtocolKind,
    root: PathBuf,
    cursors: HashMap<PathBuf, FileCursor>,
}

impl TargetTail {
    fn new(target_id: String, protocol: ProtocolKind, root: PathBuf) -> Self {
        Self {
            target_id,
            protocol,
            root,
            cursors: HashMap::new(),
        }
    }

    /// 로그 디렉토리 전체를 한 번 훑습니다.
    ///
    /// 파일 하나의 실패는 경고로 남기고 다음 파일로 넘어갑니다.
    async fn scan(&mut self, shared: &WatchShared, cancel: &CancellationToken) -> ReadReport {
        let files = match collect_files(&self.root, &shared.config).await {
            Ok(files) => files,
            Err(e) => {
                warn!(target_id = %self.target_id, error = %e, "failed to list log directory");
                return ReadReport::default();
            }
        };

        // 사라진 파일의 오프셋은 버림
        self.cursors.retain(|path, _| files.contains(path));

        let mut total = ReadReport::default();
        for path in files {
            if cancel.is_cancelled() {
                break;
            }
            match self.read_file(&path, shared, cancel).await {
                Ok(report) => {
                    total.bytes += report.bytes;
                    total.lines += report.lines;
                    total.accepted += report.accepted;
                }
                Err(e) => {
                    warn!(
                        target_id = %self.target_id,
                        path = %path.display(),
                        error = %e,
                        "failed to read log file, retrying next scan"
                    );
                }
            }
        }

        if total.accepted > 0 {
            debug!(
                target_id = %self.target_id,
                lines = total.lines,
                accepted = total.accepted,
                "watcher scan complete"
            );
        }
        total
    }

    /// 한 파일의 오프셋 이후 내용을 읽어 분류합니다.
    async fn read_file(
        &mut self,
        path: &Path,
        shared: &WatchShared,
        cancel: &CancellationToken,
    ) -> Result<ReadReport, IngestError> {
        let metadata = tokio::fs::metadata(path).await?;
        let size = metadata.len();
        let inode = inode_of(&metadata);

        let cursor = self.cursors.entry(path.to_path_buf()).or_default();
        let rotated = cursor.inode.is_some() && inode.is_some() && cursor.inode != inode;
        if rotated || size < cursor.offset {
            warn!(
                target_id = %self.target_id,
                path = %path.display(),
                offset = cursor.offset,
                size,
                rotated,
                "log file truncated or replaced, rescanning from start"
            );
            metrics::counter!(m::WATCHER_FILE_RESETS_TOTAL).increment(1);
            cursor.offset = 0;
            cursor.discard_head = false;
        }
        cursor.inode = inode;

        let mut report = ReadReport::default();
        let mut offset = cursor.offset;
        let mut discard_head = cursor.discard_head;
        if size == offset {
            return Ok(report);
        }

        let mut file = tokio::fs::File::open(path).await?;
        file.seek(SeekFrom::Start(offset)).await?;

        let max_read = shared.config.max_read_bytes as u64;
        loop {
            let capacity = max_read.min(size.saturating_sub(offset)) as usize;
            let mut buf = Vec::with_capacity(capacity);
            let read = (&mut file).take(max_read).read_to_end(&mut buf).await?;
            if read == 0 {
                break;
            }
            let chunk = Bytes::from(buf);

            let consumed = match chunk.iter().rposition(|b| *b == b'\n') {
                Some(last_newline) => last_newline + 1,
                None if chunk.len() as u64 >= max_read => {
                    // 개행 없이 읽기 한도를 넘는 라인은 나머지까지 건너뜀
                    warn!(
                        target_id = %self.target_id,
                        path = %path.display(),
                        bytes = chunk.len(),
                        "line exceeds read limit, skipping"
                    );
                    discard_head = true;
                    offset += chunk.len() as u64;
                    report.bytes += chunk.len() as u64;
                    self.set_cursor(path, offset, discard_head);
                    continue;
                }
                // 아직 완성되지 않은 라인 -- 다음 주기에 다시 읽음
                None => break,
            };

            let start = if std::mem::take(&mut discard_head) {
                chunk.iter().position(|b| *b == b'\n').map_or(0, |i| i + 1)
            } else {
                0
            };

            let lines = chunk.slice(start..consumed);
            let batch = self.process_lines(&lines, shared, cancel).await;
            report.lines += batch.lines;
            report.accepted += batch.accepted;

            let advanced = (start + batch.consumed) as u64;
            offset += advanced;
            report.bytes += advanced;
            self.set_cursor(path, offset, false);
            if batch.interrupted {
                // 중단된 라인부터 다음 주기에 다시 읽음
                return Ok(report);
            }

            if consumed < chunk.len() {
                // 잘린 꼬리 라인부터 다시 읽기
                file.seek(SeekFrom::Start(offset)).await?;
            }
        }

        Ok(report)
    }

    fn set_cursor(&mut self, path: &Path, offset: u64, discard_head: bool) {
        if let Some(cursor) = self.cursors.get_mut(path) {
            cursor.offset = offset;
            cursor.discard_head = discard_head;
        }
    }

    /// 개행으로 끝나는 바이트 묶음을 라인 단위로 분류하고 수집합니다.
    ///
    /// 저장에 실패하거나 취소되면 그 라인 앞에서 멈춥니다.
    async fn process_lines(
        &self,
        chunk: &Bytes,
        shared: &WatchShared,
        cancel: &CancellationToken,
    ) -> LineBatch {
        let classifier = shared.classifiers.for_protocol(&self.protocol);
        let mut batch = LineBatch::default();
        let mut pos = 0;

        while pos < chunk.len() {
            let line_start = pos;
            pos = chunk[pos..]
                .iter()
                .position(|b| *b == b'\n')
                .map_or(chunk.len(), |i| pos + i + 1);
            let raw = &chunk[line_start..pos];
            let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            if raw.is_empty() {
                continue;
            }
            if raw.len() > shared.config.max_line_length {
                debug!(target_id = %self.target_id, len = raw.len(), "line too long, skipped");
                continue;
            }
            let Ok(line) = std::str::from_utf8(raw) else {
                debug!(target_id = %self.target_id, "non-utf8 line skipped");
                continue;
            };

            batch.lines += 1;
            let Some(event) = classifier.classify(&self.target_id, line) else {
                continue;
            };

            // 제거된 대상의 분류 결과는 사용하지 않음
            if cancel.is_cancelled() {
                pos = line_start;
                batch.interrupted = true;
                break;
            }
            match shared.ingestor.ingest(event, IngestPath::Watcher).await {
                Ok(outcome) if outcome.is_accepted() => batch.accepted += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        target_id = %self.target_id,
                        error = %e,
                        "failed to ingest event, retrying from this line next scan"
                    );
                    pos = line_start;
                    batch.interrupted = true;
                    break;
                }
            }
        }

        if batch.lines > 0 {
            metrics::counter!(m::LINES_CLASSIFIED_TOTAL, m::LABEL_PROTOCOL => classifier.protocol())
                .increment(batch.lines as u64);
        }
        batch.consumed = pos;
        batch
    }
}

#[cfg(unix)]
fn inode_of(metadata: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn inode_of(_metadata: &std::fs::Metadata) -> Option<u64> {
    None
}

/// 디렉토리를 재귀적으로 훑어 감시 대상 확장자의 파일을 정렬해 반환합니다.
async fn collect_files(root: &Path, config: &WatcherConfig) -> Result<Vec<PathBuf>, IngestError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if dir == root => {
                return Err(IngestError::Watcher {
                    path: dir.display().to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => {
                debug!(path = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    debug!(path = %dir.display(), error = %e, "directory listing interrupted");
                    break;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() && config.matches_extension(&path) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

/// 실시간 로그 감시기
///
/// 대상별 감시 태스크의 등록/해제를 관리합니다. 대상끼리는 상태를 공유하지 않으며,
/// 한 대상의 해제가 다른 대상의 감시에 영향을 주지 않습니다.
pub struct LiveWatcher {
    shared: Arc<WatchShared>,
    targets: Mutex<HashMap<String, WatchHandle>>,
}

impl LiveWatcher {
    pub fn new(
        config: WatcherConfig,
        classifiers: Arc<ClassifierSet>,
        ingestor: Arc<Ingestor>,
    ) -> Self {
        Self {
            shared: Arc::new(WatchShared {
                config,
                classifiers,
                ingestor,
            }),
            targets: Mutex::new(HashMap::new()),
        }
    }

    /// 대상 감시를 시작합니다.
    ///
    /// 로그 디렉토리가 없으면 생성하고, 기존 파일 전체를 한 번 분류한 뒤 반환합니다.
    /// 이미 감시 중이면 아무것도 하지 않고 `false`를 반환합니다.
    pub async fn start_watching(
        &self,
        target_id: &str,
        protocol: ProtocolKind,
        log_location: impl AsRef<Path>,
    ) -> Result<bool, IngestError> {
        let root = log_location.as_ref().to_path_buf();
        let ready = {
            let mut targets = self.targets.lock().await;
            if targets.contains_key(target_id) {
                debug!(target_id, "target already watched");
                return Ok(false);
            }

            tokio::fs::create_dir_all(&root)
                .await
                .map_err(|e| IngestError::Watcher {
                    path: root.display().to_string(),
                    reason: e.to_string(),
                })?;

            let cancel = CancellationToken::new();
            let (ready_tx, ready_rx) = oneshot::channel();
            let mut tail = TargetTail::new(target_id.to_owned(), protocol.clone(), root.clone());
            let shared = Arc::clone(&self.shared);
            let task_cancel = cancel.clone();

            let task = tokio::spawn(async move {
                let initial = tail.scan(&shared, &task_cancel).await;
                let _ = ready_tx.send(initial);

                let interval = shared.config.scan_interval();
                loop {
                    tokio::select! {
                        _ = task_cancel.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {
                            tail.scan(&shared, &task_cancel).await;
                        }
                    }
                }
                debug!(target_id = %tail.target_id, "watch task stopped");
            });

            targets.insert(target_id.to_owned(), WatchHandle { cancel, task });
            metrics::gauge!(m::WATCHED_TARGETS).set(targets.len() as f64);
            ready_rx
        };

        let initial = ready.await.unwrap_or_default();
        info!(
            target_id,
            protocol = %protocol,
            path = %root.display(),
            lines = initial.lines,
            accepted = initial.accepted,
            "watching target"
        );
        Ok(true)
    }

    /// 대상 감시를 중지합니다. 감시 중이 아니었으면 `false`를 반환합니다.
    pub async fn stop_watching(&self, target_id: &str) -> bool {
        let handle = {
            let mut targets = self.targets.lock().await;
            let handle = targets.remove(target_id);
            metrics::gauge!(m::WATCHED_TARGETS).set(targets.len() as f64);
            handle
        };

        match handle {
            Some(handle) => {
                Self::join(target_id, handle).await;
                info!(target_id, "stopped watching target");
                true
            }
            None => false,
        }
    }

    /// 모든 대상의 감시를 중지합니다.
    pub async fn stop_all(&self) {
        let handles: Vec<(String, WatchHandle)> = {
            let mut targets = self.targets.lock().await;
            metrics::gauge!(m::WATCHED_TARGETS).set(0.0);
            targets.drain().collect()
        };

        for (_, handle) in &handles {
            handle.cancel.cancel();
        }
        for (target_id, handle) in handles {
            Self::join(&target_id, handle).await;
        }
    }

    async fn join(target_id: &str, mut handle: WatchHandle) {
        handle.cancel.cancel();
        if tokio::time::timeout(TASK_STOP_TIMEOUT, &mut handle.task)
            .await
            .is_err()
        {
            warn!(target_id, "watch task did not stop in time, aborting");
            handle.task.abort();
        }
    }

    /// 대상이 감시 중인지 확인합니다.
    pub async fn is_watching(&self, target_id: &str) -> bool {
        self.targets.lock().await.contains_key(target_id)
    }

    /// 감시 중인 대상 수
    pub async fn watched_count(&self) -> usize {
        self.targets.lock().await.len()
    }
}
