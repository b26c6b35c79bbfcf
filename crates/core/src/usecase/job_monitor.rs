use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::domain::error::{MonitorError, MonitorErrorKind};
use crate::domain::job::{normalize_topics, Job, JobStatus};
use crate::domain::settings::ClientSettings;
use crate::domain::types::{JobHandle, JobSnapshot, Segment};
use crate::infra::metrics::Metrics;
use crate::infra::transcription::TranscriptionService;

/// Job Monitor: 1 件の書き起こしジョブを投入から結果取得まで追跡する。
///
/// アクティブなジョブは常に高々 1 件。新しい `submit` や `cancel` は世代番号を
/// 進め、古い世代に属する通信応答は到着しても状態を変更しない。
pub struct JobMonitor {
    shared: Arc<Shared>,
}

struct Shared {
    service: Arc<dyn TranscriptionService>,
    metrics: Arc<Metrics>,
    poll_interval: Duration,
    state: Mutex<MonitorState>,
    snapshot_tx: watch::Sender<Option<JobSnapshot>>,
}

#[derive(Default)]
struct MonitorState {
    generation: u64,
    active: Option<ActiveJob>,
}

struct ActiveJob {
    job: Job,
    /// false になったジョブは表示用に残るだけで、以後の通信は行わない
    monitoring: bool,
    last_error: Option<MonitorError>,
    poll_in_flight: bool,
    fetch_in_flight: bool,
    timer: Option<JoinHandle<()>>,
}

impl ActiveJob {
    fn snapshot(&self) -> JobSnapshot {
        JobSnapshot::from_job(&self.job, self.last_error.clone(), self.fetch_in_flight)
    }

    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl MonitorState {
    /// 世代と job id が一致し、監視中のジョブを取り出す
    fn claim(&mut self, generation: u64, job_id: &str) -> Result<&mut ActiveJob, MonitorError> {
        if self.generation != generation {
            return Err(MonitorError::superseded(job_id));
        }
        let Some(active) = self.active.as_mut().filter(|a| a.job.id() == job_id) else {
            return Err(MonitorError::contract_violation(format!(
                "job {job_id} はこのモニターで監視されていません"
            )));
        };
        if !active.monitoring {
            return Err(MonitorError::superseded(job_id));
        }
        Ok(active)
    }

    /// 現在のジョブの監視を止める（タイマーは同期的に破棄）
    fn detach(&mut self) {
        self.generation += 1;
        if let Some(active) = self.active.as_mut() {
            active.stop_timer();
            active.monitoring = false;
            active.poll_in_flight = false;
            active.fetch_in_flight = false;
        }
    }
}

impl JobMonitor {
    pub fn new(
        service: Arc<dyn TranscriptionService>,
        poll_interval: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                service,
                metrics,
                poll_interval,
                state: Mutex::new(MonitorState::default()),
                snapshot_tx,
            }),
        }
    }

    pub fn from_settings(service: Arc<dyn TranscriptionService>, settings: &ClientSettings) -> Self {
        Self::new(service, settings.poll_interval(), Arc::new(Metrics::new()))
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.shared.metrics
    }

    pub fn poll_interval(&self) -> Duration {
        self.shared.poll_interval
    }

    /// 現在のジョブのスナップショット
    pub fn snapshot(&self) -> Option<JobSnapshot> {
        self.shared.state.lock().active.as_ref().map(ActiveJob::snapshot)
    }

    /// 状態変化ごとに更新されるスナップショットの購読
    pub fn subscribe(&self) -> watch::Receiver<Option<JobSnapshot>> {
        self.shared.snapshot_tx.subscribe()
    }

    /// ポーリングタイマーが生きているか
    pub fn is_polling(&self) -> bool {
        self.shared
            .state
            .lock()
            .active
            .as_ref()
            .and_then(|a| a.timer.as_ref())
            .is_some_and(|t| !t.is_finished())
    }

    /// ジョブを投入する。既存の監視は通信前に停止する。
    ///
    /// 失敗時はモニターの状態を変えない（以前のジョブは表示用に残るが、監視は再開しない）。
    pub async fn submit<I, S>(&self, source_url: &str, topics: I) -> Result<JobHandle, MonitorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let source_url = source_url.trim();
        if source_url.is_empty() {
            let err = MonitorError::submission("動画 URL が空です");
            self.shared.metrics.inc_error(err.kind);
            return Err(err);
        }
        let topics = normalize_topics(topics);

        let generation = {
            let mut state = self.shared.state.lock();
            state.detach();
            self.shared.publish(&state);
            state.generation
        };

        let started = Instant::now();
        let created = self.shared.service.create_job(source_url, &topics).await;
        self.shared
            .metrics
            .record_latency("submit", started.elapsed().as_millis() as u64);

        let job_id = match created {
            Ok(job_id) => job_id,
            Err(e) => {
                let err = MonitorError::submission(format!("ジョブの作成に失敗しました: {e}"));
                log::warn!("submission of {source_url} failed: {e}");
                self.shared.metrics.inc_error(err.kind);
                return Err(err);
            }
        };

        let mut state = self.shared.state.lock();
        if state.generation != generation {
            // 作成中に別の submit / cancel が割り込んだ
            log::info!("job {job_id} created after being superseded; ignoring");
            return Err(MonitorError::superseded(&job_id));
        }

        log::info!(
            "job {job_id} submitted for {source_url} ({} topic(s))",
            topics.len()
        );
        self.shared.metrics.inc_jobs_submitted();

        let timer = tokio::spawn(run_poll_loop(
            Arc::clone(&self.shared),
            generation,
            job_id.clone(),
        ));
        state.active = Some(ActiveJob {
            job: Job::new(job_id.clone(), source_url.to_string(), topics),
            monitoring: true,
            last_error: None,
            poll_in_flight: false,
            fetch_in_flight: false,
            timer: Some(timer),
        });
        self.shared.publish(&state);

        Ok(JobHandle { job_id })
    }

    /// ステータスを 1 回問い合わせる。
    ///
    /// 終端状態のジョブには問い合わせず、現在のスナップショットを返す。
    /// Completed を初めて観測した呼び出しだけが結果取得を 1 回行う。
    pub async fn poll_once(&self, job_id: &str) -> Result<JobSnapshot, MonitorError> {
        let generation = self.shared.state.lock().generation;
        match self.shared.poll(generation, job_id).await? {
            PollOutcome::Polled(snapshot) => Ok(snapshot),
            PollOutcome::Busy => Err(MonitorError::contract_violation(format!(
                "job {job_id} のポーリングは既に実行中です"
            ))),
        }
    }

    /// 完了済みジョブの結果を取得する（手動リトライ用）
    pub async fn fetch_result<I, S>(&self, job_id: &str, topics: I) -> Result<Vec<Segment>, MonitorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let topics = normalize_topics(topics);
        let generation = {
            let mut state = self.shared.state.lock();
            let generation = state.generation;
            let active = state.claim(generation, job_id)?;

            if active.job.status() != JobStatus::Completed {
                let err = MonitorError::contract_violation(format!(
                    "job {job_id} は {} 状態のため結果を取得できません",
                    active.job.status().as_str()
                ));
                log::error!("{err}");
                self.shared.metrics.inc_error(err.kind);
                return Err(err);
            }
            if active.fetch_in_flight {
                return Err(MonitorError::contract_violation(format!(
                    "job {job_id} の結果取得は既に実行中です"
                )));
            }
            active.fetch_in_flight = true;
            self.shared.publish(&state);
            generation
        };

        self.shared.fetch(generation, job_id, topics).await
    }

    /// 監視を停止し、現在のジョブを破棄する。何も無ければ何もしない。
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        state.detach();
        if let Some(active) = state.active.take() {
            log::info!("monitoring of job {} cancelled", active.job.id());
        }
        self.shared.publish(&state);
    }
}

impl Drop for JobMonitor {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Shared {
    fn publish(&self, state: &MonitorState) {
        self.snapshot_tx
            .send_replace(state.active.as_ref().map(ActiveJob::snapshot));
    }

    async fn poll(&self, generation: u64, job_id: &str) -> Result<PollOutcome, MonitorError> {
        {
            let mut state = self.state.lock();
            let active = state.claim(generation, job_id)?;
            if active.job.status().is_terminal() {
                return Ok(PollOutcome::Polled(active.snapshot()));
            }
            if active.poll_in_flight {
                return Ok(PollOutcome::Busy);
            }
            active.poll_in_flight = true;
        }
        let mut in_flight = InFlightGuard::new(self, generation, job_id, InFlight::Poll);

        self.metrics.inc_polls_sent();
        let started = Instant::now();
        let polled = self.service.job_status(job_id).await;
        self.metrics
            .record_latency("poll", started.elapsed().as_millis() as u64);

        let (snapshot, fetch_topics) = {
            let mut state = self.state.lock();
            in_flight.disarm();
            let active = match state.claim(generation, job_id) {
                Ok(active) => active,
                Err(e) => {
                    log::debug!("discarding status for job {job_id}: {e}");
                    return Err(e);
                }
            };
            active.poll_in_flight = false;

            let report = match polled {
                Ok(report) => report,
                Err(e) => {
                    let err = MonitorError::poll(format!("status poll for job {job_id} failed: {e}"));
                    log::warn!("{err}");
                    self.metrics.inc_error(err.kind);
                    active.last_error = Some(err.clone());
                    self.publish(&state);
                    return Err(err);
                }
            };
            log::debug!(
                "job {job_id}: {} {}%",
                report.status.as_str(),
                report.progress
            );

            let transition = match active.job.apply_report(&report) {
                Ok(transition) => transition,
                Err(violation) => {
                    log::error!("{violation}");
                    self.metrics.inc_error(violation.kind);
                    active.last_error = Some(violation.clone());
                    self.publish(&state);
                    return Err(violation);
                }
            };

            if active
                .last_error
                .as_ref()
                .is_some_and(|e| e.kind == MonitorErrorKind::Poll)
            {
                active.last_error = None;
            }

            if transition.changed() {
                log::info!(
                    "job {job_id}: {} -> {}",
                    transition.prev_status.as_str(),
                    transition.new_status.as_str()
                );
                if transition.new_status == JobStatus::Failed {
                    self.metrics.inc_jobs_failed();
                    log::warn!(
                        "job {job_id} failed: {}",
                        active.job.message().unwrap_or("no message")
                    );
                }
            }

            let mut fetch_topics = None;
            if transition.completed_edge {
                self.metrics.inc_jobs_completed();
                active.fetch_in_flight = true;
                fetch_topics = Some(active.job.topics().to_vec());
            }

            let snapshot = active.snapshot();
            self.publish(&state);
            (snapshot, fetch_topics)
        };

        let Some(topics) = fetch_topics else {
            return Ok(PollOutcome::Polled(snapshot));
        };

        match self.fetch(generation, job_id, topics).await {
            Ok(_) => {}
            Err(e) if e.kind == MonitorErrorKind::Superseded => return Err(e),
            // 取得失敗はスナップショットの last_error に残る
            Err(_) => {}
        }
        let state = self.state.lock();
        Ok(PollOutcome::Polled(
            state
                .active
                .as_ref()
                .filter(|a| a.job.id() == job_id)
                .map(ActiveJob::snapshot)
                .unwrap_or(snapshot),
        ))
    }

    /// 結果取得。呼び出し前に fetch_in_flight が立っていること。
    async fn fetch(&self, generation: u64, job_id: &str, topics: Vec<String>) -> Result<Vec<Segment>, MonitorError> {
        let mut in_flight = InFlightGuard::new(self, generation, job_id, InFlight::Fetch);
        let started = Instant::now();
        let fetched = self.service.filtered_result(job_id, &topics).await;
        self.metrics
            .record_latency("fetch", started.elapsed().as_millis() as u64);

        let mut state = self.state.lock();
        in_flight.disarm();
        let active = match state.claim(generation, job_id) {
            Ok(active) => active,
            Err(e) => {
                log::debug!("discarding result for job {job_id}: {e}");
                return Err(e);
            }
        };
        active.fetch_in_flight = false;

        let result = match fetched {
            Ok(segments) => active.job.replace_segments(segments.clone()).map(|()| {
                log::info!("job {job_id}: {} segment(s) fetched", segments.len());
                self.metrics.inc_results_fetched();
                active.last_error = None;
                segments
            }),
            Err(e) => {
                let err = MonitorError::fetch(format!("result fetch for job {job_id} failed: {e}"));
                log::warn!("{err}");
                Err(err)
            }
        };
        if let Err(err) = &result {
            self.metrics.inc_error(err.kind);
            active.last_error = Some(err.clone());
        }
        self.publish(&state);
        result
    }
}

enum PollOutcome {
    Polled(JobSnapshot),
    /// 別の問い合わせが実行中のため送らなかった
    Busy,
}

#[derive(Debug, Clone, Copy)]
enum InFlight {
    Poll,
    Fetch,
}

/// 通信中フラグの後始末。
///
/// 呼び出し側が future を途中で破棄した場合、Drop で同じ世代のフラグを下ろす。
/// 応答を処理する側はロック取得直後に `disarm` する。
struct InFlightGuard<'a> {
    shared: &'a Shared,
    generation: u64,
    job_id: &'a str,
    flag: InFlight,
    armed: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(shared: &'a Shared, generation: u64, job_id: &'a str, flag: InFlight) -> Self {
        Self {
            shared,
            generation,
            job_id,
            flag,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.shared.state.lock();
        let Ok(active) = state.claim(self.generation, self.job_id) else {
            return;
        };
        match self.flag {
            InFlight::Poll => active.poll_in_flight = false,
            InFlight::Fetch => {
                active.fetch_in_flight = false;
                // 結果は未取得のまま。手動リトライの対象になる
                active.last_error = Some(MonitorError::fetch(format!(
                    "result fetch for job {} was abandoned by the caller",
                    self.job_id
                )));
            }
        }
        log::debug!(
            "job {}: {:?} request dropped before completion",
            self.job_id,
            self.flag
        );
        self.shared.publish(&state);
    }
}

/// ポーリングタイマー: 非終端の間、一定間隔で poll を繰り返す。
/// 最初の問い合わせは job id 確定直後に行う。
async fn run_poll_loop(shared: Arc<Shared>, generation: u64, job_id: String) {
    let mut delay = Duration::ZERO;
    loop {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match shared.poll(generation, &job_id).await {
            Ok(PollOutcome::Polled(snapshot)) if snapshot.status.is_terminal() => break,
            Ok(PollOutcome::Polled(_)) => {}
            // 手動の poll_once が実行中。このティックは見送る
            Ok(PollOutcome::Busy) => {
                log::debug!("job {job_id}: poll already in flight, skipping tick");
            }
            // 一時的な失敗は次のティックで再試行
            Err(e) if e.kind == MonitorErrorKind::Poll => {}
            Err(e) => {
                log::debug!("poll loop for job {job_id} stopped: {e}");
                break;
            }
        }
        delay = shared.poll_interval;
    }
}
