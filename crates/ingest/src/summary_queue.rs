use std::sync::{Arc, RwLock};
use std::time::Duration;

use common::{Store, SummaryConfig, SummaryJob};
use content_fetcher::ArticleSource;
use summarizer::{parse_summary_response, Summarizer};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const JOB_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Queue at capacity; the job was dropped and will be rediscovered later.
    Full,
    Closed,
}

/// Producer side of the bounded summary queue. Enqueueing never waits.
pub struct SummaryQueue {
    sender: RwLock<Option<mpsc::Sender<SummaryJob>>>,
}

impl SummaryQueue {
    pub fn bounded(capacity: usize) -> (Arc<Self>, mpsc::Receiver<SummaryJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            sender: RwLock::new(Some(tx)),
        };
        (Arc::new(queue), rx)
    }

    pub fn try_enqueue(&self, job: SummaryJob) -> EnqueueOutcome {
        let guard = self.sender.read().unwrap_or_else(|p| p.into_inner());
        let Some(sender) = guard.as_ref() else {
            debug!("Summary queue closed, dropping story {}", job.story_id);
            return EnqueueOutcome::Closed;
        };

        let story_id = job.story_id;
        match sender.try_send(job) {
            Ok(()) => {
                debug!("Queued story {} for summarization", story_id);
                EnqueueOutcome::Queued
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Summary queue full, skipping story {}", story_id);
                EnqueueOutcome::Full
            }
            Err(mpsc::error::TrySendError::Closed(_)) => EnqueueOutcome::Closed,
        }
    }

    /// Stops accepting jobs. Workers finish whatever is already queued.
    pub fn close(&self) {
        self.sender.write().unwrap_or_else(|p| p.into_inner()).take();
    }
}

/// One permit per period, shared by every summary worker.
pub struct RateGate {
    ticks: Mutex<Interval>,
}

impl RateGate {
    /// Must be called from inside a Tokio runtime.
    pub fn new(period: Duration) -> Self {
        let mut ticks = tokio::time::interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticks: Mutex::new(ticks),
        }
    }

    pub async fn wait(&self) {
        self.ticks.lock().await.tick().await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Saved { topics: usize },
    FetchFailed,
    ContentTooShort,
    SummaryFailed,
    SaveFailed,
    Cancelled,
}

/// Fetch, summarize and persist a single story.
pub struct SummaryJobRunner {
    fetcher: Arc<dyn ArticleSource>,
    summarizer: Arc<dyn Summarizer>,
    store: Arc<dyn Store>,
    min_content_chars: usize,
    max_content_chars: usize,
    job_timeout: Duration,
}

impl SummaryJobRunner {
    pub fn new(
        fetcher: Arc<dyn ArticleSource>,
        summarizer: Arc<dyn Summarizer>,
        store: Arc<dyn Store>,
        config: &SummaryConfig,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            store,
            min_content_chars: config.min_content_chars,
            max_content_chars: config.max_content_chars,
            job_timeout: JOB_TIMEOUT,
        }
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub async fn run(&self, job: &SummaryJob, cancel: &CancellationToken) -> JobOutcome {
        info!("Generating summary for story {}: {}", job.story_id, job.title);

        let article = tokio::select! {
            _ = cancel.cancelled() => return JobOutcome::Cancelled,
            fetched = self.fetcher.fetch_article(&job.url) => fetched,
        };
        let article = match article {
            Ok(article) => article,
            Err(e) => {
                warn!("Failed to fetch article for story {} ({}): {}", job.story_id, job.url, e);
                return JobOutcome::FetchFailed;
            }
        };

        let length = article.content.chars().count();
        if length < self.min_content_chars {
            info!(
                "Content too short for story {} ({} chars), skipping summary",
                job.story_id, length
            );
            return JobOutcome::ContentTooShort;
        }

        let text = truncate_chars(&article.content, self.max_content_chars);
        let job_cancel = cancel.child_token();
        let generated = tokio::time::timeout(
            self.job_timeout,
            self.summarizer.generate_summary(&job.title, &text, &job_cancel),
        )
        .await;
        job_cancel.cancel();

        let raw = match generated {
            Ok(Ok(raw)) => raw,
            Ok(Err(common::CrawlerError::Cancelled)) => return JobOutcome::Cancelled,
            Ok(Err(e)) => {
                error!(
                    "{} failed to summarize story {}: {}",
                    self.summarizer.name(),
                    job.story_id,
                    e
                );
                return JobOutcome::SummaryFailed;
            }
            Err(_) => {
                error!(
                    "Summarizing story {} timed out after {:?}",
                    job.story_id, self.job_timeout
                );
                return JobOutcome::SummaryFailed;
            }
        };

        let parsed = parse_summary_response(&raw);
        if let Err(e) = self
            .store
            .update_story_summary_and_topics(job.story_id, &parsed.summary, &parsed.topics)
            .await
        {
            error!("Failed to save summary for story {}: {}", job.story_id, e);
            return JobOutcome::SaveFailed;
        }

        info!(
            "Saved summary for story {} ({} topics)",
            job.story_id,
            parsed.topics.len()
        );
        JobOutcome::Saved {
            topics: parsed.topics.len(),
        }
    }
}

/// Keeps at most `max_chars` characters, marking the cut with "...".
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Handles for the running summary workers.
pub struct SummaryWorkers {
    tasks: JoinSet<()>,
}

impl SummaryWorkers {
    pub fn spawn(
        count: usize,
        receiver: mpsc::Receiver<SummaryJob>,
        gate: Arc<RateGate>,
        runner: Arc<SummaryJobRunner>,
        cancel: CancellationToken,
    ) -> Self {
        let receiver = Arc::new(Mutex::new(receiver));
        let mut tasks = JoinSet::new();

        for worker_id in 0..count.max(1) {
            let receiver = receiver.clone();
            let gate = gate.clone();
            let runner = runner.clone();
            let cancel = cancel.clone();

            tasks.spawn(async move {
                debug!("Summary worker {} started", worker_id);
                loop {
                    let next = {
                        let mut receiver = receiver.lock().await;
                        tokio::select! {
                            _ = cancel.cancelled() => None,
                            job = receiver.recv() => job,
                        }
                    };
                    let Some(job) = next else { break };

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = gate.wait() => {}
                    }

                    if runner.run(&job, &cancel).await == JobOutcome::Cancelled {
                        break;
                    }
                }
                debug!("Summary worker {} stopped", worker_id);
            });
        }

        Self { tasks }
    }

    /// Waits for every worker to exit. Call after closing the queue or
    /// cancelling, otherwise this never returns.
    pub async fn drain(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                error!("Summary worker panicked: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{long_text, stored_story, FakeFetcher, FakeSummarizer, SUMMARY_RESPONSE};
    use common::MemoryStore;

    fn job(id: i64) -> SummaryJob {
        SummaryJob {
            story_id: id,
            url: format!("https://example.com/{id}"),
            title: format!("Story {id}"),
        }
    }

    fn runner(
        fetcher: FakeFetcher,
        summarizer: Arc<FakeSummarizer>,
        store: Arc<MemoryStore>,
    ) -> SummaryJobRunner {
        SummaryJobRunner::new(Arc::new(fetcher), summarizer, store, &SummaryConfig::default())
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé...");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[tokio::test]
    async fn full_queue_rejects_without_waiting() {
        let (queue, mut rx) = SummaryQueue::bounded(1);

        assert_eq!(queue.try_enqueue(job(1)), EnqueueOutcome::Queued);
        assert_eq!(queue.try_enqueue(job(2)), EnqueueOutcome::Full);

        queue.close();
        assert_eq!(queue.try_enqueue(job(3)), EnqueueOutcome::Closed);
        assert_eq!(rx.recv().await, Some(job(1)));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn saves_parsed_summary() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_story(&stored_story(7, Some(1))).await.unwrap();
        let summarizer = Arc::new(FakeSummarizer::new(SUMMARY_RESPONSE));
        let runner = runner(FakeFetcher::with_content(long_text()), summarizer, store.clone());

        let outcome = runner.run(&job(7), &CancellationToken::new()).await;

        assert_eq!(outcome, JobOutcome::Saved { topics: 1 });
        let story = store.get_story(7).await.unwrap().unwrap();
        assert_eq!(story.summary.as_deref(), Some("- a\n- b"));
        assert_eq!(story.topics, Some(vec!["rust".to_string()]));
    }

    #[tokio::test]
    async fn short_content_is_abandoned() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_story(&stored_story(7, None)).await.unwrap();
        let summarizer = Arc::new(FakeSummarizer::new(SUMMARY_RESPONSE));
        let runner = runner(FakeFetcher::with_content("tiny"), summarizer.clone(), store.clone());

        let outcome = runner.run(&job(7), &CancellationToken::new()).await;

        assert_eq!(outcome, JobOutcome::ContentTooShort);
        assert!(summarizer.call_times().is_empty());
        assert!(!store.get_story(7).await.unwrap().unwrap().has_summary());
    }

    #[tokio::test]
    async fn fetch_failure_is_abandoned() {
        let store = Arc::new(MemoryStore::new());
        let summarizer = Arc::new(FakeSummarizer::new(SUMMARY_RESPONSE));
        let runner = runner(FakeFetcher::failing(), summarizer.clone(), store);

        assert_eq!(
            runner.run(&job(7), &CancellationToken::new()).await,
            JobOutcome::FetchFailed
        );
        assert!(summarizer.call_times().is_empty());
    }

    #[tokio::test]
    async fn long_content_is_truncated_before_summarizing() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_story(&stored_story(7, None)).await.unwrap();
        let summarizer = Arc::new(FakeSummarizer::new(SUMMARY_RESPONSE));
        let runner = runner(
            FakeFetcher::with_content("x".repeat(25_000)),
            summarizer.clone(),
            store,
        );

        runner.run(&job(7), &CancellationToken::new()).await;

        assert_eq!(summarizer.input_lengths(), vec![20_003]);
    }

    #[tokio::test(start_paused = true)]
    async fn workers_share_one_rate_limit() {
        let store = Arc::new(MemoryStore::new());
        for id in 1..=6 {
            store.upsert_story(&stored_story(id, None)).await.unwrap();
        }
        let summarizer = Arc::new(FakeSummarizer::new(SUMMARY_RESPONSE));
        let runner = Arc::new(runner(
            FakeFetcher::with_content(long_text()),
            summarizer.clone(),
            store.clone(),
        ));
        let period = Duration::from_secs(5);
        let (queue, rx) = SummaryQueue::bounded(10);
        for id in 1..=6 {
            assert_eq!(queue.try_enqueue(job(id)), EnqueueOutcome::Queued);
        }
        queue.close();

        let started = tokio::time::Instant::now();
        let workers = SummaryWorkers::spawn(
            3,
            rx,
            Arc::new(RateGate::new(period)),
            runner,
            CancellationToken::new(),
        );
        workers.drain().await;

        let mut calls = summarizer.call_times();
        calls.sort();
        assert_eq!(calls.len(), 6);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= period);
        }
        assert!(calls[5] - started >= period * 5);
        for id in 1..=6 {
            assert!(store.get_story(id).await.unwrap().unwrap().has_summary());
        }
    }

    #[tokio::test]
    async fn cancellation_stops_idle_workers() {
        let store = Arc::new(MemoryStore::new());
        let summarizer = Arc::new(FakeSummarizer::new(SUMMARY_RESPONSE));
        let runner = Arc::new(runner(FakeFetcher::with_content(long_text()), summarizer, store));
        let (_queue, rx) = SummaryQueue::bounded(4);
        let cancel = CancellationToken::new();

        let workers = SummaryWorkers::spawn(
            2,
            rx,
            Arc::new(RateGate::new(Duration::from_secs(5))),
            runner,
            cancel.clone(),
        );
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), workers.drain())
            .await
            .expect("workers should exit once cancelled");
    }
}
