//! Poll Loop Implementation

use alert_feed::{parse_snapshot, SnapshotFetcher};
use alerting::{AreaStatus, StateTracker};
use bus_publisher::{publish_event, EventPublisher, Topics};
use chrono::Utc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the poll loop
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Sleep between the end of one cycle and the start of the next
    pub poll_interval: Duration,
    /// Upper bound on a single fetch
    pub fetch_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

/// Where the loop currently is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Fetching,
    Processing,
    Sleeping,
}

/// Result of one poll cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Fetch failed or timed out, state untouched
    FetchFailed,
    /// Payload could not be read as an alert list, state untouched
    Malformed,
    /// Snapshot applied
    Processed {
        events: usize,
        publish_failures: usize,
    },
}

/// Poll loop for one monitored area
///
/// Cycles never overlap: a slow cycle pushes the next one back rather than
/// running alongside it.
pub struct PollLoop<F, P> {
    fetcher: F,
    publisher: P,
    topics: Topics,
    tracker: StateTracker,
    config: SchedulerConfig,
    phase: PollPhase,
    cycles: u64,
}

impl<F, P> PollLoop<F, P>
where
    F: SnapshotFetcher,
    P: EventPublisher,
{
    /// Create a new poll loop
    pub fn new(
        fetcher: F,
        publisher: P,
        tracker: StateTracker,
        topics: Topics,
        config: SchedulerConfig,
    ) -> Self {
        info!(
            "Poll loop created for {} (interval {}s)",
            tracker.target_area(),
            config.poll_interval.as_secs()
        );

        Self {
            fetcher,
            publisher,
            topics,
            tracker,
            config,
            phase: PollPhase::Idle,
            cycles: 0,
        }
    }

    /// Run a single fetch, parse, track, publish cycle
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.phase = PollPhase::Fetching;

        let fetched = tokio::time::timeout(self.config.fetch_timeout, self.fetcher.fetch()).await;
        let payload = match fetched {
            Ok(Ok(payload)) => payload,
            Ok(Err(e)) => {
                warn!("Failed to fetch alerts, will retry next cycle: {}", e);
                return CycleOutcome::FetchFailed;
            }
            Err(_) => {
                warn!(
                    "Alert feed did not answer within {}ms, will retry next cycle",
                    self.config.fetch_timeout.as_millis()
                );
                return CycleOutcome::FetchFailed;
            }
        };

        self.phase = PollPhase::Processing;

        let snapshot = parse_snapshot(&payload);
        if snapshot.malformed {
            warn!(
                "Failed to parse alerts payload ({} bytes), keeping state {}",
                payload.len(),
                self.tracker.status()
            );
            return CycleOutcome::Malformed;
        }

        let events = self.tracker.observe(&snapshot.records, Utc::now());

        let mut publish_failures = 0;
        for event in &events {
            if let Err(e) = publish_event(&self.publisher, &self.topics, event).await {
                error!("Failed to publish {} event for {}: {}", event.kind, event.area, e);
                publish_failures += 1;
            }
        }

        CycleOutcome::Processed {
            events: events.len(),
            publish_failures,
        }
    }

    /// Run cycles until `shutdown` is cancelled
    ///
    /// Shutdown is only honoured between cycles; an in-flight fetch or
    /// publish runs to completion or timeout first.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!("Starting Red Alert Monitor");
        info!("Target area: {}", self.tracker.target_area());
        info!("Poll interval: {} seconds", self.config.poll_interval.as_secs());

        while !shutdown.is_cancelled() {
            let outcome = self.run_cycle().await;
            self.cycles += 1;
            debug!("Cycle {} finished: {:?}", self.cycles, outcome);

            self.phase = PollPhase::Sleeping;
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        self.phase = PollPhase::Idle;
        info!("Red Alert Monitor stopped after {} cycles", self.cycles);
    }

    /// Current phase
    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Current status of the monitored area
    pub fn status(&self) -> AreaStatus {
        self.tracker.status()
    }

    /// Number of completed cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Give back the publisher, e.g. to disconnect it
    pub fn into_publisher(self) -> P {
        self.publisher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_feed::FeedError;
    use async_trait::async_trait;
    use bus_publisher::PublishError;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    const AREA: &str = "רחובות";

    /// Returns scripted responses, then empty payloads
    #[derive(Default)]
    struct ScriptedFetcher {
        responses: Mutex<VecDeque<Result<Vec<u8>, FeedError>>>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<Vec<u8>, FeedError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl SnapshotFetcher for ScriptedFetcher {
        async fn fetch(&self) -> Result<Vec<u8>, FeedError> {
            self.responses.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    /// Never answers
    struct HangingFetcher;

    #[async_trait]
    impl SnapshotFetcher for HangingFetcher {
        async fn fetch(&self) -> Result<Vec<u8>, FeedError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[derive(Default, Clone)]
    struct RecordingPublisher {
        sent: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingPublisher {
        fn topics(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish(&self, topic: &str, _payload: Vec<u8>) -> Result<(), PublishError> {
            if self.fail {
                return Err(PublishError::Publish("broker unreachable".to_string()));
            }
            self.sent.lock().unwrap().push(topic.to_string());
            Ok(())
        }
    }

    fn alert(category: i64) -> Result<Vec<u8>, FeedError> {
        Ok(format!(
            r#"[{{"alertDate": "2024-04-14 01:42:13", "title": "t", "data": "{}", "category": {}}}]"#,
            AREA, category
        )
        .into_bytes())
    }

    fn poll_loop<F: SnapshotFetcher>(fetcher: F, publisher: RecordingPublisher) -> PollLoop<F, RecordingPublisher> {
        PollLoop::new(
            fetcher,
            publisher,
            StateTracker::new(AREA),
            Topics::default(),
            SchedulerConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_prewarning_active_all_clear_cycle() {
        let publisher = RecordingPublisher::default();
        let fetcher = ScriptedFetcher::new(vec![alert(14), alert(1), alert(1), Ok(Vec::new())]);
        let mut poll = poll_loop(fetcher, publisher.clone());

        for _ in 0..4 {
            poll.run_cycle().await;
        }

        assert_eq!(
            publisher.topics(),
            vec!["redalert/prewarning", "redalert/active", "redalert/allclear"]
        );
        assert_eq!(poll.status(), AreaStatus::Clear);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_active_state() {
        let publisher = RecordingPublisher::default();
        let fetcher = ScriptedFetcher::new(vec![alert(1), Err(FeedError::Timeout(10_000))]);
        let mut poll = poll_loop(fetcher, publisher.clone());

        poll.run_cycle().await;
        assert_eq!(poll.status(), AreaStatus::Active);

        assert_eq!(poll.run_cycle().await, CycleOutcome::FetchFailed);
        assert_eq!(poll.status(), AreaStatus::Active);
        assert_eq!(publisher.topics(), vec!["redalert/active"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_is_fetch_failure() {
        let mut poll = poll_loop(HangingFetcher, RecordingPublisher::default());
        assert_eq!(poll.run_cycle().await, CycleOutcome::FetchFailed);
        assert_eq!(poll.status(), AreaStatus::Clear);
    }

    #[tokio::test]
    async fn test_malformed_payload_keeps_state() {
        let publisher = RecordingPublisher::default();
        let fetcher = ScriptedFetcher::new(vec![alert(1), Ok(b"<html>blocked</html>".to_vec())]);
        let mut poll = poll_loop(fetcher, publisher.clone());

        poll.run_cycle().await;
        assert_eq!(poll.run_cycle().await, CycleOutcome::Malformed);
        assert_eq!(poll.status(), AreaStatus::Active);
        assert_eq!(publisher.topics(), vec!["redalert/active"]);
    }

    #[tokio::test]
    async fn test_unreadable_entries_keep_state() {
        let publisher = RecordingPublisher::default();
        let fetcher = ScriptedFetcher::new(vec![
            alert(1),
            Ok(format!(r#"[{{"data": "{}", "category": null}}]"#, AREA).into_bytes()),
            Ok(b"[42]".to_vec()),
        ]);
        let mut poll = poll_loop(fetcher, publisher.clone());

        poll.run_cycle().await;
        assert_eq!(poll.run_cycle().await, CycleOutcome::Malformed);
        assert_eq!(poll.run_cycle().await, CycleOutcome::Malformed);
        assert_eq!(poll.status(), AreaStatus::Active);
        assert_eq!(publisher.topics(), vec!["redalert/active"]);
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_roll_back() {
        let publisher = RecordingPublisher {
            fail: true,
            ..Default::default()
        };
        let fetcher = ScriptedFetcher::new(vec![alert(14), alert(14)]);
        let mut poll = poll_loop(fetcher, publisher);

        assert_eq!(
            poll.run_cycle().await,
            CycleOutcome::Processed {
                events: 1,
                publish_failures: 1
            }
        );
        assert_eq!(poll.status(), AreaStatus::Prewarning);

        assert_eq!(
            poll.run_cycle().await,
            CycleOutcome::Processed {
                events: 0,
                publish_failures: 0
            }
        );
    }

    #[tokio::test]
    async fn test_event_ended_record_clears() {
        let publisher = RecordingPublisher::default();
        let fetcher = ScriptedFetcher::new(vec![alert(1), alert(13), alert(13)]);
        let mut poll = poll_loop(fetcher, publisher.clone());

        for _ in 0..3 {
            poll.run_cycle().await;
        }

        assert_eq!(publisher.topics(), vec!["redalert/active", "redalert/allclear"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_until_shutdown() {
        let publisher = RecordingPublisher::default();
        let fetcher = ScriptedFetcher::new(vec![alert(14), alert(1)]);
        let mut poll = poll_loop(fetcher, publisher.clone());

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            trigger.cancel();
        });

        poll.run(shutdown).await;

        // cycles start at t=0, 5 and 10; shutdown lands while sleeping
        assert_eq!(poll.cycles(), 3);
        assert_eq!(poll.phase(), PollPhase::Idle);
        assert_eq!(
            publisher.topics(),
            vec!["redalert/prewarning", "redalert/active", "redalert/allclear"]
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let mut poll = poll_loop(ScriptedFetcher::default(), RecordingPublisher::default());
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        poll.run(shutdown).await;
        assert_eq!(poll.cycles(), 0);
    }
}
