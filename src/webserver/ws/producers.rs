/// WebSocket producers - interval-driven event loops
///
/// A `Producer` owns one `EventSource` and polls it on a fixed interval.
/// Whatever the source returns is wrapped in envelopes and broadcast in
/// order. A failed poll is logged and the loop waits for the next tick;
/// only shutdown (or a closed hub) ends it.
///
/// The concrete sources live under `ws::sources::*`.
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::errors::{CollectorError, HubError};
use crate::logger::{self, LogTag};
use crate::shutdown::Shutdown;

use super::hub::WsHub;
use super::message::{Envelope, Event};

// ============================================================================
// EVENT SOURCE
// ============================================================================

/// One collaborator, queried once per tick
///
/// Sources keep whatever cursor they need between polls; `poll` takes
/// `&mut self` for that reason.
#[async_trait]
pub trait EventSource: Send {
    /// Producer name used in logs
    fn name(&self) -> &'static str;

    /// Fetch everything new since the previous poll
    async fn poll(&mut self) -> Result<Vec<Event>, CollectorError>;

    /// Signal that asks for a poll before the next tick
    fn wake_signal(&self) -> Option<Arc<Notify>> {
        None
    }
}

// ============================================================================
// PRODUCER
// ============================================================================

pub struct Producer {
    name: &'static str,
    interval: Duration,
    source: Box<dyn EventSource>,
}

impl Producer {
    pub fn new(interval: Duration, source: Box<dyn EventSource>) -> Self {
        Self {
            name: source.name(),
            interval,
            source,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start the loop; it runs until `shutdown` is triggered
    pub fn spawn(self, hub: WsHub, shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(self.run(hub, shutdown))
    }

    async fn run(mut self, hub: WsHub, shutdown: Shutdown) {
        // First tick one interval after start, missed ticks are delayed
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let wake = self.source.wake_signal();
        let mut failures: u32 = 0;

        logger::debug(
            LogTag::Producer,
            &format!(
                "Producer {} started (interval={}ms)",
                self.name,
                self.interval.as_millis()
            ),
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                _ = ticker.tick() => {}
                _ = woken(&wake) => {}
            }

            let polled = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                polled = self.source.poll() => polled,
            };

            match polled {
                Ok(events) => {
                    if failures > 0 {
                        logger::info(
                            LogTag::Producer,
                            &format!(
                                "Producer {} recovered after {} failed polls",
                                self.name, failures
                            ),
                        );
                        failures = 0;
                    }

                    let count = events.len();
                    for event in events {
                        match publish(&hub, &event).await {
                            Ok(()) => {}
                            Err(HubError::Closed) => {
                                logger::info(
                                    LogTag::Producer,
                                    &format!("Producer {} stopping: hub closed", self.name),
                                );
                                return;
                            }
                            Err(e) => logger::error(
                                LogTag::Producer,
                                &format!("Producer {} dropped {} event: {}", self.name, event.kind(), e),
                            ),
                        }
                    }

                    if count > 0 {
                        logger::verbose(
                            LogTag::Producer,
                            &format!("Producer {} published {} events", self.name, count),
                        );
                    }
                }
                Err(e) => {
                    failures += 1;
                    self.report_failure(&e, failures);
                }
            }
        }

        logger::debug(
            LogTag::Producer,
            &format!("Producer {} stopped", self.name),
        );
    }

    /// First failure of a streak is loud, repeats go to debug
    fn report_failure(&self, error: &CollectorError, failures: u32) {
        let message = format!("Producer {} poll failed: {}", self.name, error);
        if failures > 1 {
            logger::debug(
                LogTag::Producer,
                &format!("{} ({} in a row)", message, failures),
            );
        } else if error.is_transient() {
            logger::warning(LogTag::Producer, &message);
        } else {
            logger::error(LogTag::Producer, &message);
        }
    }
}

async fn woken(signal: &Option<Arc<Notify>>) {
    match signal {
        Some(notify) => notify.notified().await,
        None => std::future::pending().await,
    }
}

async fn publish(hub: &WsHub, event: &Event) -> Result<(), HubError> {
    let envelope = Envelope::new(event)?;
    hub.broadcast(&envelope).await
}

/// Start every producer (spawn background tasks)
pub fn start_all(producers: Vec<Producer>, hub: &WsHub, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
    let names: Vec<&str> = producers.iter().map(Producer::name).collect();
    logger::info(
        LogTag::Producer,
        &format!("Starting producers: [{}]", names.join(", ")),
    );

    producers
        .into_iter()
        .map(|producer| producer.spawn(hub.clone(), shutdown.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ws::hub::{ClientQueue, HubConfig};
    use crate::webserver::ws::message::{LoadAverage, SystemMetrics};

    fn sample_event(uptime_secs: u64) -> Event {
        Event::Metrics(SystemMetrics {
            cpu_percent: 1.0,
            cpu_count: 1,
            memory_used_mb: 1,
            memory_total_mb: 2,
            memory_percent: 50.0,
            swap_used_mb: 0,
            load_average: LoadAverage {
                one: 0.0,
                five: 0.0,
                fifteen: 0.0,
            },
            uptime_secs,
        })
    }

    /// Fails every other poll
    struct FlakySource {
        polls: u64,
    }

    #[async_trait]
    impl EventSource for FlakySource {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn poll(&mut self) -> Result<Vec<Event>, CollectorError> {
            self.polls += 1;
            if self.polls % 2 == 1 {
                return Err(CollectorError::Unavailable {
                    collaborator: "flaky",
                    reason: "not today".to_string(),
                });
            }
            Ok(vec![sample_event(self.polls)])
        }
    }

    struct WakeSource {
        wake: Arc<Notify>,
    }

    #[async_trait]
    impl EventSource for WakeSource {
        fn name(&self) -> &'static str {
            "wake"
        }

        async fn poll(&mut self) -> Result<Vec<Event>, CollectorError> {
            Ok(vec![sample_event(7)])
        }

        fn wake_signal(&self) -> Option<Arc<Notify>> {
            Some(Arc::clone(&self.wake))
        }
    }

    struct HangingSource;

    #[async_trait]
    impl EventSource for HangingSource {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn poll(&mut self) -> Result<Vec<Event>, CollectorError> {
            std::future::pending().await
        }
    }

    async fn next_uptime(queue: &mut ClientQueue) -> u64 {
        let frame = tokio::time::timeout(Duration::from_secs(2), queue.receiver.recv())
            .await
            .expect("frame in time")
            .expect("queue open");
        let envelope: Envelope = serde_json::from_str(&frame).unwrap();
        assert_eq!(envelope.kind, "metrics");
        envelope.payload["uptime_secs"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_loop() {
        let (hub, _task) = WsHub::spawn(HubConfig::default());
        let mut queue = hub.register().await.unwrap();
        let shutdown = Shutdown::new();

        let handle = Producer::new(Duration::from_millis(10), Box::new(FlakySource { polls: 0 }))
            .spawn(hub.clone(), shutdown.clone());

        assert_eq!(next_uptime(&mut queue).await, 2);
        assert_eq!(next_uptime(&mut queue).await, 4);
        assert_eq!(next_uptime(&mut queue).await, 6);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_wake_signal_polls_early() {
        let (hub, _task) = WsHub::spawn(HubConfig::default());
        let mut queue = hub.register().await.unwrap();
        let shutdown = Shutdown::new();
        let wake = Arc::new(Notify::new());

        let _handle = Producer::new(
            Duration::from_secs(3600),
            Box::new(WakeSource {
                wake: Arc::clone(&wake),
            }),
        )
        .spawn(hub.clone(), shutdown.clone());

        wake.notify_one();
        assert_eq!(next_uptime(&mut queue).await, 7);
        shutdown.trigger();
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_hanging_poll() {
        let (hub, _task) = WsHub::spawn(HubConfig::default());
        let shutdown = Shutdown::new();

        let handle = Producer::new(Duration::from_millis(5), Box::new(HangingSource))
            .spawn(hub, shutdown.clone());

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("producer should stop")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_interval() {
        let (hub, _task) = WsHub::spawn(HubConfig::default());
        let mut queue = hub.register().await.unwrap();
        let shutdown = Shutdown::new();

        let started = Instant::now();
        let _handle = Producer::new(Duration::from_secs(1), Box::new(WakeSource {
            wake: Arc::new(Notify::new()),
        }))
        .spawn(hub.clone(), shutdown.clone());

        queue.receiver.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(started.elapsed() < Duration::from_millis(1500));
        shutdown.trigger();
    }
}
