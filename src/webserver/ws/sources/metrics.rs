use async_trait::async_trait;

use crate::collectors::HostSampler;
use crate::errors::CollectorError;
use crate::webserver::ws::message::Event;
use crate::webserver::ws::producers::EventSource;

/// One `metrics` event per tick
pub struct SystemMetricsSource {
    sampler: HostSampler,
}

impl SystemMetricsSource {
    pub fn new() -> Self {
        Self {
            sampler: HostSampler::new(),
        }
    }
}

impl Default for SystemMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for SystemMetricsSource {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn poll(&mut self) -> Result<Vec<Event>, CollectorError> {
        Ok(vec![Event::Metrics(self.sampler.sample())])
    }
}
