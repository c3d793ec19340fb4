use crate::api::SearchKind;
use serde::Serialize;
use std::collections::HashMap;

pub struct Metrics {
    primary_counts: HashMap<SearchKind, u64>,
    retry_counts: HashMap<SearchKind, u64>,
    wait_counts: HashMap<SearchKind, u64>,
    timeout_counts: HashMap<SearchKind, u64>,
}

/// Counters for one endpoint, as shown in the debug panel
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EndpointMetrics {
    pub primary_requests: u64,
    pub retries: u64,
    pub waits: u64,
    pub timeouts: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            primary_counts: HashMap::new(),
            retry_counts: HashMap::new(),
            wait_counts: HashMap::new(),
            timeout_counts: HashMap::new(),
        }
    }

    pub fn record_primary(&mut self, kind: SearchKind) {
        *self.primary_counts.entry(kind).or_insert(0) += 1;
    }

    pub fn record_retry(&mut self, kind: SearchKind) {
        *self.retry_counts.entry(kind).or_insert(0) += 1;
    }

    pub fn record_wait(&mut self, kind: SearchKind) {
        *self.wait_counts.entry(kind).or_insert(0) += 1;
    }

    pub fn record_timeout(&mut self, kind: SearchKind) {
        *self.timeout_counts.entry(kind).or_insert(0) += 1;
    }

    pub fn get(&self, kind: SearchKind) -> EndpointMetrics {
        EndpointMetrics {
            primary_requests: *self.primary_counts.get(&kind).unwrap_or(&0),
            retries: *self.retry_counts.get(&kind).unwrap_or(&0),
            waits: *self.wait_counts.get(&kind).unwrap_or(&0),
            timeouts: *self.timeout_counts.get(&kind).unwrap_or(&0),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_kept_per_endpoint() {
        let mut metrics = Metrics::new();
        metrics.record_primary(SearchKind::Image);
        metrics.record_primary(SearchKind::Hybrid);
        metrics.record_wait(SearchKind::Hybrid);
        metrics.record_timeout(SearchKind::Hybrid);

        assert_eq!(metrics.get(SearchKind::Image).primary_requests, 1);
        assert_eq!(metrics.get(SearchKind::Image).waits, 0);
        assert_eq!(metrics.get(SearchKind::Hybrid).timeouts, 1);
        assert_eq!(metrics.get(SearchKind::Image).timeouts, 0);
    }
}
