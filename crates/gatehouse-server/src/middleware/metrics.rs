//! Request counting.

use crate::metrics::Metrics as Counters;
use crate::pipeline::{Handler, Stage, handler};
use std::sync::Arc;

/// Counts requests and errors and tracks the in-flight gauge. Never fails a
/// request.
#[derive(Debug, Clone)]
pub struct Metrics {
    counters: Arc<Counters>,
}

impl Metrics {
    pub fn new(counters: Arc<Counters>) -> Self {
        Self { counters }
    }
}

impl Stage for Metrics {
    fn name(&self) -> &'static str {
        "metrics"
    }

    fn wrap(&self, next: Handler) -> Handler {
        let counters = self.counters.clone();
        handler(move |req| {
            let next = next.clone();
            let counters = counters.clone();
            async move {
                let _in_flight = counters.track_in_flight();
                counters.record_request();

                let result = next(req).await;
                if result.is_err() {
                    counters.record_error();
                }
                result
            }
        })
    }
}
