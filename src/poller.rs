// src/poller.rs

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{error, info, warn};
use serde_json::{Map, Value};

use crate::core::error::RecorderError;
use crate::core::timestamp::utc_ms_now;
use crate::core::{RecorderContext, SampleItem, Source};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub request_interval: Duration,
}

/// Periodic GET loop for one source. A transport failure (including any
/// non-2xx status) terminates the loop; escalation is the operator's job.
pub fn run_poller(ctx: Arc<RecorderContext>, source: Source, cfg: PollerConfig) -> Result<()> {
    let agent = ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build();
    let tx = ctx.sample_sender(source);

    while !ctx.shutdown.is_stopping() {
        let started = Instant::now();

        let mut request = agent.get(&cfg.url);
        for (key, value) in &cfg.params {
            request = request.query(key, value);
        }

        let response = match request.call() {
            Ok(response) => response,
            Err(e) => {
                error!("[poller] {}: error fetching data: {}", source, e);
                return Err(RecorderError::transport(cfg.url.clone(), e).into());
            }
        };

        let body: Value = match response.into_json() {
            Ok(body) => body,
            Err(e) => {
                error!("[poller] {}: invalid JSON body from {}: {}", source, cfg.url, e);
                return Err(RecorderError::transport(cfg.url.clone(), e).into());
            }
        };

        if is_empty_body(&body) {
            warn!("[poller] {}: no new data from {}", source, cfg.url);
        }

        let item = SampleItem::new(utc_ms_now(), shape_payload(source, body));
        if tx.send(item).is_err() {
            // writer side gone, nothing left to record into
            break;
        }

        if let Some(remaining) = cfg.request_interval.checked_sub(started.elapsed())
            && ctx.shutdown.wait_stop(remaining)
        {
            break;
        }
        // remaining <= 0: next request goes out immediately, no catch-up ticks
    }

    info!("[poller] {}: stopped", source);
    Ok(())
}

/// Reachability probe against the flow endpoint, run once before the
/// pipeline starts.
pub fn service_alive(url: &str) -> bool {
    let agent = ureq::AgentBuilder::new().timeout(PROBE_TIMEOUT).build();
    match agent.get(url).call() {
        Ok(response) => response.status() == 200,
        Err(e) => {
            warn!("[poller] service probe against {} failed: {}", url, e);
            false
        }
    }
}

/// Record shape per source: flow bodies are nested under their wire name,
/// graph objects are merged into the record top level.
fn shape_payload(source: Source, body: Value) -> Value {
    match source {
        Source::Flow => {
            let mut payload = Map::new();
            payload.insert(Source::Flow.name().to_string(), body);
            Value::Object(payload)
        }
        Source::Graph => match body {
            Value::Object(fields) => Value::Object(fields),
            other => {
                let mut payload = Map::new();
                payload.insert(Source::Graph.name().to_string(), other);
                Value::Object(payload)
            }
        },
    }
}

fn is_empty_body(body: &Value) -> bool {
    match body {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}
