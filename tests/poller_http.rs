use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serde_json::json;
use tiny_http::{Header, Response, Server};

use netstate_recorder::poller::{PollerConfig, run_poller, service_alive};
use netstate_recorder::{RecorderContext, Source};

fn spawn_json_server(body: &'static str, status: u16) -> SocketAddr {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();

    thread::spawn(move || {
        for request in server.incoming_requests() {
            let header =
                Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let response = Response::from_string(body)
                .with_header(header)
                .with_status_code(status);
            let _ = request.respond(response);
        }
    });

    addr
}

fn poller_cfg(addr: SocketAddr, endpoint: &str, interval: Duration) -> PollerConfig {
    PollerConfig {
        url: format!("http://{}{}", addr, endpoint),
        params: Vec::new(),
        request_interval: interval,
    }
}

#[test]
fn poller_enqueues_timestamped_items() {
    let addr = spawn_json_server(r#"{"nodes": [1], "links": []}"#, 200);
    let ctx = Arc::new(RecorderContext::new());

    let handle = {
        let ctx = ctx.clone();
        let cfg = poller_cfg(addr, "/ndt/get_graph_data", Duration::from_millis(100));
        thread::spawn(move || run_poller(ctx, Source::Graph, cfg))
    };

    thread::sleep(Duration::from_millis(450));
    ctx.shutdown.request_stop();
    handle.join().unwrap().unwrap();

    let rx = ctx.sample_receiver(Source::Graph);
    assert!(rx.len() >= 2, "expected repeated polls, got {}", rx.len());

    let item = rx.recv().unwrap();
    assert!(item.timestamp_ms > 0);
    // graph objects are merged into the record top level
    assert_eq!(item.payload["nodes"], json!([1]));
    assert_eq!(item.payload["links"], json!([]));
}

#[test]
fn flow_payload_arrives_under_wire_name() {
    let addr = spawn_json_server(r#"[{"src": "a", "dst": "b"}]"#, 200);
    let ctx = Arc::new(RecorderContext::new());

    let handle = {
        let ctx = ctx.clone();
        let cfg = poller_cfg(addr, "/ndt/get_detected_flow_data", Duration::from_millis(100));
        thread::spawn(move || run_poller(ctx, Source::Flow, cfg))
    };

    thread::sleep(Duration::from_millis(250));
    ctx.shutdown.request_stop();
    handle.join().unwrap().unwrap();

    let item = ctx.sample_receiver(Source::Flow).recv().unwrap();
    assert_eq!(item.payload["flowinfo"], json!([{"src": "a", "dst": "b"}]));
}

#[test]
fn non_success_status_terminates_poller() {
    let addr = spawn_json_server("server error", 500);
    let ctx = Arc::new(RecorderContext::new());

    let handle = {
        let ctx = ctx.clone();
        let cfg = poller_cfg(addr, "/ndt/get_detected_flow_data", Duration::from_secs(1));
        thread::spawn(move || run_poller(ctx, Source::Flow, cfg))
    };

    let result = handle.join().unwrap();
    assert!(result.is_err(), "a 500 must be fatal to the poller");
    assert_eq!(ctx.sample_receiver(Source::Flow).len(), 0);
}

#[test]
fn inter_request_wait_is_interruptible() {
    let addr = spawn_json_server("{}", 200);
    let ctx = Arc::new(RecorderContext::new());

    let handle = {
        let ctx = ctx.clone();
        let cfg = poller_cfg(addr, "/ndt/get_graph_data", Duration::from_secs(10));
        thread::spawn(move || run_poller(ctx, Source::Graph, cfg))
    };

    // first request is done, the poller sits in its inter-request wait
    thread::sleep(Duration::from_millis(300));
    let stopped_at = Instant::now();
    ctx.shutdown.request_stop();
    handle.join().unwrap().unwrap();

    assert!(
        stopped_at.elapsed() < Duration::from_secs(2),
        "poller must abandon the wait on stop"
    );
}

#[test]
fn probe_accepts_http_200() {
    let addr = spawn_json_server("[]", 200);
    assert!(service_alive(&format!(
        "http://{}/ndt/get_detected_flow_data",
        addr
    )));
}

#[test]
fn probe_rejects_error_status() {
    let addr = spawn_json_server("not there", 404);
    assert!(!service_alive(&format!(
        "http://{}/ndt/get_detected_flow_data",
        addr
    )));
}

#[test]
fn probe_rejects_unreachable_service() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    assert!(!service_alive(&format!("http://{}/", addr)));
}
