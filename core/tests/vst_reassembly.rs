//! End-to-end VST scenarios against a hand-driven fake server socket:
//! single-chunk round-trip, multi-chunk reassembly, out-of-order
//! multi-id interleave, and connection loss mid-pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex as AsyncMutex};

use dbconn_core::chunk::ChunkCodec;
use dbconn_core::config::ConnectionConfiguration;
use dbconn_core::error::Error;
use dbconn_core::message_id::MessageId;
use dbconn_core::request::{Request, RequestHeader, RestVerb};
use dbconn_core::{Connection, VstConnection};

/// Builds a VST response message wire buffer: a 4-byte header-length
/// prefix, a JSON header document shaped like `MessageHeader`'s response
/// variant, then `payload`. Constructed independently of the crate's
/// private `MessageHeader` type, the way an actual server on the wire
/// would produce it.
fn wire_message(content_type: &str, payload: &[u8]) -> Vec<u8> {
    let header = serde_json::json!({
        "version": 1,
        "type": "Response",
        "database": null,
        "verb": null,
        "path": null,
        "parameters": {},
        "headers": {},
        "response_code": null,
        "content_type": content_type,
    });
    let header_bytes = serde_json::to_vec(&header).unwrap();
    let mut buf = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    buf.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    buf.extend_from_slice(&header_bytes);
    buf.extend_from_slice(payload);
    buf
}

async fn listener_on_loopback() -> (TcpListener, String, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr.ip().to_string(), addr.port())
}

#[tokio::test]
async fn scenario_a_single_chunk_round_trip() {
    let (listener, host, port) = listener_on_loopback().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let wire = wire_message("application/json", br#"{"version":"3.0"}"#);
        let chunks = ChunkCodec::encode(MessageId::from_raw(1), &wire, 30_000);
        assert_eq!(chunks.len(), 1, "payload small enough for a single chunk");
        for chunk in chunks {
            stream.write_all(&chunk).await.unwrap();
        }
        // Hold the socket open until the test is done with it.
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let config = ConnectionConfiguration::new(host, port.to_string());
    let conn = VstConnection::new(config).unwrap();

    let (tx, rx) = oneshot::channel();
    let request = Request::new(RequestHeader::new(RestVerb::Get, "/_api/version"), Bytes::new());
    conn.send_request(
        request,
        Box::new(move |err, _req, _resp| panic!("unexpected error: {err}")),
        Box::new(move |_req, resp| {
            let _ = tx.send(resp);
        }),
    );

    let response = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("response within deadline")
        .expect("on_success fired");

    assert!(response.header.response_code.is_none());
    assert_eq!(response.payload.as_bytes().as_ref(), br#"{"version":"3.0"}"#);
}

#[tokio::test]
async fn scenario_b_three_chunk_reassembly() {
    let (listener, host, port) = listener_on_loopback().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let header = serde_json::json!({
            "version": 1, "type": "Response", "database": null, "verb": null,
            "path": null, "parameters": {}, "headers": {},
            "response_code": null, "content_type": "application/octet-stream",
        });
        let header_bytes = serde_json::to_vec(&header).unwrap();
        // Total wire length fixed at 6000 bytes, per the scenario.
        let filler_len = 6000 - 4 - header_bytes.len();
        let filler: Vec<u8> = (0..filler_len).map(|i| (i % 251) as u8).collect();

        let mut wire = Vec::with_capacity(6000);
        wire.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        wire.extend_from_slice(&header_bytes);
        wire.extend_from_slice(&filler);
        assert_eq!(wire.len(), 6000);

        let chunks = ChunkCodec::encode(MessageId::from_raw(42), &wire, 2024);
        assert_eq!(chunks.len(), 3, "2024-byte cap forces a 3-chunk split of a 6000-byte message");
        for chunk in chunks {
            stream.write_all(&chunk).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let config = ConnectionConfiguration::new(host, port.to_string());
    let conn = VstConnection::new(config).unwrap();

    let (tx, rx) = oneshot::channel();
    let request = Request::new(RequestHeader::new(RestVerb::Get, "/big"), Bytes::new());
    conn.send_request(
        request,
        Box::new(move |err, _req, _resp| panic!("unexpected error: {err}")),
        Box::new(move |_req, resp| {
            let _ = tx.send(resp);
        }),
    );

    let response = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("response within deadline")
        .expect("on_success fired");

    let header = serde_json::json!({
        "version": 1, "type": "Response", "database": null, "verb": null,
        "path": null, "parameters": {}, "headers": {},
        "response_code": null, "content_type": "application/octet-stream",
    });
    let expected_len = 6000 - 4 - serde_json::to_vec(&header).unwrap().len();
    let expected_filler: Vec<u8> = (0..expected_len).map(|i| (i % 251) as u8).collect();
    assert_eq!(response.payload.as_bytes().len(), expected_len);
    assert_eq!(response.payload.as_bytes().as_ref(), expected_filler.as_slice());
}

#[tokio::test]
async fn scenario_c_out_of_order_multi_id_interleave() {
    let (listener, host, port) = listener_on_loopback().await;

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();

        let wire1 = wire_message("application/json", b"{\"id\":1}");
        let chunks1 = ChunkCodec::encode(MessageId::from_raw(1), &wire1, 30_000);
        assert_eq!(chunks1.len(), 1);

        let wire2 = wire_message("application/json", b"{\"id\":2,\"padding\":\"0123456789\"}");
        // Force exactly 2 chunks for message id 2.
        let chunks2 = ChunkCodec::encode(MessageId::from_raw(2), &wire2, wire2.len() - 4);
        assert_eq!(chunks2.len(), 2, "cap chosen to force a 2-chunk split for id 2");

        // chunk(2, first-of-2), chunk(1, single), chunk(2, last)
        stream.write_all(&chunks2[0]).await.unwrap();
        stream.write_all(&chunks1[0]).await.unwrap();
        stream.write_all(&chunks2[1]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let config = ConnectionConfiguration::new(host, port.to_string());
    let conn = VstConnection::new(config).unwrap();

    let order: Arc<AsyncMutex<Vec<u64>>> = Arc::new(AsyncMutex::new(Vec::new()));
    let (tx1, rx1) = oneshot::channel();
    let (tx2, rx2) = oneshot::channel();

    let order1 = order.clone();
    conn.send_request(
        Request::new(RequestHeader::new(RestVerb::Get, "/one"), Bytes::new()),
        Box::new(move |err, _req, _resp| panic!("unexpected error: {err}")),
        Box::new(move |_req, resp| {
            let order1 = order1.clone();
            tokio::spawn(async move { order1.lock().await.push(1) });
            let _ = tx1.send(resp);
        }),
    );

    let order2 = order.clone();
    conn.send_request(
        Request::new(RequestHeader::new(RestVerb::Get, "/two"), Bytes::new()),
        Box::new(move |err, _req, _resp| panic!("unexpected error: {err}")),
        Box::new(move |_req, resp| {
            let order2 = order2.clone();
            tokio::spawn(async move { order2.lock().await.push(2) });
            let _ = tx2.send(resp);
        }),
    );

    let resp1 = tokio::time::timeout(Duration::from_secs(5), rx1)
        .await
        .expect("id 1 response within deadline")
        .expect("on_success fired for id 1");
    let resp2 = tokio::time::timeout(Duration::from_secs(5), rx2)
        .await
        .expect("id 2 response within deadline")
        .expect("on_success fired for id 2");

    assert_eq!(resp1.payload.as_bytes().as_ref(), b"{\"id\":1}");
    assert_eq!(resp2.payload.as_bytes().as_ref(), b"{\"id\":2,\"padding\":\"0123456789\"}");
}

#[tokio::test]
async fn scenario_f_connection_loss_during_pipeline() {
    let (listener, host, port) = listener_on_loopback().await;

    tokio::spawn(async move {
        // First connection: accept, let the 5 pending writes land, then
        // drop the socket to simulate a connection loss mid-pipeline.
        let (stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        drop(stream);

        // Second connection: answer the post-reconnect request normally.
        let (mut stream, _) = listener.accept().await.unwrap();
        let wire = wire_message("application/json", b"{\"ok\":true}");
        let chunks = ChunkCodec::encode(MessageId::from_raw(1), &wire, 30_000);
        for chunk in chunks {
            stream.write_all(&chunk).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    });

    let config = ConnectionConfiguration::new(host, port.to_string());
    let conn = VstConnection::new(config).unwrap();

    let error_count = Arc::new(AtomicUsize::new(0));
    for _ in 0..5 {
        let counter = error_count.clone();
        conn.send_request(
            Request::new(RequestHeader::new(RestVerb::Get, "/doomed"), Bytes::new()),
            Box::new(move |err, _req, _resp| {
                assert!(matches!(err, Error::VstCanceledDuringReset));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Box::new(|_req, _resp| panic!("request should not succeed before the drop")),
        );
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while error_count.load(Ordering::SeqCst) < 5 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(error_count.load(Ordering::SeqCst), 5);

    let (tx, rx) = oneshot::channel();
    conn.send_request(
        Request::new(RequestHeader::new(RestVerb::Get, "/after-reconnect"), Bytes::new()),
        Box::new(move |err, _req, _resp| panic!("unexpected error after reconnect: {err}")),
        Box::new(move |_req, resp| {
            let _ = tx.send(resp);
        }),
    );
    let response = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .expect("reconnect response within deadline")
        .expect("on_success fired after reconnect");
    assert_eq!(response.payload.as_bytes().as_ref(), b"{\"ok\":true}");
}
