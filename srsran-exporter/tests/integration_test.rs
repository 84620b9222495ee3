//! Integration tests for the srsRAN exporter.
//!
//! A fake gNB remote control server speaks WebSocket over real TCP; the
//! exporter subscribes to it and the result is scraped over HTTP.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch};

use srsran_exporter::declarations::{
    WS_CONNECTED, WS_CONNECTIONS_TOTAL, WS_PARSE_ERRORS_TOTAL,
};
use srsran_exporter::{HttpServer, IngestSupervisor, MetricStore, SharedStore, TcpConnector};

const TICK: &str = r#"{
    "cells": [{
        "cell_metrics": { "pci": 1, "average_latency": 55, "late_dl_harqs": 0 },
        "ue_list": [
            { "rnti": "7", "dl_nof_ok": 3, "cqi": 15 },
            { "rnti": "9", "dl_nof_ok": 3 }
        ]
    }],
    "du": { "du_high": { "mac": { "dl": [{ "pci": 1, "cpu_usage_percent": 4.25 }] } } }
}"#;

/// Encode an unmasked server text frame.
fn text_frame(payload: &str) -> Vec<u8> {
    let len = payload.len();
    let mut out = vec![0x81];
    if len < 126 {
        out.push(len as u8);
    } else {
        out.push(126);
        out.extend_from_slice(&(len as u16).to_be_bytes());
    }
    out.extend_from_slice(payload.as_bytes());
    out
}

/// Accept the upgrade and return the unmasked subscribe command.
async fn accept_and_subscribe(socket: &mut TcpStream) -> String {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut buf).await.unwrap();
        assert!(n > 0, "client hung up during handshake");
        request.extend_from_slice(&buf[..n]);
    }

    let request = String::from_utf8_lossy(&request).to_string();
    assert!(request.starts_with("GET / HTTP/1.1\r\n"));
    assert!(request.contains("Upgrade: websocket\r\n"));
    assert!(request.contains("Sec-WebSocket-Version: 13\r\n"));

    socket
        .write_all(b"HTTP/1.1 101 Switching Protocols\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n")
        .await
        .unwrap();

    let mut head = [0u8; 2];
    socket.read_exact(&mut head).await.unwrap();
    assert_eq!(head[0], 0x81);
    assert_eq!(head[1] & 0x80, 0x80, "client frames must be masked");
    let mut mask = [0u8; 4];
    socket.read_exact(&mut mask).await.unwrap();
    let mut payload = vec![0u8; (head[1] & 0x7F) as usize];
    socket.read_exact(&mut payload).await.unwrap();
    for (i, b) in payload.iter_mut().enumerate() {
        *b ^= mask[i % 4];
    }
    String::from_utf8(payload).unwrap()
}

async fn wait_for(store: &SharedStore, name: &str, value: f64) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while store.get(name, &[]).unwrap_or(0.0) < value {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{} never reached {}", name, value));
}

#[tokio::test]
async fn test_end_to_end_scrape() {
    // Fake gNB
    let gnb = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gnb_addr = gnb.local_addr().unwrap();
    let (hold_tx, hold_rx) = oneshot::channel::<()>();

    let gnb_task = tokio::spawn(async move {
        let (mut socket, _) = gnb.accept().await.unwrap();
        let subscribe = accept_and_subscribe(&mut socket).await;

        socket
            .write_all(&text_frame(r#"{"cmd":"metrics_subscribe"}"#))
            .await
            .unwrap();
        socket.write_all(&text_frame(TICK)).await.unwrap();
        socket.write_all(&text_frame("[1,2,3]")).await.unwrap();

        let _ = hold_rx.await;
        subscribe
    });

    // Exporter
    let store = Arc::new(MetricStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let connector =
        TcpConnector::new(&format!("ws://{}", gnb_addr), Duration::from_secs(2)).unwrap();
    let supervisor = IngestSupervisor::new(connector, store.clone(), Duration::from_millis(50));
    let supervisor_task = tokio::spawn(supervisor.run(shutdown_rx.clone()));

    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    let http_server = HttpServer::new(store.clone(), http_addr, "/metrics".to_string());
    let http_task = tokio::spawn(http_server.serve(http_listener, shutdown_rx.clone()));

    // The rejected array is the last message; once counted, all three are in.
    wait_for(&store, WS_PARSE_ERRORS_TOTAL, 1.0).await;

    // Scrape
    let client = reqwest::Client::new();
    let response = client
        .get(format!("http://{}/metrics", http_addr))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain; version=0.0.4; charset=utf-8"
    );
    let body = response.text().await.unwrap();

    let ok_lines: Vec<&str> = body
        .lines()
        .filter(|l| l.starts_with("srsran_ue_dl_nof_ok{"))
        .collect();
    assert_eq!(
        ok_lines,
        vec![
            "srsran_ue_dl_nof_ok{pci=\"1\",rnti=\"7\"} 3",
            "srsran_ue_dl_nof_ok{pci=\"1\",rnti=\"9\"} 3",
        ]
    );
    assert!(body.contains("# TYPE srsran_ue_dl_nof_ok gauge\n"));
    assert!(body.contains("srsran_sched_average_latency_us{pci=\"1\"} 55\n"));
    assert!(body.contains("srsran_active_ues{pci=\"1\"} 2\n"));
    assert!(body.contains("srsran_mac_dl_cpu_usage_percent{pci=\"1\"} 4.25\n"));
    assert!(body.contains("srsran_exporter_ws_connected 1\n"));
    assert!(body.contains("srsran_exporter_ws_messages_total 3\n"));
    assert!(body.contains("srsran_exporter_ws_parse_errors_total 1\n"));
    assert!(body.contains("srsran_exporter_ws_connections_total 1\n"));

    // A second scrape without new data is byte-identical.
    let again = client
        .get(format!("http://{}/metrics", http_addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, again);

    let response = client
        .get(format!("http://{}/other", http_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Drop the gNB connection: values stay, connectivity drops to 0.
    hold_tx.send(()).unwrap();
    assert_eq!(gnb_task.await.unwrap(), r#"{"cmd":"metrics_subscribe"}"#);

    tokio::time::timeout(Duration::from_secs(10), async {
        while store.get(WS_CONNECTED, &[]) != Some(0.0) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let body = client
        .get(format!("http://{}/metrics", http_addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(body.contains("srsran_ue_dl_nof_ok{pci=\"1\",rnti=\"9\"} 3\n"));
    assert!(body.contains("srsran_exporter_ws_connected 0\n"));
    assert_eq!(store.get(WS_PARSE_ERRORS_TOTAL, &[]), Some(1.0));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        supervisor_task.await.unwrap();
        http_task.await.unwrap().unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_unreachable_upstream_keeps_serving() {
    // Grab a free port and release it so nothing listens there.
    let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = probe.local_addr().unwrap();
    drop(probe);

    let store = Arc::new(MetricStore::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let connector =
        TcpConnector::new(&format!("ws://{}", dead_addr), Duration::from_secs(1)).unwrap();
    let supervisor = IngestSupervisor::new(connector, store.clone(), Duration::from_millis(20));
    let supervisor_task = tokio::spawn(supervisor.run(shutdown_rx.clone()));

    wait_for(&store, WS_CONNECTIONS_TOTAL, 3.0).await;

    let output = store.render();
    assert!(output.contains("srsran_exporter_ws_connected 0\n"));
    assert!(output.contains("srsran_exporter_ws_messages_total 0\n"));
    assert!(output.contains("srsran_exporter_last_message_unixtime 0\n"));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), supervisor_task)
        .await
        .unwrap()
        .unwrap();
}
