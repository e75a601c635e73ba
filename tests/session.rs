use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec};

use labsched::directory::Directory;
use labsched::engine::{Scheduler, SchedulerOptions};
use labsched::limits::MAX_LINE_LEN;
use labsched::notify::NotifyHub;
use labsched::session;

const H: i64 = 3_600_000;
const M: i64 = 60_000;
const T0: i64 = 1_767_225_600_000; // 2026-01-01T00:00:00Z

// ── Test infrastructure ──────────────────────────────────────

struct Client {
    reader: FramedRead<ReadHalf<DuplexStream>, LinesCodec>,
    writer: FramedWrite<WriteHalf<DuplexStream>, LinesCodec>,
    pending_notifications: VecDeque<Value>,
}

impl Client {
    async fn send(&mut self, cmd: Value) {
        self.writer.send(cmd.to_string()).await.unwrap();
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.send(line.to_string()).await.unwrap();
    }

    async fn next_line(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.reader.next())
            .await
            .expect("timed out waiting for session output")
            .expect("session closed")
            .unwrap();
        serde_json::from_str(&line).unwrap()
    }

    /// Next `ok`/`error` line, stashing notifications that arrive first.
    async fn response(&mut self) -> Value {
        loop {
            let v = self.next_line().await;
            if v.get("notification").is_some() {
                self.pending_notifications.push_back(v["notification"].clone());
            } else {
                return v;
            }
        }
    }

    async fn request(&mut self, cmd: Value) -> Value {
        self.send(cmd).await;
        self.response().await
    }

    async fn notification(&mut self) -> Value {
        if let Some(n) = self.pending_notifications.pop_front() {
            return n;
        }
        let v = self.next_line().await;
        v.get("notification").cloned().expect("expected notification")
    }
}

fn start_session(max_line_len: usize) -> (Client, JoinHandle<std::io::Result<usize>>) {
    let (client_side, server_side) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_side);
    let handle = tokio::spawn(async move {
        let mut scheduler = Scheduler::new(
            Arc::new(Directory::default()),
            Arc::new(NotifyHub::new()),
            SchedulerOptions::default(),
        );
        session::process_session(server_read, server_write, &mut scheduler, max_line_len).await?;
        Ok::<_, std::io::Error>(scheduler.len())
    });

    let (r, w) = tokio::io::split(client_side);
    let client = Client {
        reader: FramedRead::new(r, LinesCodec::new()),
        writer: FramedWrite::new(w, LinesCodec::new()),
        pending_notifications: VecDeque::new(),
    };
    (client, handle)
}

fn create(equipment: &str, analyst: &str, start: i64, end: i64) -> Value {
    json!({
        "cmd": "create",
        "step": {
            "sample_id": "S1",
            "aliquot_id": "S1-A",
            "test_id": "T1",
            "step_name": format!("{equipment} run"),
            "equipment_id": equipment,
            "analyst_id": analyst,
            "start": start,
            "end": end
        }
    })
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_list() {
    let (mut client, _h) = start_session(MAX_LINE_LEN);

    let created = client.request(create("HPLC_01", "Q1", T0, T0 + H)).await;
    assert_eq!(created["ok"]["equipment_id"], "HPLC_01");
    assert_eq!(created["ok"]["status"], "scheduled");
    let id = created["ok"]["id"].as_str().unwrap().to_string();

    let listed = client.request(json!({"cmd": "list"})).await;
    let steps = listed["ok"].as_array().unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0]["id"], id.as_str());

    let fetched = client.request(json!({"cmd": "get", "id": id})).await;
    assert_eq!(fetched["ok"]["span"], json!({"start": T0, "end": T0 + H}));
}

#[tokio::test]
async fn hplc_conflict_reported_with_steps() {
    let (mut client, _h) = start_session(MAX_LINE_LEN);

    let step_001 = client
        .request(create("HPLC_01", "Q1", T0 + 10 * H, T0 + 11 * H))
        .await;
    let id = step_001["ok"]["id"].clone();

    let rejected = client
        .request(create("HPLC_01", "Q2", T0 + 10 * H + 30 * M, T0 + 11 * H + 30 * M))
        .await;
    assert_eq!(rejected["error"]["kind"], "conflict_rejected");
    let conflicts = rejected["error"]["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["id"], id);

    let touching = client
        .request(create("HPLC_01", "Q2", T0 + 11 * H, T0 + 12 * H))
        .await;
    assert!(touching.get("ok").is_some(), "got {touching}");
}

#[tokio::test]
async fn validation_errors_are_typed() {
    let (mut client, _h) = start_session(MAX_LINE_LEN);

    let inverted = client.request(create("HPLC_01", "Q1", T0 + H, T0)).await;
    assert_eq!(inverted["error"]["kind"], "invalid_interval");

    let incomplete = client
        .request(json!({
            "cmd": "create",
            "step": {"step_name": "Prep", "start": T0, "end": T0 + H}
        }))
        .await;
    assert_eq!(incomplete["error"]["kind"], "incomplete_draft");
    assert_eq!(
        incomplete["error"]["missing"],
        json!(["sample_id", "aliquot_id", "test_id", "equipment_id", "analyst_id"])
    );

    let unknown = client
        .request(json!({
            "cmd": "status",
            "id": "01ARZ3NDEKTSV4RRFFQ69G5FAV",
            "status": "completed"
        }))
        .await;
    assert_eq!(unknown["error"]["kind"], "not_found");
}

#[tokio::test]
async fn malformed_lines_do_not_end_session() {
    let (mut client, _h) = start_session(MAX_LINE_LEN);

    client.send_raw("this is not json").await;
    let bad = client.response().await;
    assert_eq!(bad["error"]["kind"], "bad_command");

    // Blank lines are ignored entirely.
    client.send_raw("").await;

    let listed = client.request(json!({"cmd": "list"})).await;
    assert_eq!(listed["ok"], json!([]));
}

#[tokio::test]
async fn oversized_line_is_rejected() {
    let (mut client, _h) = start_session(256);

    let long_name = "x".repeat(512);
    client
        .send(json!({"cmd": "listen", "channel": long_name}))
        .await;
    let rejected = client.response().await;
    assert_eq!(rejected["error"]["kind"], "line_too_long");

    let listed = client.request(json!({"cmd": "list"})).await;
    assert_eq!(listed["ok"], json!([]));
}

#[tokio::test]
async fn reschedule_goes_through_validation() {
    let (mut client, _h) = start_session(MAX_LINE_LEN);

    let a = client.request(create("HPLC_01", "Q1", T0 + 9 * H, T0 + 10 * H)).await;
    client.request(create("HPLC_01", "Q2", T0 + 10 * H, T0 + 11 * H)).await;
    let a_id = a["ok"]["id"].clone();

    let dragged = client
        .request(json!({
            "cmd": "reschedule",
            "id": a_id,
            "start": T0 + 9 * H + 30 * M,
            "end": T0 + 10 * H + 30 * M
        }))
        .await;
    assert_eq!(dragged["error"]["kind"], "conflict_rejected");

    let still = client.request(json!({"cmd": "get", "id": a_id})).await;
    assert_eq!(still["ok"]["span"], json!({"start": T0 + 9 * H, "end": T0 + 10 * H}));

    let moved = client
        .request(json!({"cmd": "reschedule", "id": a_id, "start": T0 + 12 * H, "end": T0 + 13 * H}))
        .await;
    assert_eq!(moved["ok"]["span"]["start"], T0 + 12 * H);
}

#[tokio::test]
async fn availability_and_free_windows() {
    let (mut client, _h) = start_session(MAX_LINE_LEN);
    client.request(create("HPLC_01", "Q1", T0 + 9 * H, T0 + 10 * H)).await;

    let free = client
        .request(json!({
            "cmd": "free_windows",
            "resource": {"kind": "equipment", "id": "HPLC_01"},
            "start": T0 + 8 * H,
            "end": T0 + 12 * H
        }))
        .await;
    assert_eq!(
        free["ok"],
        json!([
            {"start": T0 + 8 * H, "end": T0 + 9 * H},
            {"start": T0 + 10 * H, "end": T0 + 12 * H}
        ])
    );

    let joint = client
        .request(json!({
            "cmd": "joint_free_windows",
            "equipment_id": "GC_01",
            "analyst_id": "Q1",
            "start": T0 + 8 * H,
            "end": T0 + 12 * H,
            "min_duration": 2 * H
        }))
        .await;
    assert_eq!(joint["ok"], json!([{"start": T0 + 10 * H, "end": T0 + 12 * H}]));

    // Empty directories give an empty summary.
    let summary = client
        .request(json!({"cmd": "availability", "start": T0, "end": T0 + H}))
        .await;
    assert_eq!(summary["ok"], json!({"equipment": [], "analysts": []}));
}

#[tokio::test]
async fn listen_receives_step_events() {
    let (mut client, _h) = start_session(MAX_LINE_LEN);

    let listening = client
        .request(json!({"cmd": "listen", "channel": "HPLC_01"}))
        .await;
    assert_eq!(listening["ok"], json!({"listening": ["HPLC_01"]}));

    // Other resources stay quiet.
    client.request(create("GC_01", "Q2", T0, T0 + H)).await;
    let created = client.request(create("HPLC_01", "Q1", T0, T0 + H)).await;

    let n = client.notification().await;
    assert_eq!(n["channel"], "HPLC_01");
    assert_eq!(n["event"]["type"], "created");
    assert_eq!(n["event"]["step"]["id"], created["ok"]["id"]);

    let id = created["ok"]["id"].clone();
    client
        .request(json!({"cmd": "status", "id": id, "status": "in_progress"}))
        .await;
    let n = client.notification().await;
    assert_eq!(n["event"]["type"], "status_changed");
    assert_eq!(n["event"]["from"], "scheduled");
    assert_eq!(n["event"]["step"]["status"], "in_progress");

    let stopped = client.request(json!({"cmd": "unlisten"})).await;
    assert_eq!(stopped["ok"], json!({"listening": []}));
}

#[tokio::test]
async fn eof_ends_session() {
    let (client, handle) = start_session(MAX_LINE_LEN);
    let Client { mut writer, reader, .. } = client;
    writer
        .send(create("HPLC_01", "Q1", T0, T0 + H).to_string())
        .await
        .unwrap();
    tokio::io::AsyncWriteExt::shutdown(writer.get_mut())
        .await
        .unwrap();

    let steps = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("session did not end")
        .unwrap()
        .unwrap();
    assert_eq!(steps, 1);
    drop(reader);
}
