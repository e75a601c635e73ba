use std::collections::HashMap;
use std::io;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{info, warn};

use crate::command::{parse_command, Command, CommandError};
use crate::engine::{Scheduler, SchedulerError};
use crate::limits::MAX_LISTEN_CHANNELS;
use crate::model::*;
use crate::observability::{self, command_label};

const NOTIFY_QUEUE: usize = 256;

// ── Responses ────────────────────────────────────────────────────

/// One output line: `{"ok": …}`, `{"error": …}` or `{"notification": …}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Ok(Payload),
    Error(ErrorBody),
    Notification { channel: String, event: StepEvent },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Step(TestStep),
    MaybeStep(Option<TestStep>),
    Steps(Vec<TestStep>),
    Deleted { deleted: bool },
    Availability(AvailabilitySummary),
    Windows(Vec<Span>),
    Listening { listening: Vec<String> },
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflicts: Option<Vec<TestStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<&'static str>>,
}

impl From<SchedulerError> for Response {
    fn from(err: SchedulerError) -> Self {
        let message = err.to_string();
        let kind = err.kind();
        let (conflicts, missing) = match err {
            SchedulerError::ConflictRejected(steps) => (Some(steps), None),
            SchedulerError::IncompleteDraft(fields) => (None, Some(fields)),
            _ => (None, None),
        };
        Response::Error(ErrorBody {
            kind,
            message,
            conflicts,
            missing,
        })
    }
}

impl From<CommandError> for Response {
    fn from(err: CommandError) -> Self {
        let kind = match err {
            CommandError::Empty | CommandError::Parse(_) => "bad_command",
            CommandError::LineTooLong => "line_too_long",
        };
        Response::Error(ErrorBody {
            kind,
            message: err.to_string(),
            conflicts: None,
            missing: None,
        })
    }
}

fn listen_error(message: impl Into<String>) -> Response {
    Response::Error(ErrorBody {
        kind: "listen_failed",
        message: message.into(),
        conflicts: None,
        missing: None,
    })
}

// ── Session loop ─────────────────────────────────────────────────

/// Channels this session listens on, each bridged into one mpsc queue.
struct Listeners {
    tasks: HashMap<String, JoinHandle<()>>,
    tx: mpsc::Sender<(String, StepEvent)>,
}

impl Listeners {
    fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    fn listen(&mut self, channel: String, rx: broadcast::Receiver<StepEvent>) {
        if self.tasks.contains_key(&channel) {
            return;
        }
        let tx = self.tx.clone();
        let name = channel.clone();
        let handle = tokio::spawn(forward(name, rx, tx));
        self.tasks.insert(channel, handle);
        metrics::gauge!(observability::LISTEN_CHANNELS_ACTIVE).increment(1.0);
    }

    fn unlisten(&mut self, channel: &str) -> bool {
        match self.tasks.remove(channel) {
            Some(handle) => {
                handle.abort();
                metrics::gauge!(observability::LISTEN_CHANNELS_ACTIVE).decrement(1.0);
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) -> Vec<String> {
        let names = self.channels();
        for name in &names {
            self.unlisten(name);
        }
        names
    }
}

async fn forward(
    channel: String,
    mut rx: broadcast::Receiver<StepEvent>,
    tx: mpsc::Sender<(String, StepEvent)>,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if tx.send((channel.clone(), event)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("listener on {channel} dropped {n} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Run one scheduling session: read JSON commands line by line from `reader`,
/// apply them to `scheduler`, and write one JSON response per line to `writer`.
///
/// Notifications for listened channels are interleaved between responses.
/// Returns at EOF.
pub async fn process_session<R, W>(
    reader: R,
    writer: W,
    scheduler: &mut Scheduler,
    max_line_len: usize,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(max_line_len));
    let mut out = FramedWrite::new(writer, LinesCodec::new());
    let (tx, mut notifications) = mpsc::channel(NOTIFY_QUEUE);
    let mut listeners = Listeners {
        tasks: HashMap::new(),
        tx,
    };

    // FramedRead yields a single None after a decode error, then keeps reading.
    let mut resume_after_error = false;

    info!("session started");
    let result = loop {
        tokio::select! {
            line = lines.next() => {
                let response = match line {
                    None if resume_after_error => {
                        resume_after_error = false;
                        continue;
                    }
                    None => break Ok(()),
                    Some(Ok(line)) => match parse_command(&line) {
                        Ok(cmd) => execute(scheduler, &mut listeners, cmd),
                        Err(CommandError::Empty) => continue,
                        Err(e) => Response::from(e),
                    },
                    Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                        resume_after_error = true;
                        Response::from(CommandError::LineTooLong)
                    }
                    Some(Err(LinesCodecError::Io(e))) => break Err(e),
                };
                if let Err(e) = write_response(&mut out, &response).await {
                    break Err(e);
                }
            }
            Some((channel, event)) = notifications.recv() => {
                let response = Response::Notification { channel, event };
                if let Err(e) = write_response(&mut out, &response).await {
                    break Err(e);
                }
            }
        }
    };

    listeners.clear();
    info!("session ended with {} steps", scheduler.len());
    result
}

async fn write_response<W>(
    out: &mut FramedWrite<W, LinesCodec>,
    response: &Response,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = serde_json::to_string(response)?;
    out.send(line).await.map_err(|e| match e {
        LinesCodecError::Io(e) => e,
        LinesCodecError::MaxLineLengthExceeded => io::Error::other("response line too long"),
    })
}

fn execute(scheduler: &mut Scheduler, listeners: &mut Listeners, cmd: Command) -> Response {
    let label = command_label(&cmd);
    let started = Instant::now();
    let response = dispatch(scheduler, listeners, cmd);
    let status = if matches!(response, Response::Error(_)) { "error" } else { "ok" };
    metrics::counter!(observability::COMMANDS_TOTAL, "command" => label, "status" => status)
        .increment(1);
    metrics::histogram!(observability::COMMAND_DURATION_SECONDS, "command" => label)
        .record(started.elapsed().as_secs_f64());
    response
}

fn dispatch(scheduler: &mut Scheduler, listeners: &mut Listeners, cmd: Command) -> Response {
    let result: Result<Payload, SchedulerError> = match cmd {
        Command::Create { step } => scheduler.propose_create(step).map(Payload::Step),
        Command::BatchCreate { steps } => scheduler.propose_batch_create(steps).map(Payload::Steps),
        Command::Update { id, changes } => scheduler.propose_update(id, changes).map(Payload::Step),
        Command::Reschedule { id, start, end } => {
            scheduler.reschedule(id, start, end).map(Payload::Step)
        }
        Command::Status { id, status } => {
            scheduler.transition_status(id, status).map(Payload::Step)
        }
        Command::Delete { id } => Ok(Payload::Deleted {
            deleted: scheduler.delete(id),
        }),
        Command::Get { id } => Ok(Payload::MaybeStep(scheduler.get(&id).cloned())),
        Command::List => Ok(Payload::Steps(scheduler.list())),
        Command::Conflicts {
            start,
            end,
            equipment_id,
            analyst_id,
            exclude,
        } => scheduler
            .conflicts_for(start, end, equipment_id.as_deref(), analyst_id.as_deref(), exclude)
            .map(Payload::Steps),
        Command::Availability { start, end, exclude } => scheduler
            .availability_summary(start, end, exclude)
            .map(Payload::Availability),
        Command::FreeWindows {
            resource,
            start,
            end,
            min_duration,
            exclude,
        } => scheduler
            .free_windows(&resource, start, end, min_duration, exclude)
            .map(Payload::Windows),
        Command::JointFreeWindows {
            equipment_id,
            analyst_id,
            start,
            end,
            min_duration,
            exclude,
        } => scheduler
            .joint_free_windows(&equipment_id, &analyst_id, start, end, min_duration, exclude)
            .map(Payload::Windows),
        Command::Listen { channel } => {
            if channel.trim().is_empty() {
                return listen_error("empty channel name");
            }
            if !listeners.tasks.contains_key(&channel)
                && listeners.tasks.len() >= MAX_LISTEN_CHANNELS
            {
                return listen_error("too many channels");
            }
            let rx = scheduler.notify().subscribe(&channel);
            listeners.listen(channel, rx);
            Ok(Payload::Listening {
                listening: listeners.channels(),
            })
        }
        Command::Unlisten { channel } => {
            match channel {
                Some(channel) => {
                    listeners.unlisten(&channel);
                    scheduler.notify().prune(&channel);
                }
                None => {
                    for name in listeners.clear() {
                        scheduler.notify().prune(&name);
                    }
                }
            }
            Ok(Payload::Listening {
                listening: listeners.channels(),
            })
        }
    };

    match result {
        Ok(payload) => Response::Ok(payload),
        Err(e) => Response::from(e),
    }
}
