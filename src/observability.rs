use std::net::SocketAddr;

use crate::command::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total session commands executed. Labels: command, status.
pub const COMMANDS_TOTAL: &str = "labsched_commands_total";

/// Histogram: command latency in seconds. Labels: command.
pub const COMMAND_DURATION_SECONDS: &str = "labsched_command_duration_seconds";

/// Counter: proposals turned away. Labels: reason.
pub const PROPOSALS_REJECTED_TOTAL: &str = "labsched_proposals_rejected_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: steps currently held by the session.
pub const STEPS_ACTIVE: &str = "labsched_steps_active";

/// Gauge: notification channels the session is listening on.
pub const LISTEN_CHANNELS_ACTIVE: &str = "labsched_listen_channels_active";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::Create { .. } => "create",
        Command::BatchCreate { .. } => "batch_create",
        Command::Update { .. } => "update",
        Command::Reschedule { .. } => "reschedule",
        Command::Status { .. } => "status",
        Command::Delete { .. } => "delete",
        Command::Get { .. } => "get",
        Command::List => "list",
        Command::Conflicts { .. } => "conflicts",
        Command::Availability { .. } => "availability",
        Command::FreeWindows { .. } => "free_windows",
        Command::JointFreeWindows { .. } => "joint_free_windows",
        Command::Listen { .. } => "listen",
        Command::Unlisten { .. } => "unlisten",
    }
}
