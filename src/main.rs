use std::sync::Arc;

use tracing::info;

use labsched::config::Config;
use labsched::directory::Directory;
use labsched::engine::{Scheduler, SchedulerOptions};
use labsched::notify::NotifyHub;
use labsched::session;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the protocol; logs go to stderr.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let config = Config::from_env();
    labsched::observability::init(config.metrics_port)?;

    let directory = match &config.directory_path {
        Some(path) => Directory::load(path)?,
        None => Directory::default(),
    };
    info!("labsched session starting");
    info!(
        "  directory: {} equipment, {} analysts, {} samples",
        directory.equipment.len(),
        directory.analysts.len(),
        directory.samples.len()
    );
    info!("  strict_references: {}", config.strict_references);
    let metrics = config
        .metrics_port
        .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"));
    info!("  metrics: {metrics}");

    let mut scheduler = Scheduler::new(
        Arc::new(directory),
        Arc::new(NotifyHub::new()),
        SchedulerOptions {
            strict_references: config.strict_references,
        },
    );

    let run = session::process_session(
        tokio::io::stdin(),
        tokio::io::stdout(),
        &mut scheduler,
        config.max_line_len,
    );
    tokio::select! {
        result = run => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, ending session");
        }
    }

    info!("labsched stopped");
    Ok(())
}
