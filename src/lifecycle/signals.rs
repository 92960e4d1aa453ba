//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGHUP, SIGINT, SIGTERM and SIGQUIT
//! - Resolve once any of them arrives
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Every signal means the same thing: drain and exit
//! - Non-unix targets fall back to Ctrl-C

/// Wait for the first termination request from the operating system.
#[cfg(unix)]
pub async fn wait_for_termination() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    let name = tokio::select! {
        _ = hangup.recv() => "SIGHUP",
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    };

    tracing::info!(signal = name, "Termination signal received");
    Ok(name)
}

/// Wait for the first termination request from the operating system.
#[cfg(not(unix))]
pub async fn wait_for_termination() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "Termination signal received");
    Ok("ctrl-c")
}
