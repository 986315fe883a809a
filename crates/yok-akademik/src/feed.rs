//! Event feed as JSON lines.
//!
//! Writes one serialized [`SessionEvent`] per line, flushing after each so a
//! reading process sees events as they happen.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_stream::{Stream, StreamExt};

use crate::dispatch::{DispatcherHandle, SessionPhase};
use crate::models::{EventKind, SessionEvent};

/// How long to wait for a session to reach `awaiting_selection`.
const SELECTION_WAIT: Duration = Duration::from_secs(60);

/// Status poll interval while waiting for a selection.
const SELECTION_POLL: Duration = Duration::from_millis(100);

/// Why a feed stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedEnd {
    /// A terminal event was written.
    Finished(EventKind),
    /// The session needs a profile selection before it can go on.
    NeedsSelection,
    /// The subscription was closed.
    Closed,
}

/// Whether the session cannot continue without a selection.
#[must_use]
pub const fn needs_selection(event: &SessionEvent) -> bool {
    matches!(event.event, EventKind::MultipleProfilesFound | EventKind::ProfileUrlMissing)
}

/// Write events to `out` until one ends the session or asks for a selection.
///
/// The stream is borrowed, so a feed stopped for a selection can be resumed.
pub async fn forward<S, W>(events: &mut S, out: &mut W) -> anyhow::Result<FeedEnd>
where
    S: Stream<Item = SessionEvent> + Unpin,
    W: AsyncWrite + Unpin,
{
    while let Some(event) = events.next().await {
        let line = serde_json::to_string(&event)?;
        out.write_all(line.as_bytes()).await?;
        out.write_all(b"\n").await?;
        out.flush().await?;

        if event.is_terminal() {
            tracing::debug!(session_id = %event.session_id, event = event.event.as_str(), "Feed finished");
            return Ok(FeedEnd::Finished(event.event));
        }
        if needs_selection(&event) {
            return Ok(FeedEnd::NeedsSelection);
        }
    }
    Ok(FeedEnd::Closed)
}

/// Poll until the session accepts a selection.
pub async fn await_selection(handle: &DispatcherHandle, session_id: &str) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + SELECTION_WAIT;
    loop {
        let Some(status) = handle.status(session_id).await? else {
            anyhow::bail!("Session {session_id} no longer exists");
        };
        match status.state {
            SessionPhase::AwaitingSelection => return Ok(()),
            phase if phase.is_terminal() => {
                anyhow::bail!("Session {session_id} ended in phase {phase}");
            }
            _ if tokio::time::Instant::now() >= deadline => {
                anyhow::bail!("Session {session_id} did not become ready for a selection");
            }
            _ => tokio::time::sleep(SELECTION_POLL).await,
        }
    }
}
