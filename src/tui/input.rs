//! Cancellation input: a single keypress in interactive mode, Ctrl-C otherwise.

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const KEY_POLL: Duration = Duration::from_millis(100);

pub fn is_cancel_key(key: KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => true,
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Listen for a cancel key until one arrives or `stop` fires. Raw mode must
/// already be enabled. Reads happen on a blocking thread that checks `stop`
/// between polls.
pub fn spawn_key_listener(stop: CancellationToken) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    tokio::task::spawn_blocking(move || {
        while !stop.is_cancelled() {
            match event::poll(KEY_POLL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) if is_cancel_key(key) => {
                        let _ = tx.blocking_send(());
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("key listener stopped: {}", e);
                        return;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!("key listener stopped: {}", e);
                    return;
                }
            }
        }
    });
    rx
}

/// Forward the first Ctrl-C (SIGINT) as a cancellation.
pub fn spawn_interrupt_listener(stop: CancellationToken) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if result.is_ok() {
                    let _ = tx.send(()).await;
                }
            }
            _ = stop.cancelled() => {}
        }
    });
    rx
}

/// Forward `token` as a cancellation, for callers that cancel from code
/// rather than from the terminal.
pub fn spawn_token_listener(token: CancellationToken, stop: CancellationToken) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    if token.is_cancelled() {
        let _ = tx.try_send(());
        return rx;
    }
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {
                let _ = tx.send(()).await;
            }
            _ = stop.cancelled() => {}
        }
    });
    rx
}
