//! Terminal adapter: stdin lines and Ctrl-C merged into one event stream.
use std::io::{self, BufRead};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use crate::session::{InputSource, SessionInput, FAREWELL};

/// Exit status used when a second Ctrl-C cuts a stuck call short.
pub const INTERRUPT_EXIT_CODE: i32 = 130;

pub struct ConsoleInput {
    events: Receiver<SessionInput>,
    interrupt: Arc<AtomicBool>,
}

impl ConsoleInput {
    /// Spawns the stdin reader and the interrupt watcher.
    ///
    /// Once the watcher is installed Ctrl-C no longer kills the process. The
    /// first one raises a flag the session checks after every model call and
    /// before every read, so it outranks lines already typed ahead. A second
    /// one exits immediately, which is the way out of a call that never
    /// returns.
    pub fn spawn() -> io::Result<Self> {
        let (tx, events) = mpsc::channel();
        let interrupt = Arc::new(AtomicBool::new(false));
        let lines = tx.clone();
        let flag = interrupt.clone();
        thread::Builder::new().name("stdin-reader".into()).spawn(move || forward_lines(lines))?;
        thread::Builder::new().name("interrupt-watcher".into()).spawn(move || watch_interrupts(flag, tx))?;
        Ok(Self { events, interrupt })
    }

    #[cfg(test)]
    fn from_parts(events: Receiver<SessionInput>, interrupt: Arc<AtomicBool>) -> Self {
        Self { events, interrupt }
    }
}

impl InputSource for ConsoleInput {
    fn next_input(&mut self) -> SessionInput {
        if self.interrupted() {
            return SessionInput::Interrupt;
        }
        match self.events.recv() {
            Ok(_) if self.interrupted() => SessionInput::Interrupt,
            Ok(event) => event,
            Err(_) => SessionInput::Closed,
        }
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }
}

fn forward_lines(tx: Sender<SessionInput>) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) => {
                if tx.send(SessionInput::Line(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read from stdin");
                break;
            }
        }
    }
    let _ = tx.send(SessionInput::Closed);
}

/// Sets the flag first, then wakes a reader blocked on the channel.
fn raise_interrupt(flag: &AtomicBool, tx: &Sender<SessionInput>) {
    flag.store(true, Ordering::SeqCst);
    let _ = tx.send(SessionInput::Interrupt);
}

fn watch_interrupts(flag: Arc<AtomicBool>, tx: Sender<SessionInput>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::warn!(error = %e, "interrupt handling unavailable");
            return;
        }
    };
    runtime.block_on(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        tracing::debug!("interrupt received");
        raise_interrupt(&flag, &tx);
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\n\n👋 {FAREWELL}");
            std::process::exit(INTERRUPT_EXIT_CODE);
        }
    });
}
