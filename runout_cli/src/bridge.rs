//! Line protocol between the host print server and the monitor.
//!
//! The host writes directives to stdin and reads printer actions and UI
//! notices from stdout, one JSON object per line. Logs never go to stdout.

use std::io::{BufRead, Write};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel as xch;
use eyre::WrapErr;
use runout_core::{LifecycleEvent, Runtime};
use runout_traits::{Level, Notice, NoticeKind, Notifier, Printer};
use serde_json::json;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Event(LifecycleEvent),
    /// Command the host is about to send to the printer.
    Send(String),
    /// Line the host received from the printer.
    Recv(String),
    /// Drive the simulated sensor line.
    Level(Level),
    Wait(Duration),
    Reload,
    Quit,
}

impl FromStr for Directive {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let (word, rest) = match line.split_once(' ') {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        match word {
            "event" => LifecycleEvent::from_name(rest)
                .map(Directive::Event)
                .ok_or_else(|| format!("unknown event `{rest}`")),
            "send" if !rest.is_empty() => Ok(Directive::Send(rest.to_string())),
            "recv" if !rest.is_empty() => Ok(Directive::Recv(rest.to_string())),
            "level" => match rest {
                "0" => Ok(Directive::Level(Level::Low)),
                "1" => Ok(Directive::Level(Level::High)),
                _ => Err(format!("level must be 0 or 1, got `{rest}`")),
            },
            "wait" => rest
                .parse::<u64>()
                .map(|ms| Directive::Wait(Duration::from_millis(ms)))
                .map_err(|_| format!("wait needs milliseconds, got `{rest}`")),
            "reload" => Ok(Directive::Reload),
            "quit" => Ok(Directive::Quit),
            "send" | "recv" => Err(format!("`{word}` needs a line")),
            _ => Err(format!("unknown directive `{word}`")),
        }
    }
}

/// Blank lines and `#` comments carry no directive.
pub fn parse_line(line: &str) -> Option<Result<Directive, String>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line.parse())
}

/// Printer and notifier that write protocol lines to `W`. Clones share the
/// writer so lines never interleave.
pub struct JsonLines<W> {
    out: Arc<Mutex<W>>,
}

impl<W> Clone for JsonLines<W> {
    fn clone(&self) -> Self {
        Self {
            out: self.out.clone(),
        }
    }
}

impl<W: Write> JsonLines<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        self.out.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, value: &serde_json::Value) -> Result<(), BoxError> {
        let mut out = self.lock();
        writeln!(out, "{value}")?;
        out.flush()?;
        Ok(())
    }

    /// Inspect the writer, e.g. a buffer captured in tests.
    pub fn with_output<T>(&self, f: impl FnOnce(&W) -> T) -> T {
        f(&self.lock())
    }
}

impl<W: Write> Printer for JsonLines<W> {
    fn send_command(&mut self, command: &str) -> Result<(), BoxError> {
        self.emit(&json!({ "type": "command", "text": command }))
    }
    fn cancel_print(&mut self) -> Result<(), BoxError> {
        self.emit(&json!({ "type": "cancel" }))
    }
    fn pause_print(&mut self) -> Result<(), BoxError> {
        self.emit(&json!({ "type": "pause" }))
    }
}

impl<W: Write> Notifier for JsonLines<W> {
    fn publish(&mut self, notice: Notice) -> Result<(), BoxError> {
        let value = match (notice.kind, notice.no_filament) {
            (NoticeKind::Status, Some(no_filament)) => {
                json!({ "type": "filamentStatus", "noFilament": no_filament })
            }
            _ => json!({
                "type": "notice",
                "kind": notice.kind.as_str(),
                "msg": notice.message,
                "autoClose": notice.auto_close,
            }),
        };
        self.emit(&value)
    }
}

/// Spawn a thread forwarding stdin lines; the channel closes at EOF.
fn stdin_lines() -> xch::Receiver<String> {
    let (tx, rx) = xch::unbounded();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(l) => {
                    if tx.send(l).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

/// Drive `rt` from stdin directives until `quit`, EOF or Ctrl-C.
pub fn serve<W: Write>(
    rt: &Runtime,
    config_path: &Path,
    sim: Option<&runout_hardware::SimHandle>,
    out: &JsonLines<W>,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let lines = stdin_lines();
    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("interrupted; shutting down");
            break;
        }
        let line = match lines.recv_timeout(Duration::from_millis(100)) {
            Ok(l) => l,
            Err(xch::RecvTimeoutError::Timeout) => continue,
            Err(xch::RecvTimeoutError::Disconnected) => {
                tracing::debug!("stdin closed");
                break;
            }
        };
        let directive = match parse_line(&line) {
            None => continue,
            Some(Ok(d)) => d,
            Some(Err(e)) => {
                tracing::warn!(line = %line, error = %e, "ignoring directive");
                continue;
            }
        };
        match directive {
            Directive::Event(e) => rt.lifecycle(e),
            Directive::Send(cmd) => {
                rt.before_send(&cmd);
            }
            Directive::Recv(l) => {
                rt.on_response_line(&l);
            }
            Directive::Level(level) => match sim {
                Some(h) => h.set(level),
                None => tracing::warn!("`level` needs a simulated sensor (--sim-level)"),
            },
            Directive::Wait(d) => std::thread::sleep(d),
            Directive::Reload => reload(rt, config_path, out),
            Directive::Quit => break,
        }
    }
    Ok(())
}

fn reload<W: Write>(rt: &Runtime, path: &Path, out: &JsonLines<W>) {
    let parsed = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read {}", path.display()))
        .and_then(|text| runout_config::load_toml(&text).wrap_err("parse config"));
    match parsed {
        Ok(cfg) => {
            tracing::info!(path = %path.display(), "settings reloaded");
            rt.settings_saved(cfg);
        }
        Err(e) => {
            tracing::warn!(error = %e, "settings reload failed");
            let mut n = out.clone();
            let _ = n.publish(Notice::error(format!("Settings rejected: {e:#}"), true));
        }
    }
}
