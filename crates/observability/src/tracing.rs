//! Tracing subscriber installation.

use std::io;
use std::sync::{Arc, Mutex};

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Used when `RUST_LOG` is unset. sqlx logs every statement at `info`.
pub const DEFAULT_DIRECTIVES: &str = "info,sqlx=warn";

fn filter(default_directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives))
}

/// JSON logs with timestamps, one object per line.
pub fn init(default_directives: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_directives))
        .json()
        .with_current_span(true)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// In-memory sink for JSON log lines.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

pub struct CapturedWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        CapturedWriter(Arc::clone(&self.0))
    }
}

impl io::Write for CapturedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.0.lock().map_err(|_| io::Error::other("log buffer lock poisoned"))?;
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        match self.0.lock() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(poisoned) => String::from_utf8_lossy(&poisoned.into_inner()).into_owned(),
        }
    }

    /// Captured lines at `level` (e.g. `"WARN"`).
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        let needle = format!("\"level\":\"{level}\"");
        self.contents()
            .lines()
            .filter(|line| line.contains(&needle))
            .map(str::to_string)
            .collect()
    }
}

/// Route this thread's events into a [`CapturedLogs`] buffer until the guard drops.
///
/// Thread-local, so async callers must run on a current-thread runtime.
pub fn capture(directives: &str) -> (DefaultGuard, CapturedLogs) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directives))
        .json()
        .with_writer(logs.clone())
        .finish();
    (tracing::subscriber::set_default(subscriber), logs)
}

#[cfg(test)]
mod tests {
    #[test]
    fn capture_collects_events_by_level() {
        let (guard, logs) = super::capture("debug");
        ::tracing::warn!(drift = 3, "counter clamped");
        ::tracing::debug!("noise");
        drop(guard);
        ::tracing::warn!("after guard");

        let warnings = logs.lines_at("WARN");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("counter clamped"));
        assert!(warnings[0].contains("\"drift\":3"));
        assert_eq!(logs.lines_at("DEBUG").len(), 1);
    }

    #[test]
    fn repeated_init_is_a_no_op() {
        super::init(super::DEFAULT_DIRECTIVES);
        super::init(super::DEFAULT_DIRECTIVES);
        ::tracing::info!("still logging");
    }
}
