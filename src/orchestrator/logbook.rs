//! Dashboard event log
//!
//! A bounded in-memory ring (newest kept) that the UI queries, plus an
//! optional durable JSON mirror written by a background thread. The mirror
//! is best-effort: if the thread is gone or the disk write fails, appends
//! still succeed and nothing upstream notices.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;

use serde_json::Value;

use crate::protocol::{LogEntry, LogLevel, LogQuery, LogStats};

/// In-memory ring size
pub const RING_CAPACITY: usize = 2000;
/// Entries kept in the durable file
pub const MIRROR_CAPACITY: usize = 5000;
/// Entries pulled from the durable file at startup
pub const HISTORY_ON_START: usize = 300;
/// Entries returned by a log query
pub const QUERY_LIMIT: usize = 400;

/// Append-only handle to the mirror thread
#[derive(Debug)]
pub struct Mirror {
    tx: mpsc::Sender<LogEntry>,
}

impl Mirror {
    /// Start the writer thread. `existing` is the current file content.
    pub fn spawn(path: PathBuf, existing: Vec<LogEntry>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<LogEntry>();
        thread::Builder::new()
            .name("log-mirror".into())
            .spawn(move || {
                let mut file_entries: VecDeque<LogEntry> = existing.into();
                while let Ok(entry) = rx.recv() {
                    file_entries.push_back(entry);
                    // Batch whatever queued up meanwhile into a single write
                    file_entries.extend(rx.try_iter());
                    while file_entries.len() > MIRROR_CAPACITY {
                        file_entries.pop_front();
                    }
                    if let Err(e) = write_entries(&path, &file_entries) {
                        log::debug!("Log mirror write to {} failed: {e}", path.display());
                    }
                }
            })?;
        Ok(Self { tx })
    }

    fn send(&self, entry: LogEntry) {
        // Writer gone: drop the entry
        let _ = self.tx.send(entry);
    }
}

fn write_entries(path: &Path, entries: &VecDeque<LogEntry>) -> std::io::Result<()> {
    let json = serde_json::to_vec(entries)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)
}

/// Result of reading the durable file at startup
#[derive(Debug, Default)]
pub struct History {
    /// Full file content, handed to the mirror so it keeps appending
    pub entries: Vec<LogEntry>,
    /// The file existed but could not be parsed
    pub corrupt: bool,
}

/// Read the durable file; a missing file is an empty history
pub fn load_history(path: &Path) -> History {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => return History::default(),
    };
    match serde_json::from_slice::<Vec<LogEntry>>(&bytes) {
        Ok(entries) => History {
            entries,
            corrupt: false,
        },
        Err(e) => {
            log::warn!("Could not parse log file {}: {e}", path.display());
            History {
                entries: Vec::new(),
                corrupt: true,
            }
        }
    }
}

/// Bounded log ring with optional durable mirror
#[derive(Debug)]
pub struct Logbook {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    mirror: Option<Mirror>,
}

impl Default for Logbook {
    fn default() -> Self {
        Self::new(RING_CAPACITY)
    }
}

impl Logbook {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(RING_CAPACITY)),
            capacity: capacity.max(1),
            mirror: None,
        }
    }

    /// Seed the ring with the tail of a previous session
    pub fn with_history(mut self, history: &[LogEntry]) -> Self {
        let skip = history.len().saturating_sub(HISTORY_ON_START);
        for entry in &history[skip..] {
            self.push_entry(entry.clone());
        }
        self
    }

    /// Ring seeded from `path` and mirrored back to it
    ///
    /// A corrupt file is noted in the ring; a mirror that cannot start only
    /// costs durability.
    pub fn open(path: &Path, now: f64) -> Self {
        let history = load_history(path);
        let mut book = Self::default().with_history(&history.entries);
        if history.corrupt {
            book.append(now, LogLevel::Warn, "failed to load logs", None);
        }
        match Mirror::spawn(path.to_path_buf(), history.entries) {
            Ok(mirror) => book.with_mirror(mirror),
            Err(e) => {
                log::warn!("Log mirror disabled: {e}");
                book
            }
        }
    }

    pub fn with_mirror(mut self, mirror: Mirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    fn push_entry(&mut self, entry: LogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Record an event; echoed to the `log` facade and the mirror
    pub fn append(&mut self, timestamp: f64, level: LogLevel, message: &str, detail: Option<Value>) {
        let rendered = match &detail {
            Some(d) => format!("{message} {d}"),
            None => message.to_string(),
        };
        match level {
            LogLevel::Info => log::info!("{rendered}"),
            LogLevel::Warn => log::warn!("{rendered}"),
            LogLevel::Error => log::error!("{rendered}"),
        }

        let entry = LogEntry {
            timestamp,
            level,
            message: message.to_string(),
            detail,
        };
        if let Some(mirror) = &self.mirror {
            mirror.send(entry.clone());
        }
        self.push_entry(entry);
    }

    /// Drop everything in memory (the durable file keeps its history)
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> LogStats {
        let mut stats = LogStats::default();
        for entry in &self.entries {
            let msg = entry.message.to_lowercase();
            if msg.contains("launch") {
                stats.launch_count += 1;
            }
            if msg.starts_with("score submitted") {
                stats.scored_runs += 1;
            }
        }
        stats
    }

    /// Most recent `QUERY_LIMIT` entries plus counters over the whole ring
    pub fn query(&self) -> LogQuery {
        let skip = self.entries.len().saturating_sub(QUERY_LIMIT);
        LogQuery {
            logs: self.entries.iter().skip(skip).cloned().collect(),
            stats: self.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::{Duration, Instant};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("asphalt-logbook-{}-{name}.json", std::process::id()))
    }

    #[test]
    fn test_ring_keeps_newest() {
        let mut book = Logbook::new(3);
        for i in 0..5 {
            book.append(i as f64, LogLevel::Info, &format!("event {i}"), None);
        }
        let msgs: Vec<_> = book.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(msgs, vec!["event 2", "event 3", "event 4"]);
    }

    #[test]
    fn test_stats_and_query_limit() {
        let mut book = Logbook::default();
        book.append(0.0, LogLevel::Info, "Launching game", None);
        book.append(0.0, LogLevel::Info, "Game launched", Some(json!({"pid": 1})));
        book.append(0.0, LogLevel::Error, "Failed to launch game", None);
        book.append(0.0, LogLevel::Info, "Score submitted by game", None);
        for _ in 0..500 {
            book.append(0.0, LogLevel::Info, "Theme changed", None);
        }
        let q = book.query();
        assert_eq!(q.logs.len(), QUERY_LIMIT);
        assert_eq!(q.stats, LogStats { launch_count: 3, scored_runs: 1 });
    }

    #[test]
    fn test_history_tail_loaded() {
        let history: Vec<_> = (0..350)
            .map(|i| LogEntry {
                timestamp: i as f64,
                level: LogLevel::Info,
                message: format!("old {i}"),
                detail: None,
            })
            .collect();
        let book = Logbook::default().with_history(&history);
        assert_eq!(book.len(), HISTORY_ON_START);
        assert_eq!(book.entries().next().unwrap().message, "old 50");
    }

    #[test]
    fn test_corrupt_file_flagged() {
        let path = temp_path("corrupt");
        fs::write(&path, b"{not json").unwrap();
        let history = load_history(&path);
        assert!(history.corrupt);
        assert!(history.entries.is_empty());
        let _ = fs::remove_file(&path);

        let missing = load_history(&temp_path("missing"));
        assert!(!missing.corrupt);
    }

    #[test]
    fn test_mirror_writes_file() {
        let path = temp_path("mirror");
        let _ = fs::remove_file(&path);
        let mirror = Mirror::spawn(path.clone(), Vec::new()).unwrap();
        let mut book = Logbook::default().with_mirror(mirror);
        book.append(1.0, LogLevel::Info, "Dashboard starting", None);
        book.append(2.0, LogLevel::Warn, "submit_score invalid JSON", None);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut loaded = Vec::new();
        while Instant::now() < deadline {
            loaded = load_history(&path).entries;
            if loaded.len() == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].level, LogLevel::Warn);

        // Clearing memory leaves the file alone
        book.clear();
        assert!(book.is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_open_notes_corrupt_file() {
        let path = temp_path("open-corrupt");
        fs::write(&path, b"[{\"t\": oops").unwrap();
        let book = Logbook::open(&path, 3.0);
        let q = book.query();
        assert_eq!(q.logs.len(), 1);
        assert_eq!(q.logs[0].message, "failed to load logs");
        assert_eq!(q.logs[0].level, LogLevel::Warn);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_mirror_failure_is_silent() {
        let bad = PathBuf::from("/definitely/not/a/dir/logs.json");
        let mirror = Mirror::spawn(bad, Vec::new()).unwrap();
        let mut book = Logbook::default().with_mirror(mirror);
        book.append(1.0, LogLevel::Info, "still fine", None);
        assert_eq!(book.len(), 1);
    }
}
