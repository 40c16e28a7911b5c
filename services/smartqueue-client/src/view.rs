//! The surface handlers render into
//!
//! A `View` owns the status lines, the queue table and modal alerts. Handlers
//! never return errors; every outcome ends up as a call on the view.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;

/// Visual styling of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Error,
    Info,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tone::Success => write!(f, "ok"),
            Tone::Error => write!(f, "error"),
            Tone::Info => write!(f, "info"),
        }
    }
}

/// Text shown in a status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub tone: Tone,
}

impl Status {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: Tone::Success,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: Tone::Error,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tone: Tone::Info,
        }
    }
}

/// The independent status lines a page has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusSlot {
    /// The customer form's single status message
    Customer,
    /// Result of "serve next"
    Serve,
    /// Result of a duration update
    Duration,
    /// Result of a service-hours update
    Hours,
}

/// One rendered row of the queue table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRow {
    /// Absent in the anonymised customer view
    pub name: Option<String>,
    pub date: String,
    pub time: String,
}

/// Rendering target for customer and staff handlers
pub trait View: Send + Sync {
    fn show_status(&self, slot: StatusSlot, status: Status);

    fn clear_status(&self, slot: StatusSlot);

    /// Blocking, modal message to the user
    fn alert(&self, message: &str);

    /// Replace every row of the queue table
    fn replace_queue(&self, rows: Vec<QueueRow>);
}

#[derive(Debug, Default)]
struct Recorded {
    statuses: HashMap<StatusSlot, Status>,
    status_history: Vec<(StatusSlot, Status)>,
    alerts: Vec<String>,
    rows: Vec<QueueRow>,
    table_replacements: usize,
}

/// View that keeps everything in memory, for headless use and tests
#[derive(Debug, Default)]
pub struct MemoryView {
    recorded: Mutex<Recorded>,
    changed: Notify,
}

impl MemoryView {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current content of a status line
    pub fn status(&self, slot: StatusSlot) -> Option<Status> {
        self.lock().statuses.get(&slot).cloned()
    }

    /// Every status ever shown, oldest first
    pub fn status_history(&self) -> Vec<(StatusSlot, Status)> {
        self.lock().status_history.clone()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.lock().alerts.clone()
    }

    pub fn rows(&self) -> Vec<QueueRow> {
        self.lock().rows.clone()
    }

    /// How many times the table was replaced
    pub fn table_replacements(&self) -> usize {
        self.lock().table_replacements
    }

    /// Wait until `check` holds, or give up after `timeout`
    pub async fn wait_until<F>(&self, timeout: Duration, check: F) -> bool
    where
        F: Fn(&MemoryView) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.changed.notified();
            if check(self) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return check(self);
            }
        }
    }
}

impl View for MemoryView {
    fn show_status(&self, slot: StatusSlot, status: Status) {
        {
            let mut recorded = self.lock();
            recorded.status_history.push((slot, status.clone()));
            recorded.statuses.insert(slot, status);
        }
        self.changed.notify_waiters();
    }

    fn clear_status(&self, slot: StatusSlot) {
        self.lock().statuses.remove(&slot);
        self.changed.notify_waiters();
    }

    fn alert(&self, message: &str) {
        self.lock().alerts.push(message.to_string());
        self.changed.notify_waiters();
    }

    fn replace_queue(&self, rows: Vec<QueueRow>) {
        {
            let mut recorded = self.lock();
            recorded.rows = rows;
            recorded.table_replacements += 1;
        }
        self.changed.notify_waiters();
    }
}

/// View that prints to the terminal
#[derive(Debug, Default)]
pub struct TerminalView;

impl TerminalView {
    pub fn new() -> Self {
        Self
    }
}

/// Render rows as a fixed-width text table
pub fn render_table(rows: &[QueueRow]) -> String {
    if rows.is_empty() {
        return "(queue is empty)".to_string();
    }
    let with_names = rows.iter().any(|r| r.name.is_some());
    let name_width = rows
        .iter()
        .filter_map(|r| r.name.as_ref().map(|n| n.chars().count()))
        .max()
        .unwrap_or(0)
        .max("Name".len());

    let mut out = String::new();
    if with_names {
        out.push_str(&format!("{:<name_width$}  {:<10}  Time\n", "Name", "Date"));
    } else {
        out.push_str(&format!("{:<10}  Time\n", "Date"));
    }
    for row in rows {
        if with_names {
            let name = row.name.as_deref().unwrap_or("");
            out.push_str(&format!(
                "{:<name_width$}  {:<10}  {}\n",
                name, row.date, row.time
            ));
        } else {
            out.push_str(&format!("{:<10}  {}\n", row.date, row.time));
        }
    }
    out.truncate(out.trim_end().len());
    out
}

impl View for TerminalView {
    fn show_status(&self, slot: StatusSlot, status: Status) {
        tracing::debug!("Status {:?} -> {:?}", slot, status);
        println!("[{}] {}", status.tone, status.text);
    }

    fn clear_status(&self, slot: StatusSlot) {
        tracing::debug!("Status {:?} cleared", slot);
    }

    fn alert(&self, message: &str) {
        println!();
        println!("*** {} ***", message);
        println!();
    }

    fn replace_queue(&self, rows: Vec<QueueRow>) {
        println!("{}", render_table(&rows));
    }
}
