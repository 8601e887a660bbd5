use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::mpsc;

use crate::reports::ReportType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Generating,
    Completed,
    Error,
}

/// One progress event per pipeline stage boundary. Transient: the UI-side
/// consumer keeps only the latest event per report type.
#[derive(Debug, Clone, Serialize)]
pub struct ReportProgress {
    pub report_type: ReportType,
    pub status: ReportStatus,
    pub percent: u8,
    pub message: Option<String>,
}

/// Channel-backed replacement for the callback the pipeline stages would
/// otherwise thread through every function. Cheap to clone; sends are
/// fire-and-forget so a dropped consumer never fails a report.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    report_type: ReportType,
    tx: mpsc::UnboundedSender<ReportProgress>,
}

impl ProgressSender {
    pub fn new(report_type: ReportType, tx: mpsc::UnboundedSender<ReportProgress>) -> Self {
        Self { report_type, tx }
    }

    pub fn channel(
        report_type: ReportType,
    ) -> (Self, mpsc::UnboundedReceiver<ReportProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(report_type, tx), rx)
    }

    pub fn send(&self, status: ReportStatus, percent: u8, message: impl Into<String>) {
        let _ = self.tx.send(ReportProgress {
            report_type: self.report_type,
            status,
            percent: percent.min(100),
            message: Some(message.into()),
        });
    }

    pub fn update(&self, percent: u8, message: impl Into<String>) {
        self.send(ReportStatus::Generating, percent, message);
    }

    pub fn completed(&self) {
        self.send(ReportStatus::Completed, 100, "Report ready");
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(ReportStatus::Error, 100, message);
    }
}

/// Latest progress per report type, keyed so concurrent invocations never
/// touch each other's slot. Entries are created on dispatch and cleared by
/// the consumer once displayed.
#[derive(Debug, Clone, Default)]
pub struct ProgressBoard {
    inner: Arc<Mutex<HashMap<ReportType, ReportProgress>>>,
}

impl ProgressBoard {
    pub fn record(&self, event: ReportProgress) {
        if let Ok(mut map) = self.inner.lock() {
            map.insert(event.report_type, event);
        }
    }

    pub fn get(&self, report_type: ReportType) -> Option<ReportProgress> {
        self.inner
            .lock()
            .ok()
            .and_then(|map| map.get(&report_type).cloned())
    }

    pub fn clear(&self, report_type: ReportType) {
        if let Ok(mut map) = self.inner.lock() {
            map.remove(&report_type);
        }
    }
}
