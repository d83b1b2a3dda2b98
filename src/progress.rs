//! Registry of in-flight report tasks.
//!
//! Every concurrently running query registers itself once and marks
//! itself complete once. Rendering reads a snapshot to show "N of M".

use crate::error::ProgressError;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{debug, warn};

/// One tracked task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressTask {
    pub id: String,
    pub complete: bool,
}

/// Progress registry shared by reference between sibling tasks.
#[derive(Default)]
pub struct ProgressTracker {
    tasks: Mutex<Vec<ProgressTask>>,
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracker that also drives a terminal progress bar.
    pub fn with_progress_bar() -> Self {
        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        Self {
            tasks: Mutex::new(Vec::new()),
            bar: Some(pb),
        }
    }

    /// Register a new task as incomplete.
    pub fn register(&self, id: impl Into<String>) -> Result<(), ProgressError> {
        let id = id.into();
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());

        if tasks.iter().any(|task| task.id == id) {
            return Err(ProgressError::DuplicateRegistration(id));
        }

        debug!("Registered progress task: {}", id);
        tasks.push(ProgressTask {
            id,
            complete: false,
        });

        if let Some(ref pb) = self.bar {
            pb.inc_length(1);
        }
        Ok(())
    }

    /// Mark a task complete. Repeated calls are harmless; an unknown id
    /// is ignored with a warning.
    pub fn complete(&self, id: &str) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());

        match tasks.iter_mut().find(|task| task.id == id) {
            Some(task) if !task.complete => {
                task.complete = true;
                debug!("Completed progress task: {}", id);
                if let Some(ref pb) = self.bar {
                    pb.inc(1);
                    pb.set_message(id.to_string());
                }
            }
            Some(_) => {}
            None => warn!("Ignoring completion of unregistered progress task: {}", id),
        }
    }

    /// Current id -> complete mapping.
    pub fn snapshot(&self) -> BTreeMap<String, bool> {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks
            .iter()
            .map(|task| (task.id.clone(), task.complete))
            .collect()
    }

    /// Tasks in registration order.
    #[cfg(test)]
    pub fn tasks(&self) -> Vec<ProgressTask> {
        self.tasks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns `(completed, total)`.
    pub fn counts(&self) -> (usize, usize) {
        let tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        let done = tasks.iter().filter(|task| task.complete).count();
        (done, tasks.len())
    }

    pub fn is_finished(&self) -> bool {
        let (done, total) = self.counts();
        done == total
    }

    /// Clear the terminal bar, if any.
    pub fn finish(&self) {
        if let Some(ref pb) = self.bar {
            pb.finish_and_clear();
        }
    }
}
