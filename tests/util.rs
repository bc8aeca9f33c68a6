#![allow(dead_code)]

use std::{borrow::Cow, time::Duration};

use dedup_queue::Identified;

pub fn log() {
    let _ = env_logger::builder()
        .format_file(true)
        .format_target(false)
        .format_level(false)
        .format_timestamp_millis()
        .format_line_number(true)
        .filter_level(log::LevelFilter::Trace)
        .format_module_path(false)
        .is_test(true)
        .try_init();
}

/// Long enough for a spawned thread to reach a blocking call.
pub const SETTLE: Duration = Duration::from_millis(50);

/// A work item whose identity ignores its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub key: String,
    pub revision: u32,
}

impl Job {
    pub fn new(key: &str, revision: u32) -> Self {
        Self {
            key: key.to_owned(),
            revision,
        }
    }
}

impl Identified for Job {
    fn identity(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.key)
    }
}
