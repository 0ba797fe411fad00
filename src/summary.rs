//! Scalar summaries emitted while computing losses
use crate::NetFloat;
use log::info;

pub trait SummaryWriter {
    fn scalar(&mut self, tag: &str, value: NetFloat);
}

/// Writes every scalar to the `info` log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSummaryWriter;

impl SummaryWriter for LogSummaryWriter {
    fn scalar(&mut self, tag: &str, value: NetFloat) {
        info!("summary {} = {}", tag, value);
    }
}

/// Keeps every scalar in memory, in the order it was written.
#[derive(Clone, Debug, Default)]
pub struct RecordingSummaryWriter {
    scalars: Vec<(String, NetFloat)>,
}

impl RecordingSummaryWriter {
    pub fn scalars(&self) -> &[(String, NetFloat)] {
        &self.scalars
    }

    /// Most recent value written under `tag`.
    pub fn last(&self, tag: &str) -> Option<NetFloat> {
        self.scalars
            .iter()
            .rev()
            .find(|(t, _)| t == tag)
            .map(|&(_, v)| v)
    }
}

impl SummaryWriter for RecordingSummaryWriter {
    fn scalar(&mut self, tag: &str, value: NetFloat) {
        self.scalars.push((tag.to_string(), value));
    }
}
