//! Recording device double for hardware-free tests.
//!
//! `MockEncDevice` implements [`EncDevice`] against an in-memory journal:
//! it records block writes in call order, collects wide-offset
//! registrations, counts submit/poll calls, and serves a scripted status
//! block on read-back.  Individual stages can be failed on demand to
//! exercise the fatal-for-this-frame error paths.

use crate::device::{EncDevice, RegBlock, RegOffset};
use crate::error::{HalError, Result};

/// One recorded block write.
#[derive(Clone, Debug)]
pub struct RecordedWrite {
    pub block: RegBlock,
    pub words: Vec<u32>,
}

/// In-memory [`EncDevice`] double.
#[derive(Debug, Default)]
pub struct MockEncDevice {
    /// Block writes in call order.
    pub writes: Vec<RecordedWrite>,
    /// Wide-offset registrations in call order.
    pub offsets: Vec<RegOffset>,
    /// Words served on the next status read.
    pub status_words: Vec<u32>,
    /// Number of submit calls.
    pub submits: u32,
    /// Number of poll calls.
    pub polls: u32,
    /// When set, the named stage fails with a transport error.
    pub fail_stage: Option<&'static str>,
}

impl MockEncDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the status block served after the next poll.
    pub fn with_status(mut self, words: Vec<u32>) -> Self {
        self.status_words = words;
        self
    }

    fn check_stage(&self, stage: &'static str) -> Result<()> {
        if self.fail_stage == Some(stage) {
            return Err(HalError::dispatch(stage, "injected failure"));
        }
        Ok(())
    }

    /// Writes for one block, in call order.
    pub fn writes_for(&self, block: RegBlock) -> Vec<&RecordedWrite> {
        self.writes.iter().filter(|w| w.block == block).collect()
    }
}

impl EncDevice for MockEncDevice {
    fn reg_write(&mut self, block: RegBlock, words: &[u32]) -> Result<()> {
        self.check_stage("reg_write")?;
        self.writes.push(RecordedWrite {
            block,
            words: words.to_vec(),
        });
        Ok(())
    }

    fn reg_read(&mut self, block: RegBlock, words: &mut [u32]) -> Result<()> {
        self.check_stage("reg_read")?;
        debug_assert_eq!(block, RegBlock::Status);
        for (dst, src) in words.iter_mut().zip(self.status_words.iter()) {
            *dst = *src;
        }
        Ok(())
    }

    fn reg_offset(&mut self, cfg: RegOffset) -> Result<()> {
        self.check_stage("reg_offset")?;
        self.offsets.push(cfg);
        Ok(())
    }

    fn submit(&mut self) -> Result<()> {
        self.check_stage("submit")?;
        self.submits += 1;
        Ok(())
    }

    fn poll(&mut self) -> Result<()> {
        self.check_stage("poll")?;
        self.polls += 1;
        Ok(())
    }
}
