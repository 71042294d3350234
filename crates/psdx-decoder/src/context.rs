/*
 * Copyright (c) 2023.
 *
 * This software is free software;
 *
 * You can redistribute it or modify it under terms of the MIT, Apache License or Zlib license
 */

//! Per file decoding state
use alloc::vec::Vec;

use log::warn;

use crate::constants::DEFAULT_WARNING_LIMIT;
use crate::errors::DecodeWarning;

/// State shared by every stage of a single file's decode.
///
/// A new context is created for every file, and every worker thread
/// gets its own per layer, nothing here is shared between files.
#[derive(Debug, Clone)]
pub struct ParseContext {
    merged_alpha:  bool,
    warnings:      Vec<DecodeWarning>,
    counted:       usize,
    warning_limit: usize,
    /// Worker contexts record without logging, their warnings are
    /// logged when absorbed
    logging:       bool
}

impl Default for ParseContext {
    fn default() -> Self {
        ParseContext::new(DEFAULT_WARNING_LIMIT)
    }
}

impl ParseContext {
    pub fn new(warning_limit: usize) -> ParseContext {
        ParseContext {
            merged_alpha: false,
            warnings: Vec::new(),
            counted: 0,
            warning_limit,
            logging: true
        }
    }

    /// Forget everything learned about the previous file
    pub fn reset(&mut self) {
        self.merged_alpha = false;
        self.warnings.clear();
        self.counted = 0;
    }

    /// Whether the first extra channel of the merged image is its transparency
    pub const fn merged_alpha(&self) -> bool {
        self.merged_alpha
    }

    pub fn set_merged_alpha(&mut self, yes: bool) {
        self.merged_alpha = yes;
    }

    /// Record a warning and log it.
    ///
    /// Structural warnings are always kept. Counted warnings past the
    /// limit are only tallied, a single notice is logged when the
    /// limit is first exceeded.
    pub fn warn(&mut self, warning: DecodeWarning) {
        if warning.is_counted() && self.counted >= self.warning_limit {
            self.tally_suppressed(1);
            return;
        }
        if warning.is_counted() {
            self.counted += 1;
        }
        if self.logging {
            warn!("{warning}");
        }
        self.warnings.push(warning);
    }

    fn tally_suppressed(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        if self.counted == self.warning_limit && self.logging {
            warn!("(further warnings suppressed)");
        }
        self.counted += count;
    }

    /// Recorded warnings, structural ones and counted ones up to the limit
    pub fn warnings(&self) -> &[DecodeWarning] {
        &self.warnings
    }

    /// Number of counted warnings raised so far, suppressed ones included
    pub const fn counted_warnings(&self) -> usize {
        self.counted
    }

    /// Counted warnings raised past the limit, tallied but not recorded
    pub const fn suppressed_warnings(&self) -> usize {
        self.counted.saturating_sub(self.warning_limit)
    }

    /// Fold the warnings of a worker context into this one.
    ///
    /// The worker's warnings go through [`warn`](Self::warn) in the
    /// order they were raised, so they are logged here against this
    /// context's limit. Absorbing workers in layer order gives the
    /// same warnings as decoding the layers one after another.
    pub fn absorb(&mut self, worker: ParseContext) {
        let recorded = worker.warnings.iter().filter(|w| w.is_counted()).count();
        let tallied = worker.counted - recorded;

        for warning in worker.warnings {
            self.warn(warning);
        }
        self.tally_suppressed(tallied);
    }

    /// A silent context with the same limit, for decoding one layer
    #[cfg(any(feature = "threads", test))]
    pub(crate) fn worker(&self) -> ParseContext {
        ParseContext {
            logging: false,
            ..ParseContext::new(self.warning_limit)
        }
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<DecodeWarning> {
        core::mem::take(&mut self.warnings)
    }
}
