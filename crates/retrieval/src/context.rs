//! Token-budgeted accumulation of retrieved content.
//!
//! ```text
//!   RetrievalResult ──► ContextManager::add_result
//!                          │ fits?  ──yes──► ContextWindow::add_content
//!                          │
//!                          └─no──► rank held entries by relevance,
//!                                  drop those under the floor,
//!                                  keep the best that fit beside the
//!                                  newcomer, rebuild the window
//! ```
//!
//! Token costs come from [`orca_protocol::estimate_tokens`] and are computed
//! once per entry, so `current_tokens` is always the sum of entry costs.

use crate::config::ContextConfig;
use orca_protocol::{estimate_tokens, RetrievalResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub struct WindowEntry {
    pub result: RetrievalResult,
    pub relevance: f32,
    pub tokens: usize,
}

impl WindowEntry {
    pub fn new(result: RetrievalResult) -> Self {
        let tokens = estimate_result_tokens(&result);
        let relevance = result.relevance();
        Self {
            result,
            relevance,
            tokens,
        }
    }
}

/// Estimated cost of a result: its chunk contents plus its serialised context
pub fn estimate_result_tokens(result: &RetrievalResult) -> usize {
    let chunks: usize = result
        .chunks()
        .iter()
        .map(|chunk| estimate_tokens(&chunk.content))
        .sum();
    let context = result
        .context()
        .and_then(|ctx| serde_json::to_string(ctx).ok())
        .map_or(0, |json| estimate_tokens(&json));
    chunks + context
}

/// Fixed-capacity accumulator. Mutations that would overflow are refused.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    max_tokens: usize,
    current_tokens: usize,
    entries: Vec<WindowEntry>,
}

impl ContextWindow {
    pub const fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            current_tokens: 0,
            entries: Vec::new(),
        }
    }

    pub const fn can_add(&self, tokens: usize) -> bool {
        match self.current_tokens.checked_add(tokens) {
            Some(total) => total <= self.max_tokens,
            None => false,
        }
    }

    pub fn add_content(&mut self, entry: WindowEntry) -> bool {
        if !self.can_add(entry.tokens) {
            return false;
        }
        self.current_tokens += entry.tokens;
        self.entries.push(entry);
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_tokens = 0;
    }

    pub const fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub const fn current_tokens(&self) -> usize {
        self.current_tokens
    }

    pub fn entries(&self) -> &[WindowEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        if self.max_tokens == 0 {
            return 0.0;
        }
        self.current_tokens as f64 / self.max_tokens as f64
    }

    fn take_entries(&mut self) -> Vec<WindowEntry> {
        self.current_tokens = 0;
        std::mem::take(&mut self.entries)
    }
}

/// Snapshot for reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextUsage {
    pub current_tokens: usize,
    pub max_tokens: usize,
    pub entries: usize,
    pub utilization: f64,
    pub admitted: u64,
    pub evicted: u64,
    pub rejected: u64,
}

/// Owns one [`ContextWindow`] and decides what stays in it.
#[derive(Debug)]
pub struct ContextManager {
    window: ContextWindow,
    min_relevance: f32,
    admitted: u64,
    evicted: u64,
    rejected: u64,
}

impl ContextManager {
    pub const fn new(max_tokens: usize, min_relevance: f32) -> Self {
        Self {
            window: ContextWindow::new(max_tokens),
            min_relevance,
            admitted: 0,
            evicted: 0,
            rejected: 0,
        }
    }

    pub const fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.max_tokens, config.min_relevance)
    }

    /// Admit `result`, evicting lower-relevance entries if it does not fit.
    ///
    /// Returns false, leaving the window untouched, only when the result on
    /// its own is larger than the whole window.
    pub fn add_result(&mut self, result: RetrievalResult) -> bool {
        let entry = WindowEntry::new(result);
        if self.window.can_add(entry.tokens) {
            self.window.add_content(entry);
            self.admitted += 1;
            return true;
        }
        self.optimize_window(entry)
    }

    fn optimize_window(&mut self, incoming: WindowEntry) -> bool {
        let budget = self.window.max_tokens();
        if incoming.tokens > budget {
            log::warn!(
                "Result needs {} tokens, window holds {budget}; not admitted",
                incoming.tokens
            );
            self.rejected += 1;
            return false;
        }

        let mut held = self.window.take_entries();
        held.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));

        let mut used = incoming.tokens;
        let mut dropped = 0u64;
        for entry in held {
            if entry.relevance >= self.min_relevance && used + entry.tokens <= budget {
                used += entry.tokens;
                self.window.add_content(entry);
            } else {
                dropped += 1;
            }
        }
        self.window.add_content(incoming);

        self.evicted += dropped;
        self.admitted += 1;
        log::debug!(
            "Context window rebuilt: evicted {dropped}, kept {} entries ({} / {budget} tokens)",
            self.window.len(),
            self.window.current_tokens()
        );
        true
    }

    /// Results currently represented in the window
    pub fn current_context(&self) -> Vec<&RetrievalResult> {
        self.window.entries().iter().map(|e| &e.result).collect()
    }

    pub const fn window(&self) -> &ContextWindow {
        &self.window
    }

    pub fn clear(&mut self) {
        self.window.clear();
    }

    pub fn usage(&self) -> ContextUsage {
        ContextUsage {
            current_tokens: self.window.current_tokens(),
            max_tokens: self.window.max_tokens(),
            entries: self.window.len(),
            utilization: self.window.utilization(),
            admitted: self.admitted,
            evicted: self.evicted,
            rejected: self.rejected,
        }
    }
}
