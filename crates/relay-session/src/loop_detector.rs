//! Loop Detector (§4.G): a sliding window of tool-call signatures,
//! checked for period-1/2/3 repetition after every record. Signatures
//! are `name:hash(args_json)`, hashed with `DefaultHasher` in the same
//! manner the teacher hashes subagent purposes for naming.

use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

const DEFAULT_WINDOW: usize = 10;

pub struct LoopDetector {
    window: usize,
    signatures: VecDeque<u64>,
}

impl LoopDetector {
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    pub fn with_window(window: usize) -> Self {
        Self {
            window: window.max(1),
            signatures: VecDeque::with_capacity(window.max(1)),
        }
    }

    pub fn signature(name: &str, args: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        args.to_string().hash(&mut hasher);
        hasher.finish()
    }

    /// Records a tool call and reports whether the window now exhibits a
    /// period-1, period-2, or period-3 repetition.
    pub fn record(&mut self, name: &str, args: &Value) -> bool {
        if self.signatures.len() == self.window {
            self.signatures.pop_front();
        }
        self.signatures.push_back(Self::signature(name, args));
        self.detect()
    }

    pub fn reset(&mut self) {
        self.signatures.clear();
    }

    fn detect(&self) -> bool {
        self.period_1() || self.period_2() || self.period_3()
    }

    fn last_n(&self, n: usize) -> Option<Vec<u64>> {
        if self.signatures.len() < n {
            return None;
        }
        Some(self.signatures.iter().rev().take(n).copied().collect())
    }

    fn period_1(&self) -> bool {
        let Some(last) = self.last_n(5) else { return false };
        last.windows(2).all(|w| w[0] == w[1])
    }

    fn period_2(&self) -> bool {
        let Some(last) = self.last_n(6) else { return false };
        let (a, b) = (last[0], last[1]);
        if a == b {
            return false;
        }
        last.chunks(2).all(|pair| pair == [a, b])
    }

    fn period_3(&self) -> bool {
        let Some(last) = self.last_n(6) else { return false };
        let (a, b, c) = (last[0], last[1], last[2]);
        if a == b || b == c || a == c {
            return false;
        }
        last.chunks(3).all(|triple| triple == [a, b, c])
    }
}

impl Default for LoopDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn period_1_after_five_identical_calls() {
        let mut detector = LoopDetector::new();
        let mut looped = false;
        for _ in 0..5 {
            looped = detector.record("grep", &json!({"pattern": "x"}));
        }
        assert!(looped);
    }

    #[test]
    fn period_1_not_triggered_by_four_identical_calls() {
        let mut detector = LoopDetector::new();
        let mut looped = false;
        for _ in 0..4 {
            looped = detector.record("grep", &json!({"pattern": "x"}));
        }
        assert!(!looped);
    }

    #[test]
    fn period_2_alternating_pair_triggers() {
        let mut detector = LoopDetector::new();
        let calls = [
            ("a", json!({})),
            ("b", json!({})),
            ("a", json!({})),
            ("b", json!({})),
            ("a", json!({})),
        ];
        let mut looped = false;
        for (name, args) in &calls {
            looped = detector.record(name, args);
        }
        looped = looped || detector.record("b", &json!({}));
        assert!(looped);
    }

    #[test]
    fn period_3_distinct_triple_repeats_triggers() {
        let mut detector = LoopDetector::new();
        let calls = [
            ("a", json!({})),
            ("b", json!({})),
            ("c", json!({})),
            ("a", json!({})),
            ("b", json!({})),
            ("c", json!({})),
        ];
        let mut looped = false;
        for (name, args) in &calls {
            looped = detector.record(name, args);
        }
        assert!(looped);
    }

    #[test]
    fn varied_calls_do_not_trigger() {
        let mut detector = LoopDetector::new();
        let calls = [
            ("a", json!({})),
            ("b", json!({})),
            ("c", json!({})),
            ("d", json!({})),
            ("e", json!({})),
        ];
        let mut looped = false;
        for (name, args) in &calls {
            looped = detector.record(name, args);
        }
        assert!(!looped);
    }

    #[test]
    fn reset_clears_the_window() {
        let mut detector = LoopDetector::new();
        for _ in 0..4 {
            detector.record("grep", &json!({}));
        }
        detector.reset();
        assert!(!detector.record("grep", &json!({})));
    }

    #[test]
    fn window_evicts_oldest_on_overflow() {
        let mut detector = LoopDetector::with_window(3);
        detector.record("a", &json!({}));
        detector.record("b", &json!({}));
        detector.record("c", &json!({}));
        detector.record("d", &json!({}));
        assert_eq!(detector.signatures.len(), 3);
    }
}
