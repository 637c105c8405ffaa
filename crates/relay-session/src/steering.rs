//! Steering Queue (§4.F): dual FIFO queues behind a single lock,
//! draining atomically so a racing `steer`/`follow_up` call never
//! interleaves with a drain.

use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
pub struct SteeringQueue {
    steering: Mutex<VecDeque<String>>,
    follow_up: Mutex<VecDeque<String>>,
}

impl SteeringQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steer(&self, message: impl Into<String>) {
        self.steering.lock().unwrap().push_back(message.into());
    }

    pub fn follow_up(&self, message: impl Into<String>) {
        self.follow_up.lock().unwrap().push_back(message.into());
    }

    pub fn has_steering(&self) -> bool {
        !self.steering.lock().unwrap().is_empty()
    }

    pub fn has_follow_up(&self) -> bool {
        !self.follow_up.lock().unwrap().is_empty()
    }

    pub fn drain_steering(&self) -> Vec<String> {
        self.steering.lock().unwrap().drain(..).collect()
    }

    pub fn drain_follow_up(&self) -> Vec<String> {
        self.follow_up.lock().unwrap().drain(..).collect()
    }

    /// Pops exactly the next queued follow-up, leaving the remainder queued
    /// for a later turn.
    pub fn pop_follow_up(&self) -> Option<String> {
        self.follow_up.lock().unwrap().pop_front()
    }
}
