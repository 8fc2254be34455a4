use super::{conversation::Conversation, status::StatusTracker};

/// Mutable state of one run, threaded by `&mut` through planning and execution
#[derive(Debug)]
pub struct RunContext {
    pub conversation: Conversation,
    pub tracker: StatusTracker,
}

impl RunContext {
    pub fn new(tracker: StatusTracker) -> Self {
        Self {
            conversation: Conversation::new(),
            tracker,
        }
    }
}
