//! Shadow Call Stack
//!
//! Mirrors the real call stack one frame per call. Only frames of tracked
//! calls carry a context; everything else is a placeholder that exists to
//! keep push/pop counts balanced with the traced program.

use crate::domain::event::SourceLocation;

/// Frame of a tracked call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackContext {
    pub source: String,
    pub method_name: String,
    pub caller_location: SourceLocation,
}

#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<Option<StackContext>>,
    /// Indices into `frames` of the non-placeholder frames
    contexts: Vec<usize>,
    /// Depth of the frame that started an ignored subtree
    ignored_depth: Option<usize>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, context: Option<StackContext>) {
        if context.is_some() {
            self.contexts.push(self.frames.len());
        }
        self.frames.push(context);
    }

    /// Push a placeholder and ignore everything above it until it is popped.
    pub fn push_ignored(&mut self) {
        self.push(None);
        if self.ignored_depth.is_none() {
            self.ignored_depth = Some(self.frames.len());
        }
    }

    /// Pop the top frame. No-op on an empty stack: streams may start
    /// mid-call.
    pub fn pop(&mut self) {
        let depth = self.frames.len();
        if depth == 0 {
            return;
        }

        if self.ignored_depth == Some(depth) {
            self.ignored_depth = None;
        }
        if self.contexts.last() == Some(&(depth - 1)) {
            self.contexts.pop();
        }
        self.frames.pop();
    }

    /// Context of the immediate top frame; `None` for a placeholder.
    pub fn top(&self) -> Option<&StackContext> {
        self.frames.last().and_then(Option::as_ref)
    }

    /// Most recent non-placeholder frame.
    pub fn last_context(&self) -> Option<&StackContext> {
        self.contexts
            .last()
            .and_then(|index| self.frames.get(*index))
            .and_then(Option::as_ref)
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored_depth.is_some()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn context_depth(&self) -> usize {
        self.contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(source: &str) -> StackContext {
        StackContext {
            source: source.to_string(),
            method_name: "call".to_string(),
            caller_location: SourceLocation::new("a.rb", 1),
        }
    }

    #[test]
    fn test_pop_on_empty_is_noop() {
        let mut stack = CallStack::new();
        stack.pop();
        stack.pop();
        assert!(stack.is_empty());
        stack.push(None);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_top_does_not_skip_placeholders() {
        let mut stack = CallStack::new();
        stack.push(Some(context("A")));
        stack.push(None);

        assert!(stack.top().is_none());
        assert_eq!(stack.last_context().map(|c| c.source.as_str()), Some("A"));

        stack.pop();
        assert_eq!(stack.top().map(|c| c.source.as_str()), Some("A"));
        stack.pop();
        assert!(stack.last_context().is_none());
        assert_eq!(stack.context_depth(), 0);
    }

    #[test]
    fn test_ignored_until_matching_pop() {
        let mut stack = CallStack::new();
        stack.push(Some(context("A")));
        stack.push_ignored();
        stack.push(None);
        stack.push_ignored();
        assert!(stack.is_ignored());

        stack.pop();
        stack.pop();
        assert!(stack.is_ignored());
        stack.pop();
        assert!(!stack.is_ignored());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_balance_after_deep_replay() {
        let mut stack = CallStack::new();
        for i in 0..50_000 {
            if i % 3 == 0 {
                stack.push(Some(context("A")));
            } else {
                stack.push(None);
            }
        }
        assert_eq!(stack.depth(), 50_000);
        for _ in 0..50_000 {
            stack.pop();
        }
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.context_depth(), 0);
    }
}
