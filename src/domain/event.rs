// Instrumentation events consumed by the tracer.
// Whatever hooks a target platform offers, they are adapted into this
// ordered stream of enter/exit events.

use std::fmt;

use crate::domain::definition::MethodContext;
use crate::domain::type_registry::TypeId;

/// A `file:line` position in traced code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub path: String,
    pub line: u32,
}

impl SourceLocation {
    pub fn new(path: &str, line: u32) -> Self {
        Self {
            path: path.to_string(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

/// The object a method was invoked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// The type itself (class / module method).
    Type(TypeId),
    /// An instance of the type.
    Instance(TypeId),
}

impl Receiver {
    pub fn type_id(&self) -> TypeId {
        match self {
            Receiver::Type(id) | Receiver::Instance(id) => *id,
        }
    }

    pub fn context(&self) -> MethodContext {
        match self {
            Receiver::Type(_) => MethodContext::Class,
            Receiver::Instance(_) => MethodContext::Instance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Enter,
    Exit,
}

/// One call boundary crossing.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub kind: EventKind,
    pub receiver: Receiver,
    pub method_name: String,
    /// Call into natively implemented code
    pub is_native: bool,
    /// Caller frames, innermost first. `backtrace[0]` is the line in the
    /// calling frame where this call was made.
    pub backtrace: Vec<SourceLocation>,
}

impl TraceEvent {
    pub fn enter(receiver: Receiver, method_name: &str, backtrace: Vec<SourceLocation>) -> Self {
        Self {
            kind: EventKind::Enter,
            receiver,
            method_name: method_name.to_string(),
            is_native: false,
            backtrace,
        }
    }

    pub fn native_enter(receiver: Receiver, method_name: &str, backtrace: Vec<SourceLocation>) -> Self {
        Self {
            is_native: true,
            ..Self::enter(receiver, method_name, backtrace)
        }
    }

    pub fn exit(receiver: Receiver, method_name: &str) -> Self {
        Self {
            kind: EventKind::Exit,
            receiver,
            method_name: method_name.to_string(),
            is_native: false,
            backtrace: Vec::new(),
        }
    }

    pub fn native_exit(receiver: Receiver, method_name: &str) -> Self {
        Self {
            is_native: true,
            ..Self::exit(receiver, method_name)
        }
    }
}

/// Anything that accepts an ordered event stream.
pub trait EventSink {
    fn handle(&mut self, event: TraceEvent);
}
