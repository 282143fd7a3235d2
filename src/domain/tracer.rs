//! Call-Stack Tracer
//!
//! Turns an ordered stream of enter/exit events into a [`Definition`]. The
//! shadow stack is advanced exactly once per event, so the tracer stays
//! balanced with the traced program regardless of how many calls are
//! untracked, ignored or native.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::call_stack::{CallStack, StackContext};
use crate::domain::definition::{Definition, DefinitionId};
use crate::domain::event::{EventKind, EventSink, SourceLocation, TraceEvent};
use crate::domain::ignored_methods::IgnoredMethods;
use crate::domain::module_set::{AnonymousPolicy, ModuleSet};
use crate::domain::type_registry::TypeRegistry;
use crate::error::Result;

/// Rewrites a `file:line` call site before it is recorded.
#[derive(Clone)]
pub struct CallSiteFilter(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl CallSiteFilter {
    pub fn new(filter: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self(Arc::new(filter))
    }

    pub fn apply(&self, call_site: &str) -> String {
        (self.0)(call_site)
    }
}

impl fmt::Debug for CallSiteFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallSiteFilter(..)")
    }
}

#[derive(Debug, Clone, Default)]
pub struct TraceOptions {
    pub id: DefinitionId,
    pub title: String,
    pub definition_group: Option<String>,
    pub target_modules: Vec<String>,
    /// Also track types declared in these files
    pub include_files: Vec<String>,
    /// Only call sites inside these files are recorded
    pub target_files: Option<HashSet<String>>,
    pub call_site_filter: Option<CallSiteFilter>,
    /// `Type`, `Type.method` or `Type#method`
    pub ignored_methods: Vec<String>,
    pub anonymous_policy: AnonymousPolicy,
    /// Attribute calls to the last tracked frame instead of the top frame
    pub attribute_through_untracked: bool,
    /// Drop native enter/exit pairs entirely
    pub skip_native: bool,
}

impl TraceOptions {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: DefinitionId) -> Self {
        self.id = id;
        self
    }

    pub fn with_definition_group(mut self, group: &str) -> Self {
        self.definition_group = Some(group.to_string());
        self
    }

    pub fn with_target_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_modules = modules.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_include_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_files = Some(files.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_call_site_filter(mut self, filter: CallSiteFilter) -> Self {
        self.call_site_filter = Some(filter);
        self
    }

    pub fn with_ignored_methods<I, S>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_methods = rules.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_anonymous_policy(mut self, policy: AnonymousPolicy) -> Self {
        self.anonymous_policy = policy;
        self
    }

    pub fn attribute_through_untracked(mut self, enabled: bool) -> Self {
        self.attribute_through_untracked = enabled;
        self
    }

    pub fn skip_native(mut self, enabled: bool) -> Self {
        self.skip_native = enabled;
        self
    }
}

/// Result of one trace run. The definition is always present, even when
/// the traced block failed part way.
#[derive(Debug)]
pub struct TraceOutcome<E> {
    pub definition: Definition,
    pub error: Option<E>,
}

impl<E> TraceOutcome<E> {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Discard the partial definition on error.
    pub fn into_result(self) -> std::result::Result<Definition, E> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.definition),
        }
    }
}

/// Validated, reusable trace configuration bound to a type registry.
#[derive(Debug)]
pub struct Tracer<'r> {
    registry: &'r TypeRegistry,
    options: TraceOptions,
    module_set: ModuleSet,
    ignored: IgnoredMethods,
}

impl<'r> Tracer<'r> {
    pub fn new(registry: &'r TypeRegistry, options: TraceOptions) -> Result<Self> {
        let ignored = IgnoredMethods::parse(&options.ignored_methods)?;
        let module_set = ModuleSet::new(&options.target_modules)
            .with_include_files(options.include_files.iter().cloned())
            .with_anonymous_policy(options.anonymous_policy);

        Ok(Self {
            registry,
            options,
            module_set,
            ignored,
        })
    }

    pub fn options(&self) -> &TraceOptions {
        &self.options
    }

    /// Fresh session with an empty stack and definition.
    pub fn session(&self) -> TraceSession<'r> {
        let options = &self.options;
        let definition = Definition::new(options.id, &options.title)
            .with_group(options.definition_group.clone());

        TraceSession {
            registry: self.registry,
            module_set: self.module_set.clone(),
            ignored: self.ignored.clone(),
            target_files: options.target_files.clone(),
            call_site_filter: options.call_site_filter.clone(),
            attribute_through_untracked: options.attribute_through_untracked,
            skip_native: options.skip_native,
            stack: CallStack::new(),
            definition,
            active: false,
        }
    }

    /// Run `block` with an active session. The session is stopped before
    /// the block's error (if any) is handed back.
    pub fn trace<F, E>(&self, block: F) -> TraceOutcome<E>
    where
        F: FnOnce(&mut TraceSession<'r>) -> std::result::Result<(), E>,
    {
        let mut session = self.session();
        session.start();
        let result = block(&mut session);
        session.stop();

        if session.depth() != 0 {
            debug!(depth = session.depth(), "trace ended with frames still on the stack");
        }

        let definition = session.into_definition();
        info!(
            title = %definition.title,
            sources = definition.source_count(),
            "trace finished"
        );

        TraceOutcome {
            definition,
            error: result.err(),
        }
    }
}

/// One trace in progress.
#[derive(Debug)]
pub struct TraceSession<'r> {
    registry: &'r TypeRegistry,
    module_set: ModuleSet,
    ignored: IgnoredMethods,
    target_files: Option<HashSet<String>>,
    call_site_filter: Option<CallSiteFilter>,
    attribute_through_untracked: bool,
    skip_native: bool,
    stack: CallStack,
    definition: Definition,
    active: bool,
}

impl<'r> TraceSession<'r> {
    pub fn start(&mut self) {
        self.active = true;
    }

    /// Events delivered after this are ignored.
    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn into_definition(self) -> Definition {
        self.definition
    }

    pub fn record(&mut self, event: &TraceEvent) {
        if !self.active {
            return;
        }
        if event.is_native && self.skip_native {
            return;
        }

        match event.kind {
            EventKind::Enter => self.enter(event),
            EventKind::Exit => self.stack.pop(),
        }
    }

    fn enter(&mut self, event: &TraceEvent) {
        if self.stack.is_ignored() {
            self.stack.push(None);
            return;
        }

        let type_id = event.receiver.type_id();
        let context = event.receiver.context();
        if self.registry.get(type_id).is_none() {
            debug!(type_id, method = %event.method_name, "unknown receiver type, call untracked");
            self.stack.push(None);
            return;
        }

        if self
            .ignored
            .ignored(self.registry, type_id, context, &event.method_name)
        {
            self.stack.push_ignored();
            return;
        }

        let Some(source_name) = self.module_set.resolve(self.registry, type_id) else {
            self.stack.push(None);
            return;
        };

        self.definition.find_or_build_source(&source_name);

        // No call site inside the target files: the source exists, but no
        // edge is recorded and the frame cannot attribute later calls
        let Some(location) = self.nearest_caller_location(&event.backtrace) else {
            self.stack.push(None);
            return;
        };

        let caller = if self.attribute_through_untracked {
            self.stack.last_context()
        } else {
            self.stack.top()
        };

        if let Some(caller) = caller {
            if caller.source != source_name {
                let call_site = location.to_string();
                let call_site = match &self.call_site_filter {
                    Some(filter) => filter.apply(&call_site),
                    None => call_site,
                };

                if let Some(dependency) = self
                    .definition
                    .find_or_build_source(&caller.source)
                    .find_or_build_dependency(&source_name)
                {
                    dependency
                        .find_or_build_method_id(&event.method_name, context)
                        .add_path(call_site);
                }
            }
        }

        self.stack.push(Some(StackContext {
            source: source_name,
            method_name: event.method_name.clone(),
            caller_location: location.clone(),
        }));
    }

    fn nearest_caller_location<'e>(&self, backtrace: &'e [SourceLocation]) -> Option<&'e SourceLocation> {
        match &self.target_files {
            None => backtrace.first(),
            Some(files) => backtrace.iter().find(|location| files.contains(&location.path)),
        }
    }
}

impl EventSink for TraceSession<'_> {
    fn handle(&mut self, event: TraceEvent) {
        self.record(&event);
    }
}

/// Replay a recorded event stream.
pub fn trace_events<I>(registry: &TypeRegistry, options: TraceOptions, events: I) -> Result<Definition>
where
    I: IntoIterator<Item = TraceEvent>,
{
    let tracer = Tracer::new(registry, options)?;
    let outcome = tracer.trace(|session| {
        for event in events {
            session.handle(event);
        }
        Ok::<(), std::convert::Infallible>(())
    });
    Ok(outcome.definition)
}
