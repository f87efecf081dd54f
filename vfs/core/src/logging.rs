//! An interceptor that logs every operation passing through the facade.

use crate::error::VfsResult;
use crate::fs::{Chain, ErasedOutput, FileSystemInterceptor};
use crate::ops::FileSystemOperation;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LogLevel {
    None,
    /// Operation name only.
    Name,
    #[default]
    Basic,
    /// Also error messages.
    Verbose,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartEvent {
    pub inputs: LogLevel,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EndEvent {
    pub inputs: LogLevel,
    pub outputs: LogLevel,
    pub track_duration: bool,
}

impl Default for EndEvent {
    fn default() -> Self {
        Self {
            inputs: LogLevel::Basic,
            outputs: LogLevel::Basic,
            track_duration: false,
        }
    }
}

/// Which messages are written for an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoggingEvents {
    pub start: StartEvent,
    pub end: EndEvent,
}

impl Default for LoggingEvents {
    fn default() -> Self {
        Self {
            start: StartEvent {
                inputs: LogLevel::None,
            },
            end: EndEvent::default(),
        }
    }
}

type Sink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Clone)]
pub struct LoggingInterceptor {
    sink: Sink,
    events: LoggingEvents,
    per_operation: HashMap<&'static str, LoggingEvents>,
}

impl LoggingInterceptor {
    /// Logs through `tracing` at debug level.
    pub fn new() -> Self {
        Self::with_sink(|message| tracing::debug!(target: "vfs_core::ops", "{message}"))
    }

    pub fn with_sink(sink: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            events: LoggingEvents::default(),
            per_operation: HashMap::new(),
        }
    }

    pub fn events(mut self, events: LoggingEvents) -> Self {
        self.events = events;
        self
    }

    /// Overrides the events for one operation.
    pub fn operation<Op: FileSystemOperation>(mut self, events: LoggingEvents) -> Self {
        self.per_operation.insert(Op::NAME, events);
        self
    }

    fn events_for(&self, operation: &str) -> LoggingEvents {
        self.per_operation
            .get(operation)
            .copied()
            .unwrap_or(self.events)
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LoggingInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingInterceptor")
            .field("events", &self.events)
            .field("per_operation", &self.per_operation)
            .finish_non_exhaustive()
    }
}

impl FileSystemInterceptor for LoggingInterceptor {
    fn intercept(&self, chain: Chain<'_>) -> VfsResult<ErasedOutput> {
        let operation = chain.operation_name();
        let events = self.events_for(operation);

        if events.start.inputs != LogLevel::None {
            let mut message = format!("^{operation}");
            if events.start.inputs >= LogLevel::Basic {
                let _ = write!(message, "({:?})", chain.input());
            }
            (self.sink)(&message);
        }

        let end = events.end;
        if end.inputs == LogLevel::None && end.outputs == LogLevel::None {
            return chain.proceed();
        }
        let input = (end.inputs >= LogLevel::Basic).then(|| format!("{:?}", chain.input()));
        let started = end.track_duration.then(Instant::now);
        let output = chain.proceed();
        let duration = started.map(|started| started.elapsed());

        (self.sink)(&end_message(&end, operation, input, &output, duration));
        output
    }
}

fn end_message(
    level: &EndEvent,
    operation: &str,
    input: Option<String>,
    output: &VfsResult<ErasedOutput>,
    duration: Option<Duration>,
) -> String {
    let mut message = format!("{operation}(): ");
    match output {
        Ok(_) => message.push_str("OK"),
        Err(err) => {
            let _ = write!(message, "{}", err.errno());
            if level.outputs >= LogLevel::Verbose {
                let _ = write!(message, "({})", err.message());
            }
        }
    }
    message.push('.');
    if let Some(input) = input {
        let _ = write!(message, " Inputs: {input}.");
    }
    if let (Ok(value), true) = (output, level.outputs >= LogLevel::Basic) {
        let _ = write!(message, " Outputs: {value:?}");
    }
    if let Some(duration) = duration {
        let _ = write!(message, " Duration: {duration:?}");
    }
    message
}
