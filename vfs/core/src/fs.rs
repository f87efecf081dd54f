//! The filesystem facade and its interceptor chain.
//!
//! [`FileSystem::execute`] is the single entry point. The request is passed
//! through the configured interceptors in order; the last link hands it to
//! the backend's [`OperationHandler`]. Interceptors see requests and results
//! type-erased, so one interceptor serves every operation.

use crate::error::{ErrorKind, ErrorKindSet, FsError, VfsResult};
use crate::ops::FileSystemOperation;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Backend implementation of one operation.
pub trait OperationHandler<Op: FileSystemOperation> {
    fn handle(&self, input: Op) -> VfsResult<Op::Output>;
}

/// A request or result as seen by an interceptor.
pub trait ErasedValue: Any + fmt::Debug + Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl<T: Any + fmt::Debug + Send> ErasedValue for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Output of a chain link.
pub struct ErasedOutput(Box<dyn ErasedValue>);

impl ErasedOutput {
    pub fn new<T: ErasedValue>(value: T) -> Self {
        Self(Box::new(value))
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        (*self.0).as_any().downcast_ref()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        (*self.0).as_any_mut().downcast_mut()
    }

    fn downcast<T: 'static>(self, operation: &'static str) -> VfsResult<T> {
        match self.0.into_any().downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => {
                tracing::warn!(operation, "interceptor returned an output of the wrong type");
                Err(FsError::io(format!("Unexpected output type for `{operation}`")))
            }
        }
    }
}

impl fmt::Debug for ErasedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

type Terminal<'a> = dyn Fn(Box<dyn ErasedValue>) -> VfsResult<ErasedOutput> + 'a;

/// One step of an [`FileSystem::execute`] call.
pub trait FileSystemInterceptor: Send + Sync {
    /// Handles the request, usually by calling [`Chain::proceed`].
    ///
    /// Returning an error short-circuits the remaining links. Errors from
    /// `proceed` should be returned unchanged.
    fn intercept(&self, chain: Chain<'_>) -> VfsResult<ErasedOutput>;
}

/// The remaining links of an interceptor chain, with the current request.
pub struct Chain<'a> {
    operation: &'static str,
    errors: ErrorKindSet,
    input: Box<dyn ErasedValue>,
    interceptors: &'a [Arc<dyn FileSystemInterceptor>],
    terminal: &'a Terminal<'a>,
}

impl Chain<'_> {
    pub fn operation_name(&self) -> &'static str {
        self.operation
    }

    /// Error kinds the current operation may report.
    pub fn allowed_errors(&self) -> ErrorKindSet {
        self.errors
    }

    pub fn input(&self) -> &dyn fmt::Debug {
        &*self.input
    }

    pub fn input_as<T: 'static>(&self) -> Option<&T> {
        (*self.input).as_any().downcast_ref()
    }

    /// Gives access to the request for rewriting before `proceed`.
    pub fn input_as_mut<T: 'static>(&mut self) -> Option<&mut T> {
        (*self.input).as_any_mut().downcast_mut()
    }

    /// Runs the next interceptor, or the backend after the last one.
    pub fn proceed(self) -> VfsResult<ErasedOutput> {
        match self.interceptors.split_first() {
            Some((next, rest)) => next.intercept(Chain {
                interceptors: rest,
                ..self
            }),
            None => (self.terminal)(self.input),
        }
    }
}

impl fmt::Debug for Chain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("operation", &self.operation)
            .field("input", &self.input)
            .field("remaining", &self.interceptors.len())
            .finish()
    }
}

/// Entry point of the engine: dispatches operations to a backend.
pub struct FileSystem<B> {
    backend: B,
    interceptors: Vec<Arc<dyn FileSystemInterceptor>>,
}

impl<B> FileSystem<B> {
    pub fn new(backend: B) -> Self {
        Self::with_interceptors(backend, Vec::new())
    }

    pub fn with_interceptors(
        backend: B,
        interceptors: Vec<Arc<dyn FileSystemInterceptor>>,
    ) -> Self {
        Self {
            backend,
            interceptors,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn interceptors(&self) -> &[Arc<dyn FileSystemInterceptor>] {
        &self.interceptors
    }

    pub fn execute<Op>(&self, input: Op) -> VfsResult<Op::Output>
    where
        Op: FileSystemOperation,
        B: OperationHandler<Op>,
    {
        let result = if self.interceptors.is_empty() {
            self.backend.handle(input)
        } else {
            let terminal = |input: Box<dyn ErasedValue>| -> VfsResult<ErasedOutput> {
                let input = match input.into_any().downcast::<Op>() {
                    Ok(input) => *input,
                    Err(_) => {
                        return Err(FsError::io(format!(
                            "Unexpected input type for `{}`",
                            Op::NAME
                        )));
                    }
                };
                self.backend.handle(input).map(ErasedOutput::new)
            };
            let chain = Chain {
                operation: Op::NAME,
                errors: Op::ERRORS,
                input: Box::new(input),
                interceptors: &self.interceptors,
                terminal: &terminal,
            };
            chain
                .proceed()
                .and_then(|output| output.downcast::<Op::Output>(Op::NAME))
        };
        result.map_err(restrict_error::<Op>)
    }
}

/// Downgrades an error kind the operation does not declare to `IoError`.
fn restrict_error<Op: FileSystemOperation>(err: FsError) -> FsError {
    if Op::ERRORS.contains(err.kind()) {
        return err;
    }
    tracing::warn!(
        operation = Op::NAME,
        kind = %err.kind(),
        message = err.message(),
        "operation reported an undeclared error kind"
    );
    err.with_kind(ErrorKind::IoError)
}

impl<B: fmt::Debug> fmt::Debug for FileSystem<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("backend", &self.backend)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}
