use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rquickjs::{Context, Ctx, Runtime, Value};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::types::SandboxConfig;
use crate::error::{Result, ScriptletError};
use crate::sandbox::classify::{classify, ExceptionKind, ScriptException};
use crate::sandbox::console::ConsoleBuffer;
use crate::sandbox::governor::TimeoutGovernor;
use crate::sandbox::marshal;
use crate::sandbox::primitives::{self, ActiveEvalGuard, SessionState};
use crate::sandbox::{HttpCallback, HttpRequest};
use crate::sandbox::value::HostValue;

/// Resource limits fixed when a session is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    /// Script heap budget on top of the interpreter's bootstrap usage
    pub memory_limit_bytes: usize,
    /// Wall-clock budget per eval; 0 or negative disables it
    pub timeout_ms: i64,
    /// Cap on captured console output per eval
    pub console_max_size_bytes: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&SandboxConfig::default())
    }
}

impl From<&SandboxConfig> for SessionLimits {
    fn from(config: &SandboxConfig) -> Self {
        Self {
            memory_limit_bytes: config.memory_limit_bytes,
            timeout_ms: config.timeout_ms,
            console_max_size_bytes: config.console_max_size_bytes,
        }
    }
}

/// Value and captured output of an eval that ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalResult {
    pub value: HostValue,
    pub console_output: String,
    pub console_truncated: bool,
    /// Reserved; always empty
    pub http_requests: Vec<HttpRequest>,
}

/// Exactly one of these is produced per [`Session::eval`] call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvalOutcome {
    Completed(EvalResult),
    /// The wall-clock budget ran out. Wins over any exception raised by the
    /// aborted execution.
    TimedOut { timeout_ms: i64 },
    Excepted(ScriptException),
}

impl EvalOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn into_result(self) -> Result<EvalResult> {
        match self {
            Self::Completed(result) => Ok(result),
            Self::TimedOut { timeout_ms } => Err(ScriptletError::Timeout { timeout_ms }),
            Self::Excepted(exception) => Err(match exception.kind {
                ExceptionKind::Syntax => ScriptletError::Syntax {
                    message: exception.message,
                },
                ExceptionKind::Script => ScriptletError::Script {
                    message: exception.message,
                    stack: exception.stack,
                },
            }),
        }
    }
}

/// One sandbox: an interpreter with its own memory budget, console buffer,
/// timeout budget and optional `fetch()` backend.
///
/// Evaluation state persists across [`eval`](Self::eval) calls; console
/// output and the timeout budget are reset at the start of each one.
pub struct Session {
    // Field order is drop order: interpreter, then its memory, then the console.
    context: Context,
    runtime: Runtime,
    state: Rc<SessionState>,
    governor: Arc<TimeoutGovernor>,
    limits: SessionLimits,
    memory_limit: usize,
    id: u64,
}

impl Session {
    /// Create a session. Any failure to set up the interpreter or the console
    /// buffer is reported as [`ScriptletError::OutOfMemory`]; nothing is
    /// leaked on that path.
    pub fn create(limits: SessionLimits) -> Result<Self> {
        let out_of_memory = || ScriptletError::OutOfMemory {
            requested: limits.memory_limit_bytes,
        };

        let runtime = Runtime::new().map_err(|_| out_of_memory())?;
        let context = Context::full(&runtime).map_err(|_| out_of_memory())?;
        context
            .with(|ctx| primitives::install(&ctx))
            .map_err(|_| out_of_memory())?;

        // The budget is fixed once, on top of whatever bootstrap needed.
        runtime.run_gc();
        let baseline = usize::try_from(runtime.memory_usage().malloc_size).unwrap_or(0);
        let memory_limit = baseline.saturating_add(limits.memory_limit_bytes);
        runtime.set_memory_limit(memory_limit);

        let console =
            ConsoleBuffer::new(limits.console_max_size_bytes).ok_or_else(out_of_memory)?;

        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

        info!(
            session = id,
            memory_limit_bytes = limits.memory_limit_bytes,
            baseline_bytes = baseline,
            timeout_ms = limits.timeout_ms,
            console_max_size_bytes = limits.console_max_size_bytes,
            "Sandbox session created"
        );

        Ok(Self {
            context,
            runtime,
            state: Rc::new(SessionState::new(console)),
            governor: Arc::new(TimeoutGovernor::new(limits.timeout_ms)),
            limits,
            memory_limit,
            id,
        })
    }

    /// Release the interpreter, its memory and the console buffer.
    pub fn destroy(self) {
        info!(session = self.id, "Sandbox session destroyed");
        drop(self);
    }

    /// Install or remove the `fetch()` backend. Takes effect from the next eval.
    pub fn set_http_callback(&mut self, callback: Option<Box<dyn HttpCallback>>) {
        match &callback {
            Some(callback) => debug!(
                session = self.id,
                callback = callback.name(),
                "HTTP callback installed"
            ),
            None => debug!(session = self.id, "HTTP callback removed"),
        }
        *self.state.http_callback.borrow_mut() = callback.map(Rc::from);
    }

    pub fn has_http_callback(&self) -> bool {
        self.state.http_callback.borrow().is_some()
    }

    /// Define a global variable from a host value.
    ///
    /// Nothing is defined if the conversion fails part way.
    pub fn set_variable(&mut self, name: &str, value: &HostValue) -> Result<()> {
        if name.is_empty() {
            return Err(ScriptletError::InvalidVariableName);
        }

        self.context.with(|ctx| {
            let converted =
                marshal::to_script(&ctx, value).map_err(|err| marshal_error(&ctx, err))?;
            ctx.globals()
                .set(name, converted)
                .map_err(|err| marshal_error(&ctx, err))
        })?;

        debug!(session = self.id, name = %name, "Variable set");
        Ok(())
    }

    /// Evaluate `code` and report how it ended.
    pub fn eval(&mut self, code: &str) -> EvalOutcome {
        self.state.console.borrow_mut().reset();
        self.governor.arm();

        let governor = Arc::clone(&self.governor);
        self.runtime
            .set_interrupt_handler(Some(Box::new(move || governor.should_interrupt())));

        debug!(session = self.id, bytes = code.len(), "Evaluating script");

        let outcome = self.context.with(|ctx| {
            let active = ActiveEvalGuard::bind(&ctx, Rc::clone(&self.state));
            let evaluated = ctx.eval::<Value, _>(code);
            drop(active);

            let converted = evaluated.and_then(|value| marshal::from_script(&ctx, value));

            if self.governor.timed_out() {
                // Discard whatever the aborted execution left behind.
                let _ = ctx.catch();
                return EvalOutcome::TimedOut {
                    timeout_ms: self.limits.timeout_ms,
                };
            }

            match converted {
                Ok(value) => {
                    let console = self.state.console.borrow();
                    EvalOutcome::Completed(EvalResult {
                        value,
                        console_output: console.to_text(),
                        console_truncated: console.truncated(),
                        http_requests: Vec::new(),
                    })
                }
                Err(err) => EvalOutcome::Excepted(exception_from_error(&ctx, err)),
            }
        });

        self.runtime.set_interrupt_handler(None);

        match &outcome {
            EvalOutcome::Completed(_) => debug!(
                session = self.id,
                elapsed_ms = self.governor.elapsed().as_millis() as u64,
                "Script completed"
            ),
            EvalOutcome::TimedOut { timeout_ms } => warn!(
                session = self.id,
                timeout_ms = timeout_ms,
                "Script exceeded its time budget"
            ),
            EvalOutcome::Excepted(exception) => debug!(
                session = self.id,
                kind = ?exception.kind,
                message = %exception.message,
                "Script raised an exception"
            ),
        }

        outcome
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    /// Total interpreter memory limit in bytes, bootstrap usage included.
    pub fn memory_limit(&self) -> usize {
        self.memory_limit
    }

    /// Bytes the interpreter currently has allocated.
    pub fn memory_usage(&self) -> usize {
        usize::try_from(self.runtime.memory_usage().malloc_size).unwrap_or(0)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

fn exception_from_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> ScriptException {
    match err {
        rquickjs::Error::Exception => classify(ctx, ctx.catch()),
        // The engine cannot take source text with an embedded NUL.
        rquickjs::Error::InvalidString(_) => ScriptException {
            kind: ExceptionKind::Syntax,
            message: "SyntaxError: source text contains a NUL byte".to_string(),
            stack: None,
        },
        other => ScriptException {
            kind: ExceptionKind::Script,
            message: other.to_string(),
            stack: None,
        },
    }
}

fn marshal_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> ScriptletError {
    ScriptletError::Marshal(exception_from_error(ctx, err).message)
}
