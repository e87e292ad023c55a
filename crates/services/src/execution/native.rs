//! In-process interpreter backend built on Rhai.
//!
//! The engine starts from `Engine::new_raw()` and only gets the pure value
//! packages (numbers, strings, arrays, maps, iterators) plus `print`, which is
//! wired to the capture buffer. The language-core package is left out, so
//! there is no `sleep`, `exit` or JSON parsing, and `eval` is disabled. There is
//! no file, network or process binding.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use drill_core::model::{BackendKind, ExecutionFailure, ExecutionRequest, ExecutionResult};
use rhai::packages::{
    ArithmeticPackage, BasicArrayPackage, BasicBlobPackage, BasicFnPackage, BasicIteratorPackage,
    BasicMapPackage, BasicMathPackage, BasicStringPackage, BitFieldPackage, LogicPackage,
    MoreStringPackage, Package,
};
use rhai::{Dynamic, Engine, EvalAltResult};

use super::{ExecutionBackend, SandboxConfig};

const MAX_CALL_LEVELS: usize = 64;
const MAX_EXPR_DEPTH: usize = 64;
const MAX_FN_EXPR_DEPTH: usize = 32;
const MAX_STRING_SIZE: usize = 1 << 20;
const MAX_COLLECTION_SIZE: usize = 100_000;
const CLOCK_CHECK_EVERY: u64 = 256;

/// Runs Rhai snippets on a blocking worker under a wall-clock deadline.
#[derive(Clone, Debug, Default)]
pub struct NativeInterpreter {
    config: SandboxConfig,
}

impl NativeInterpreter {
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ExecutionBackend for NativeInterpreter {
    fn kind(&self) -> BackendKind {
        BackendKind::NativeInterpreter
    }

    async fn run(&self, request: &ExecutionRequest) -> ExecutionResult {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let sink = CaptureSink::new(self.config.max_output_lines, self.config.max_output_bytes);
        let stop = StopFlag::default();
        // Dropping this future (caller abandoned the run) stops the worker too.
        let _stop_on_drop = stop.guard();

        let worker = {
            let source = request.source.clone();
            let config = self.config.clone();
            let sink = sink.clone();
            let stop = stop.clone();
            tokio::task::spawn_blocking(move || evaluate(&source, &config, &sink, &stop, deadline))
        };

        let outcome = tokio::time::timeout(self.config.timeout, worker).await;
        let elapsed = started.elapsed();
        let kind = self.kind();

        match outcome {
            Err(_) => {
                stop.raise();
                tracing::debug!(?elapsed, "native run hit the wall-clock ceiling");
                ExecutionResult::failed(kind, sink.close(), ExecutionFailure::TimedOut, elapsed)
            }
            Ok(Err(join_err)) => {
                tracing::warn!(error = %join_err, "native worker did not finish");
                ExecutionResult::failed(
                    kind,
                    sink.close(),
                    ExecutionFailure::Internal(join_err.to_string()),
                    elapsed,
                )
            }
            Ok(Ok(Ok(()))) => ExecutionResult::completed(kind, sink.close(), elapsed),
            Ok(Ok(Err(failure))) => ExecutionResult::failed(kind, sink.close(), failure, elapsed),
        }
    }
}

fn evaluate(
    source: &str,
    config: &SandboxConfig,
    sink: &CaptureSink,
    stop: &StopFlag,
    deadline: Instant,
) -> Result<(), ExecutionFailure> {
    let engine = build_engine(config, sink, stop, deadline);
    engine.run(source).map_err(|err| classify(*err, stop))
}

fn build_engine(
    config: &SandboxConfig,
    sink: &CaptureSink,
    stop: &StopFlag,
    deadline: Instant,
) -> Engine {
    let mut engine = Engine::new_raw();
    for package in [
        ArithmeticPackage::new().as_shared_module(),
        BasicStringPackage::new().as_shared_module(),
        BasicIteratorPackage::new().as_shared_module(),
        BasicFnPackage::new().as_shared_module(),
        BitFieldPackage::new().as_shared_module(),
        LogicPackage::new().as_shared_module(),
        BasicMathPackage::new().as_shared_module(),
        BasicArrayPackage::new().as_shared_module(),
        BasicBlobPackage::new().as_shared_module(),
        BasicMapPackage::new().as_shared_module(),
        MoreStringPackage::new().as_shared_module(),
    ] {
        engine.register_global_module(package);
    }
    engine.disable_symbol("eval");

    engine.set_max_operations(config.max_operations);
    engine.set_max_call_levels(MAX_CALL_LEVELS);
    engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FN_EXPR_DEPTH);
    engine.set_max_string_size(MAX_STRING_SIZE);
    engine.set_max_array_size(MAX_COLLECTION_SIZE);
    engine.set_max_map_size(MAX_COLLECTION_SIZE);

    let print_sink = sink.clone();
    engine.on_print(move |text| print_sink.push(text));

    let progress_stop = stop.clone();
    engine.on_progress(move |ops| {
        if progress_stop.is_raised() || (ops % CLOCK_CHECK_EVERY == 0 && Instant::now() >= deadline) {
            Some(Dynamic::UNIT)
        } else {
            None
        }
    });

    engine
}

fn classify(err: EvalAltResult, stop: &StopFlag) -> ExecutionFailure {
    match err {
        EvalAltResult::ErrorTerminated(..) if stop.is_raised() => {
            ExecutionFailure::Internal("execution cancelled".to_string())
        }
        EvalAltResult::ErrorTerminated(..) => ExecutionFailure::TimedOut,
        EvalAltResult::ErrorRuntime(value, _) => ExecutionFailure::Runtime(value.to_string()),
        other => ExecutionFailure::Runtime(other.to_string()),
    }
}

//
// ─── CAPTURE ───────────────────────────────────────────────────────────────────
//

struct CaptureBuffer {
    lines: Vec<String>,
    bytes: usize,
    max_lines: usize,
    max_bytes: usize,
    closed: bool,
}

/// Collects `print` output; once closed or over budget, later output is
/// dropped.
#[derive(Clone)]
struct CaptureSink {
    inner: Arc<Mutex<CaptureBuffer>>,
}

impl CaptureSink {
    fn new(max_lines: usize, max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CaptureBuffer {
                lines: Vec::new(),
                bytes: 0,
                max_lines,
                max_bytes,
                closed: false,
            })),
        }
    }

    fn push(&self, text: &str) {
        let mut buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if buffer.closed || buffer.lines.len() >= buffer.max_lines {
            return;
        }
        let bytes = buffer.bytes.saturating_add(text.len());
        if bytes > buffer.max_bytes {
            // A line that does not fit ends capture; later short lines would
            // otherwise appear out of context.
            buffer.closed = true;
            return;
        }
        buffer.bytes = bytes;
        buffer.lines.push(text.to_owned());
    }

    /// Stop collecting and return everything captured so far, newline-joined.
    fn close(&self) -> String {
        let mut buffer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.closed = true;
        buffer.lines.join("\n")
    }
}

//
// ─── CANCELLATION ──────────────────────────────────────────────────────────────
//

#[derive(Clone, Default)]
struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn guard(&self) -> StopOnDrop {
        StopOnDrop(self.clone())
    }
}

struct StopOnDrop(StopFlag);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        self.0.raise();
    }
}
