//! Python bindings for the contextcall Rust library.
//!
//! Python callbacks wrapped in a `ContextCall` run in the context that was
//! active when they were wrapped, on the thread bound with
//! `bind_logic_thread`. Creation sites are taken from the calling Python
//! frame, arguments are handed through as the original Python objects, and
//! failures are written to a Python logger.

use std::fmt;
use std::sync::Arc;

use contextcall::call::{self, CallSite, ContextCall, RunOutcome, SiteProbe};
use contextcall::callable::{CallArgs, Callable};
use contextcall::context::{ContextSnapshot, ContextTarget};
use contextcall::errors::{ContextCallError, InvocationError};
use contextcall::observability::{init_logging as init_rust_logging, LoggingConfig};
use contextcall::reporting::{CallFailureReport, ErrorReporter};
use contextcall::scheduler::{LogicThread, LogicThreadConfig};
use pyo3::exceptions::{PyRuntimeError, PyTypeError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList, PyTracebackMethods, PyTuple};
use tracing::{debug, error};

/// A Python callable invoked under the GIL.
struct PyCallable {
    callable: Py<PyAny>,
    name: String,
}

impl PyCallable {
    fn new(callable: &Bound<'_, PyAny>) -> Self {
        let name = callable
            .repr()
            .map_or_else(|_| "<python callable>".to_string(), |r| r.to_string());
        Self {
            callable: callable.clone().unbind(),
            name,
        }
    }
}

impl fmt::Debug for PyCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PyCallable").field("name", &self.name).finish()
    }
}

impl Callable for PyCallable {
    fn invoke(&self, args: Option<&CallArgs>) -> Result<(), InvocationError> {
        Python::with_gil(|py| {
            let args = match args {
                Some(args) => match args.native::<Py<PyTuple>>() {
                    Some(tuple) => tuple.clone_ref(py),
                    None => json_args(py, args).map_err(|err| invocation_error(py, &err))?,
                },
                None => PyTuple::empty_bound(py).unbind(),
            };
            self.callable
                .bind(py)
                .call1(args.into_bound(py))
                .map(|_| ())
                .map_err(|err| invocation_error(py, &err))
        })
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

fn invocation_error(py: Python<'_>, err: &PyErr) -> InvocationError {
    let error = InvocationError::new(err.to_string());
    match err.traceback_bound(py).and_then(|tb| tb.format().ok()) {
        Some(traceback) => error.with_traceback(traceback),
        None => error,
    }
}

/// Reads the creation site from the innermost Python frame.
#[derive(Debug, Clone, Copy, Default)]
struct PythonFrameProbe;

impl SiteProbe for PythonFrameProbe {
    fn probe(&self) -> Option<CallSite> {
        Python::with_gil(|py| {
            let frame = py
                .import_bound("sys")
                .ok()?
                .call_method1("_getframe", (0,))
                .ok()?;
            let file: String = frame
                .getattr("f_code")
                .ok()?
                .getattr("co_filename")
                .ok()?
                .extract()
                .ok()?;
            let line: u32 = frame.getattr("f_lineno").ok()?.extract().ok()?;
            Some(CallSite::new(file, line))
        })
    }
}

const DEFAULT_LOGGER: &str = "contextcall";

/// Writes call failures to a Python logger.
#[derive(Debug, Clone)]
struct PythonErrorReporter {
    logger: String,
}

impl PythonErrorReporter {
    fn new(logger: impl Into<String>) -> Self {
        Self {
            logger: logger.into(),
        }
    }

    fn log(&self, py: Python<'_>, message: &str) -> PyResult<()> {
        py.import_bound("logging")?
            .call_method1("getLogger", (self.logger.as_str(),))?
            .call_method1("error", (message,))?;
        Ok(())
    }
}

impl ErrorReporter for PythonErrorReporter {
    fn report(&self, failure: &CallFailureReport) {
        let rendered = failure.render();
        let logged = Python::with_gil(|py| self.log(py, &rendered));
        if let Err(err) = logged {
            error!(
                call_id = %failure.call_id,
                logger = %self.logger,
                error = %err,
                "Could not log call failure through Python:\n{rendered}"
            );
        }
    }
}

fn to_py_err(err: ContextCallError) -> PyErr {
    PyRuntimeError::new_err(err.to_string())
}

/// A context target created from Python.
#[derive(Debug)]
struct PyContextTarget {
    name: String,
}

impl ContextTarget for PyContextTarget {
    fn describe(&self) -> String {
        format!("context {}", self.name)
    }
}

/// Python wrapper for a context target. Use as a `with` block to make it
/// the active context.
#[pyclass(name = "Context", unsendable)]
pub struct PyContext {
    target: Arc<PyContextTarget>,
    saved: Vec<ContextSnapshot>,
}

#[pymethods]
impl PyContext {
    #[new]
    fn new(name: String) -> Self {
        Self {
            target: Arc::new(PyContextTarget { name }),
            saved: Vec::new(),
        }
    }

    /// Returns the context name.
    #[getter]
    fn name(&self) -> &str {
        &self.target.name
    }

    fn __enter__(mut slf: PyRefMut<'_, Self>) -> PyRefMut<'_, Self> {
        let previous = ContextSnapshot::of(&slf.target).install();
        slf.saved.push(previous);
        slf
    }

    fn __exit__(
        &mut self,
        _exc_type: &Bound<'_, PyAny>,
        _exc_value: &Bound<'_, PyAny>,
        _traceback: &Bound<'_, PyAny>,
    ) -> bool {
        if let Some(previous) = self.saved.pop() {
            drop(previous.install());
        }
        false
    }

    fn __repr__(&self) -> String {
        format!("Context('{}')", self.target.name)
    }
}

/// Python wrapper for ContextCall.
#[pyclass(name = "ContextCall")]
#[derive(Clone)]
pub struct PyContextCall {
    inner: Arc<ContextCall>,
}

#[pymethods]
impl PyContextCall {
    #[new]
    fn new(callable: &Bound<'_, PyAny>) -> PyResult<Self> {
        if !callable.is_callable() {
            return Err(PyTypeError::new_err("ContextCall requires a callable"));
        }
        let site = PythonFrameProbe.probe();
        let callable: Arc<dyn Callable> = Arc::new(PyCallable::new(callable));
        Ok(Self {
            inner: ContextCall::with_site(callable, site),
        })
    }

    /// Runs the call now. Returns the outcome name.
    #[pyo3(signature = (*args))]
    fn run(&self, args: &Bound<'_, PyTuple>) -> PyResult<&'static str> {
        let outcome = match tuple_to_args(args) {
            Some(args) => self.inner.run_with(&args),
            None => self.inner.run(),
        }
        .map_err(to_py_err)?;
        Ok(outcome_name(outcome))
    }

    /// Runs the call on an upcoming logic cycle, keeping it alive until then.
    #[pyo3(signature = (*args))]
    fn schedule(&self, args: &Bound<'_, PyTuple>) -> PyResult<()> {
        match tuple_to_args(args) {
            Some(args) => self.inner.schedule_with(args),
            None => self.inner.schedule(),
        }
        .map_err(to_py_err)
    }

    /// Runs the call on an upcoming logic cycle if it still exists then.
    #[pyo3(signature = (*args))]
    fn schedule_weak(&self, args: &Bound<'_, PyTuple>) -> PyResult<()> {
        match tuple_to_args(args) {
            Some(args) => self.inner.schedule_weak_with(args),
            None => self.inner.schedule_weak(),
        }
        .map_err(to_py_err)
    }

    /// Disables the call permanently.
    fn mark_dead(&self) {
        self.inner.mark_dead();
    }

    /// Returns true if the call has a callable.
    fn exists(&self) -> bool {
        self.inner.exists()
    }

    /// Returns true once marked dead.
    #[getter]
    fn dead(&self) -> bool {
        self.inner.is_dead()
    }

    /// Returns the creation site as `file:line`.
    #[getter]
    fn call_site(&self) -> Option<String> {
        self.inner.call_site().map(ToString::to_string)
    }

    /// Returns the call id.
    #[getter]
    fn id(&self) -> String {
        self.inner.id().to_string()
    }

    /// Describes the call with its captured and active contexts.
    fn context_report(&self) -> String {
        self.inner.context_report()
    }

    fn __repr__(&self) -> String {
        self.inner.description()
    }
}

fn outcome_name(outcome: RunOutcome) -> &'static str {
    match outcome {
        RunOutcome::Completed => "completed",
        RunOutcome::Failed => "failed",
        RunOutcome::Dead => "dead",
        RunOutcome::Missing => "missing",
    }
}

fn tuple_to_args(args: &Bound<'_, PyTuple>) -> Option<CallArgs> {
    (!args.is_empty()).then(|| CallArgs::new().with_native(args.clone().unbind()))
}

/// Binds the calling thread as the logic thread.
#[pyfunction]
#[pyo3(signature = (name = None, config_path = None, logger = None))]
fn bind_logic_thread(
    name: Option<String>,
    config_path: Option<String>,
    logger: Option<String>,
) -> PyResult<()> {
    let mut config = match config_path {
        Some(path) => LogicThreadConfig::from_json_file(path).map_err(to_py_err)?,
        None => LogicThreadConfig::new(),
    };
    if let Some(name) = name {
        config = config.with_name(name);
    }
    let logic = LogicThread::builder()
        .config(config)
        .reporter(Arc::new(PythonErrorReporter::new(
            logger.unwrap_or_else(|| DEFAULT_LOGGER.to_string()),
        )))
        .bind()
        .map_err(to_py_err)?;
    call::install_site_probe(Arc::new(PythonFrameProbe));
    debug!(logic_thread = %logic.name(), "Bound logic thread from Python");
    Ok(())
}

/// Releases the logic-thread binding of the calling thread.
#[pyfunction]
fn unbind_logic_thread() -> bool {
    call::clear_site_probe();
    LogicThread::unbind_current().is_some()
}

/// Runs one logic cycle. Returns how many calls ran.
#[pyfunction]
fn run_pending_calls() -> PyResult<usize> {
    LogicThread::require_current("run_pending_calls")
        .and_then(|logic| logic.run_pending_calls())
        .map_err(to_py_err)
}

/// Returns the call currently running on this thread.
#[pyfunction]
fn current_call() -> Option<PyContextCall> {
    call::current_call().map(|inner| PyContextCall { inner })
}

/// Describes the active context.
#[pyfunction]
fn current_context() -> String {
    ContextSnapshot::current().description()
}

/// Installs the tracing subscriber.
#[pyfunction]
#[pyo3(signature = (filter = None, json = false))]
fn init_logging(filter: Option<String>, json: bool) -> PyResult<()> {
    let mut config = LoggingConfig::new().with_json(json);
    if let Some(filter) = filter {
        config = config.with_filter(filter);
    }
    init_rust_logging(&config).map_err(to_py_err)
}

// Helper functions

fn json_args(py: Python<'_>, args: &CallArgs) -> PyResult<Py<PyTuple>> {
    let items = args
        .iter()
        .map(|value| json_to_py(py, value))
        .collect::<PyResult<Vec<_>>>()?;
    Ok(PyTuple::new_bound(py, items).unbind())
}

fn json_to_py(py: Python<'_>, value: &serde_json::Value) -> PyResult<PyObject> {
    Ok(match value {
        serde_json::Value::Null => py.None(),
        serde_json::Value::Bool(b) => b.into_py(py),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.into_py(py)
            } else if let Some(f) = n.as_f64() {
                f.into_py(py)
            } else {
                py.None()
            }
        }
        serde_json::Value::String(s) => s.into_py(py),
        serde_json::Value::Array(arr) => {
            let items = arr
                .iter()
                .map(|v| json_to_py(py, v))
                .collect::<PyResult<Vec<_>>>()?;
            PyList::new_bound(py, items).into_py(py)
        }
        serde_json::Value::Object(map) => {
            let dict = PyDict::new_bound(py);
            for (k, v) in map {
                dict.set_item(k, json_to_py(py, v)?)?;
            }
            dict.into_py(py)
        }
    })
}

/// The contextcall Python module.
#[pymodule]
fn contextcall_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyContext>()?;
    m.add_class::<PyContextCall>()?;
    m.add_function(wrap_pyfunction!(bind_logic_thread, m)?)?;
    m.add_function(wrap_pyfunction!(unbind_logic_thread, m)?)?;
    m.add_function(wrap_pyfunction!(run_pending_calls, m)?)?;
    m.add_function(wrap_pyfunction!(current_call, m)?)?;
    m.add_function(wrap_pyfunction!(current_context, m)?)?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;

    // Add version info
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
