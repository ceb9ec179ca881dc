//! Python bindings for the blockdom flattener.

use blockdom_core::{
    error::{ErrorKind as CoreErrorKind, FlattenError as CoreFlattenError},
    BlockRecord, EventAdapter as CoreEventAdapter, FlattenOptions, ParseCache,
};
use pyo3::create_exception;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

create_exception!(pybd, FlattenError, PyValueError, "Malformed block markup.");

// ============================================================================
// Errors
// ============================================================================

/// Category of a flattening failure.
#[pyclass(frozen, eq, eq_int, name = "ErrorKind")]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PyErrorKind {
    Markup,
    MissingMarkup,
    MissingAttribute,
    MissingFieldText,
    MissingChildBlock,
    DepthLimit,
}

impl From<CoreErrorKind> for PyErrorKind {
    fn from(k: CoreErrorKind) -> Self {
        match k {
            CoreErrorKind::Markup => PyErrorKind::Markup,
            CoreErrorKind::MissingMarkup => PyErrorKind::MissingMarkup,
            CoreErrorKind::MissingAttribute => PyErrorKind::MissingAttribute,
            CoreErrorKind::MissingFieldText => PyErrorKind::MissingFieldText,
            CoreErrorKind::MissingChildBlock => PyErrorKind::MissingChildBlock,
            CoreErrorKind::DepthLimit => PyErrorKind::DepthLimit,
        }
    }
}

/// Raise `FlattenError(message, kind, span)`; span is `(start, end)` or None.
fn to_py_err(e: CoreFlattenError) -> PyErr {
    let kind = PyErrorKind::from(e.kind());
    let span = e.span().map(|s| (s.start, s.end));
    FlattenError::new_err((e.to_string(), kind, span))
}

// ============================================================================
// Records
// ============================================================================

/// An input slot and the id of the block filling it.
#[pyclass(frozen, get_all, name = "Input")]
#[derive(Clone)]
pub struct PyInput {
    pub name: String,
    pub block: String,
}

#[pymethods]
impl PyInput {
    fn __repr__(&self) -> String {
        format!("Input({:?}, block={:?})", self.name, self.block)
    }
}

/// A named field value.
#[pyclass(frozen, get_all, name = "Field")]
#[derive(Clone)]
pub struct PyField {
    pub name: String,
    pub value: String,
}

#[pymethods]
impl PyField {
    fn __repr__(&self) -> String {
        format!("Field({:?}, value={:?})", self.name, self.value)
    }
}

/// A flattened block record.
#[pyclass(frozen, name = "Block")]
pub struct PyBlock {
    #[pyo3(get)]
    pub id: String,
    #[pyo3(get)]
    pub opcode: String,
    /// dict[str, Input]
    #[pyo3(get)]
    pub inputs: PyObject,
    /// dict[str, Field]
    #[pyo3(get)]
    pub fields: PyObject,
    #[pyo3(get)]
    pub next: Option<String>,
    #[pyo3(get)]
    pub top_level: bool,
}

#[pymethods]
impl PyBlock {
    fn __repr__(&self) -> String {
        format!(
            "Block({:?}, opcode={:?}, next={:?}, top_level={})",
            self.id,
            self.opcode,
            self.next,
            if self.top_level { "True" } else { "False" }
        )
    }

    /// Plain-dict form, keyed like the block runtime expects.
    fn to_dict<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyDict>> {
        let dict = PyDict::new(py);
        dict.set_item("id", &self.id)?;
        dict.set_item("opcode", &self.opcode)?;

        let inputs = PyDict::new(py);
        for (name, input) in self.inputs.downcast_bound::<PyDict>(py)?.iter() {
            let input: PyRef<'_, PyInput> = input.extract()?;
            let entry = PyDict::new(py);
            entry.set_item("name", &input.name)?;
            entry.set_item("block", &input.block)?;
            inputs.set_item(name, entry)?;
        }
        dict.set_item("inputs", inputs)?;

        let fields = PyDict::new(py);
        for (name, field) in self.fields.downcast_bound::<PyDict>(py)?.iter() {
            let field: PyRef<'_, PyField> = field.extract()?;
            let entry = PyDict::new(py);
            entry.set_item("name", &field.name)?;
            entry.set_item("value", &field.value)?;
            fields.set_item(name, entry)?;
        }
        dict.set_item("fields", fields)?;

        dict.set_item("next", &self.next)?;
        dict.set_item("topLevel", self.top_level)?;
        Ok(dict)
    }
}

fn convert_block(py: Python<'_>, block: BlockRecord) -> PyResult<PyBlock> {
    let inputs = PyDict::new(py);
    for (name, input) in block.inputs {
        let input = Py::new(
            py,
            PyInput {
                name: input.name,
                block: input.block,
            },
        )?;
        inputs.set_item(name, input)?;
    }

    let fields = PyDict::new(py);
    for (name, field) in block.fields {
        let field = Py::new(
            py,
            PyField {
                name: field.name,
                value: field.value,
            },
        )?;
        fields.set_item(name, field)?;
    }

    Ok(PyBlock {
        id: block.id,
        opcode: block.opcode,
        inputs: inputs.into_any().unbind(),
        fields: fields.into_any().unbind(),
        next: block.next,
        top_level: block.top_level,
    })
}

fn convert_blocks(py: Python<'_>, blocks: Vec<BlockRecord>) -> PyResult<PyObject> {
    let list = PyList::empty(py);
    for block in blocks {
        list.append(Py::new(py, convert_block(py, block)?)?)?;
    }
    Ok(list.into_any().unbind())
}

fn parse_event(event: &str) -> PyResult<serde_json::Value> {
    serde_json::from_str(event)
        .map_err(|e| PyValueError::new_err(format!("event is not valid JSON: {e}")))
}

fn options(max_depth: Option<usize>) -> FlattenOptions {
    FlattenOptions { max_depth }
}

// ============================================================================
// EventAdapter
// ============================================================================

/// Creation-event adapter with a markup parse cache.
///
/// Args:
///     capacity: number of parsed markup payloads to keep (default 200)
///     max_depth: optional nesting limit
#[pyclass(name = "EventAdapter")]
pub struct PyEventAdapter {
    inner: CoreEventAdapter,
}

#[pymethods]
impl PyEventAdapter {
    #[new]
    #[pyo3(signature = (capacity=200, max_depth=None), text_signature = "(capacity=200, max_depth=None)")]
    fn new(capacity: usize, max_depth: Option<usize>) -> Self {
        PyEventAdapter {
            inner: CoreEventAdapter::new(ParseCache::new(capacity), options(max_depth)),
        }
    }

    /// Adapt a JSON event string. Returns None when the event is not a
    /// block-creation event; raises FlattenError on malformed markup.
    #[pyo3(text_signature = "(self, event)")]
    fn adapt(&mut self, py: Python<'_>, event: &str) -> PyResult<Option<PyObject>> {
        let event = parse_event(event)?;
        match self.inner.adapt(&event).map_err(to_py_err)? {
            Some(blocks) => Ok(Some(convert_blocks(py, blocks)?)),
            None => Ok(None),
        }
    }

    /// (hits, misses) since creation or the last clear().
    #[getter]
    fn cache_stats(&self) -> (u64, u64) {
        let stats = self.inner.cache().stats();
        (stats.hits, stats.misses)
    }

    fn clear(&mut self) {
        self.inner.cache_mut().clear();
    }

    fn __repr__(&self) -> String {
        format!(
            "EventAdapter(cached={}, capacity={})",
            self.inner.cache().len(),
            self.inner.cache().capacity()
        )
    }
}

// ============================================================================
// Module functions
// ============================================================================

/// Flatten block markup into a list of Block records.
///
/// Args:
///     markup: serialized block markup
///     max_depth: optional nesting limit
///
/// Raises:
///     FlattenError: on malformed markup
#[pyfunction]
#[pyo3(signature = (markup, max_depth=None), text_signature = "(markup, max_depth=None)")]
fn flatten(py: Python<'_>, markup: &str, max_depth: Option<usize>) -> PyResult<PyObject> {
    let blocks =
        blockdom_core::flatten_str_with(markup, &options(max_depth)).map_err(to_py_err)?;
    convert_blocks(py, blocks)
}

/// Adapt a JSON block-creation event.
///
/// Returns:
///     list[Block] | None: None when the event is not a creation event
#[pyfunction]
#[pyo3(signature = (event, max_depth=None), text_signature = "(event, max_depth=None)")]
fn adapt_event(py: Python<'_>, event: &str, max_depth: Option<usize>) -> PyResult<Option<PyObject>> {
    let mut adapter = PyEventAdapter::new(0, max_depth);
    adapter.adapt(py, event)
}

// ============================================================================
// Module
// ============================================================================

/// blockdom - block-editor creation markup to flat block records.
#[pymodule]
fn pybd(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("FlattenError", m.py().get_type::<FlattenError>())?;
    m.add_class::<PyErrorKind>()?;
    m.add_class::<PyInput>()?;
    m.add_class::<PyField>()?;
    m.add_class::<PyBlock>()?;
    m.add_class::<PyEventAdapter>()?;
    m.add_function(wrap_pyfunction!(flatten, m)?)?;
    m.add_function(wrap_pyfunction!(adapt_event, m)?)?;
    Ok(())
}
