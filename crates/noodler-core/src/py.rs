use crate::equation::{noodlify_for_equation, Params};
use crate::nfa::Nfa;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;

/// Python-visible NFA wrapper. Constructed once from Python arrays, then
/// passed to the equation driver.
#[pyclass]
pub struct RustNfa {
    pub(crate) inner: Nfa,
}

#[pymethods]
impl RustNfa {
    #[new]
    #[pyo3(signature = (num_states, initial_states, final_states, arc_src, arc_sym, arc_dst))]
    fn new(
        num_states: usize,
        initial_states: Vec<u32>,
        final_states: Vec<u32>,
        arc_src: Vec<u32>,
        arc_sym: Vec<u32>,
        arc_dst: Vec<u32>,
    ) -> Self {
        let mut inner = Nfa::new(num_states);
        for &s in &initial_states {
            inner.add_initial(s);
        }
        for &s in &final_states {
            inner.add_final(s);
        }
        for i in 0..arc_src.len() {
            inner.add_transition(arc_src[i], arc_sym[i], arc_dst[i]);
        }
        RustNfa { inner }
    }

    fn num_states(&self) -> usize {
        self.inner.num_states()
    }

    fn initial_states(&self) -> Vec<u32> {
        self.inner.initial_states().to_vec()
    }

    fn final_states(&self) -> Vec<u32> {
        self.inner.final_states().to_vec()
    }

    fn arcs(&self) -> (Vec<u32>, Vec<u32>, Vec<u32>) {
        let mut src = Vec::new();
        let mut sym = Vec::new();
        let mut dst = Vec::new();
        for t in self.inner.transitions() {
            src.push(t.src);
            sym.push(t.symbol);
            dst.push(t.tgt);
        }
        (src, sym, dst)
    }

    fn accepts(&self, word: Vec<u32>) -> bool {
        self.inner.accepts(&word)
    }
}

/// Python-visible noodlification result: the noodle sequence as nested
/// lists of automata, plus the captured AFA text.
#[pyclass]
pub struct NoodleResult {
    #[pyo3(get)]
    afa: String,
    noodles: Vec<Vec<Py<RustNfa>>>,
}

#[pymethods]
impl NoodleResult {
    fn noodles(&self, py: Python<'_>) -> Vec<Vec<Py<RustNfa>>> {
        self.noodles
            .iter()
            .map(|noodle| noodle.iter().map(|seg| seg.clone_ref(py)).collect())
            .collect()
    }

    fn num_noodles(&self) -> usize {
        self.noodles.len()
    }
}

/// Decide an equation `X1 ... Xn ∈ L(rhs)`. The LHS automata are copied in;
/// the AFA side output is captured into the result.
#[pyfunction]
#[pyo3(signature = (left_automata, right_automaton, variable_locations, include_empty=false, params=None))]
pub fn rust_noodlify_for_equation(
    py: Python<'_>,
    left_automata: Vec<Py<RustNfa>>,
    right_automaton: &RustNfa,
    variable_locations: Vec<Vec<usize>>,
    include_empty: bool,
    params: Option<HashMap<String, String>>,
) -> PyResult<NoodleResult> {
    let mut lhs: Vec<Nfa> = left_automata
        .iter()
        .map(|aut| aut.borrow(py).inner.clone())
        .collect();
    let params: Params = params.unwrap_or_default().into_iter().collect();

    let mut sink: Vec<u8> = Vec::new();
    let noodles = noodlify_for_equation(
        &mut lhs,
        &right_automaton.inner,
        &variable_locations,
        include_empty,
        &params,
        &mut sink,
    )
    .map_err(|err| PyValueError::new_err(err.to_string()))?;

    let mut out: Vec<Vec<Py<RustNfa>>> = Vec::with_capacity(noodles.len());
    for noodle in noodles {
        let mut row = Vec::with_capacity(noodle.len());
        for segment in noodle {
            row.push(Py::new(
                py,
                RustNfa {
                    inner: (*segment).clone(),
                },
            )?);
        }
        out.push(row);
    }

    Ok(NoodleResult {
        afa: String::from_utf8_lossy(&sink).into_owned(),
        noodles: out,
    })
}
