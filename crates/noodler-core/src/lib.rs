//! Noodlification of epsilon-segmented NFAs.
//!
//! Given a product automaton threaded with a distinguished epsilon symbol that
//! marks concatenation seams between string variables, this crate splits the
//! automaton into segments, enumerates the concatenation-compatible sequences
//! of trimmed segment automata ("noodles"), and serializes the product as an
//! alternating finite automaton. The [`equation`] module drives the whole
//! pipeline for equations of the form `X1 ... Xn ∈ L(R)`.

pub mod nfa;
pub mod segmentation;
pub mod noodlify;
pub mod afa;
pub mod equation;
#[cfg(feature = "python")]
pub mod py;

pub use equation::{noodlify_for_equation, noodlify_for_equation_shared, Params};
pub use nfa::{EnumAlphabet, Nfa, State, Symbol, Transition};
pub use noodlify::{noodlify, Noodle, NoodleSequence};

use thiserror::Error;

/// Errors surfaced by the noodlification pipeline.
///
/// An empty result language is not an error; the entry points return an empty
/// noodle sequence for it.
#[derive(Debug, Error)]
pub enum NoodlerError {
    /// An epsilon transition does not advance the segmentation depth by
    /// exactly one. Covers both epsilon cycles and epsilon edges that skip a
    /// layer.
    #[error(
        "epsilon transition {src} -> {tgt} crosses segment depths {src_depth} -> {tgt_depth}"
    )]
    MalformedSegmentation {
        src: State,
        tgt: State,
        src_depth: usize,
        tgt_depth: usize,
    },

    /// The AFA sink failed; the side output is well formed up to the failure
    /// point.
    #[error("AFA sink error: {0}")]
    Sink(#[from] std::io::Error),
}

/// Result type for noodlification operations.
pub type NoodlerResult<T> = Result<T, NoodlerError>;

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn noodler_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<py::RustNfa>()?;
    m.add_class::<py::NoodleResult>()?;
    m.add_function(wrap_pyfunction!(py::rust_noodlify_for_equation, m)?)?;
    Ok(())
}
