use crate::nfa::{
    concatenate, intersection, invert, is_lang_empty, reduce, EnumAlphabet, Nfa, Symbol,
};
use crate::noodlify::{noodlify, NoodleSequence};
use crate::NoodlerError;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// String-keyed configuration bag. Recognized keys: `reduce` with values
/// `forward` / `backward` / `bidirectional`, and `afa-type` with values
/// `bits` / `tracks`. Unrecognized keys and values are ignored.
pub type Params = FxHashMap<String, String>;

/// Decide an equation `X1 ... Xn ∈ L(rhs)` where the LHS automata are
/// borrowed for mutation: their initial and final states are unified
/// unconditionally before the product is built.
///
/// Returns the noodle sequence of the trimmed product; the AFA rendering of
/// the product goes to `sink`. An empty LHS, an empty RHS language, or an
/// empty product all yield an empty sequence without touching the sink.
pub fn noodlify_for_equation<W: Write>(
    left_automata: &mut [Nfa],
    right_automaton: &Nfa,
    variable_locations: &[Vec<usize>],
    include_empty: bool,
    params: &Params,
    sink: &mut W,
) -> Result<NoodleSequence, NoodlerError> {
    for aut in left_automata.iter_mut() {
        aut.unify_initial();
        aut.unify_final();
    }

    if left_automata.is_empty() || is_lang_empty(right_automaton) {
        return Ok(Vec::new());
    }

    let mut alphabet = EnumAlphabet::new();
    for aut in left_automata.iter() {
        alphabet.add_symbols_from(aut);
    }
    alphabet.add_symbols_from(right_automaton);
    let epsilon = alphabet.next_value();

    let mut left = left_automata[0].clone();
    for aut in &left_automata[1..] {
        left = concatenate(&left, aut, epsilon);
    }

    noodlify_product(
        &left,
        right_automaton,
        epsilon,
        &alphabet,
        variable_locations,
        include_empty,
        params,
        sink,
    )
}

/// Same equation driver for LHS automata shared via handles. Initial and
/// final states are unified only when a reduction is requested; otherwise
/// the shared automata are left untouched.
pub fn noodlify_for_equation_shared<W: Write>(
    left_automata: &[Rc<RefCell<Nfa>>],
    right_automaton: &Nfa,
    variable_locations: &[Vec<usize>],
    include_empty: bool,
    params: &Params,
    sink: &mut W,
) -> Result<NoodleSequence, NoodlerError> {
    let reduce_requested = matches!(
        params.get("reduce").map(String::as_str),
        Some("forward") | Some("backward") | Some("bidirectional")
    );
    if reduce_requested {
        for aut in left_automata {
            let mut aut = aut.borrow_mut();
            aut.unify_initial();
            aut.unify_final();
        }
    }

    if left_automata.is_empty() || is_lang_empty(right_automaton) {
        return Ok(Vec::new());
    }

    let mut alphabet = EnumAlphabet::new();
    for aut in left_automata {
        alphabet.add_symbols_from(&aut.borrow());
    }
    alphabet.add_symbols_from(right_automaton);
    let epsilon = alphabet.next_value();

    let mut left = left_automata[0].borrow().clone();
    for aut in &left_automata[1..] {
        left = concatenate(&left, &aut.borrow(), epsilon);
    }

    noodlify_product(
        &left,
        right_automaton,
        epsilon,
        &alphabet,
        variable_locations,
        include_empty,
        params,
        sink,
    )
}

/// Common tail of both overloads: product, trim, short-circuit, reduction,
/// dispatch.
#[allow(clippy::too_many_arguments)]
fn noodlify_product<W: Write>(
    left: &Nfa,
    right: &Nfa,
    epsilon: Symbol,
    alphabet: &EnumAlphabet,
    variable_locations: &[Vec<usize>],
    include_empty: bool,
    params: &Params,
    sink: &mut W,
) -> Result<NoodleSequence, NoodlerError> {
    let mut product = intersection(left, right, epsilon);
    product.trim();
    if is_lang_empty(&product) {
        return Ok(Vec::new());
    }

    if let Some(value) = params.get("reduce") {
        if value == "forward" || value == "bidirectional" {
            product = reduce(&product);
        }
        if value == "backward" || value == "bidirectional" {
            product = invert(&product);
            product = reduce(&product);
            product = invert(&product);
        }
    }

    noodlify(
        &product,
        epsilon,
        variable_locations,
        alphabet,
        include_empty,
        use_bits(params),
        sink,
    )
}

fn use_bits(params: &Params) -> bool {
    match params.get("afa-type").map(String::as_str) {
        Some("tracks") => false,
        _ => true,
    }
}
