use crate::nfa::{Nfa, State, Symbol};
use crate::segmentation::Segmentation;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// One-pass serializer from a segmented product automaton to the textual
/// AFA format.
///
/// State atoms `q<n>` live in the ambient id space; primed atoms `q<n>'`
/// track whether a cross-segment initial state was actually entered. Symbols
/// are remapped to sequential ids on first sight and rendered either as
/// per-track bit atoms (`@AFA-bits`) or as explicit track symbols
/// (`@AFA-explicit`). The emitter consumes segmentation output as given and
/// recomputes nothing from the automaton.
pub struct AfaEmitter<'a, W: Write> {
    sink: &'a mut W,
    use_bits: bool,
    needed_bits: u32,
    remap: FxHashMap<Symbol, Symbol>,
    next_symbol: Symbol,
}

impl<'a, W: Write> AfaEmitter<'a, W> {
    /// `alphabet_size` counts every symbol of the equation including the
    /// seam epsilon; a one-symbol alphabet still gets one padding bit.
    pub fn new(sink: &'a mut W, alphabet_size: usize, use_bits: bool) -> Self {
        let needed_bits = if alphabet_size > 1 {
            usize::BITS - (alphabet_size - 1).leading_zeros()
        } else {
            1
        };
        AfaEmitter {
            sink,
            use_bits,
            needed_bits,
            remap: FxHashMap::default(),
            next_symbol: 0,
        }
    }

    /// Stream the whole AFA description, ending with the termination marker.
    pub fn emit(
        mut self,
        aut: &Nfa,
        segmentation: &Segmentation,
        variable_locations: &[Vec<usize>],
    ) -> io::Result<()> {
        let segments = segmentation.segments();
        let reachable: Vec<Vec<State>> =
            segments.iter().map(|s| s.reachable_states()).collect();

        self.header()?;
        self.initial_formula(aut, segments)?;
        self.final_formula(segmentation, &reachable)?;
        self.transition_formulas(segments, &reachable, variable_locations)?;
        for segment in segments.iter().skip(1) {
            for &init in segment.initial_states() {
                writeln!(self.sink, "q{}' q{}'", init, init)?;
            }
        }
        writeln!(self.sink, "#AFA was fully printed")
    }

    fn header(&mut self) -> io::Result<()> {
        if self.use_bits {
            writeln!(self.sink, "@AFA-bits")
        } else {
            writeln!(self.sink, "@AFA-explicit")?;
            writeln!(self.sink, "%Alphabet-numbers")?;
            writeln!(self.sink, "%Tracks-auto")
        }
    }

    /// Ambient-initial disjunction, conjoined (when more than one segment
    /// exists) with the disjunction over cross-segment initial tuples; each
    /// tuple entry asserts both the state and its primed copy.
    fn initial_formula(&mut self, aut: &Nfa, segments: &[Nfa]) -> io::Result<()> {
        write!(self.sink, "%Initial (")?;
        for (i, &init) in aut.initial_states().iter().enumerate() {
            if i > 0 {
                write!(self.sink, " | ")?;
            }
            write!(self.sink, "q{}", init)?;
        }
        write!(self.sink, ")")?;

        if segments.len() > 1 {
            let mut tuples: Vec<Vec<State>> = vec![Vec::new()];
            for segment in &segments[1..] {
                let prefixes = std::mem::take(&mut tuples);
                for &init in segment.initial_states() {
                    for prefix in &prefixes {
                        let mut tuple = prefix.clone();
                        tuple.push(init);
                        tuples.push(tuple);
                    }
                }
            }
            write!(self.sink, " & (")?;
            for (i, tuple) in tuples.iter().enumerate() {
                if i > 0 {
                    write!(self.sink, " | ")?;
                }
                write!(self.sink, "(")?;
                for (j, &init) in tuple.iter().enumerate() {
                    if j > 0 {
                        write!(self.sink, " & ")?;
                    }
                    write!(self.sink, "q{} & q{}'", init, init)?;
                }
                write!(self.sink, ")")?;
            }
            write!(self.sink, ")")?;
        }
        writeln!(self.sink)
    }

    /// Two parts: exclusion of the last segment's reachable non-final
    /// states, and per cross-segment initial an entry-consistency clause
    /// over the previous segment's leftover states.
    fn final_formula(
        &mut self,
        segmentation: &Segmentation,
        reachable: &[Vec<State>],
    ) -> io::Result<()> {
        let segments = segmentation.segments();

        // cross-segment initial -> reachable states of the previous segment
        // minus the epsilon sources leading into it; ordered for stable output
        let mut previous_non_final: BTreeMap<State, Vec<State>> = BTreeMap::new();
        for (idx, segment) in segments.iter().enumerate().skip(1) {
            for &init in segment.initial_states() {
                previous_non_final.insert(init, reachable[idx - 1].clone());
            }
        }
        for transitions in segmentation.epsilon_depths() {
            for tran in transitions {
                if let Some(states) = previous_non_final.get_mut(&tran.tgt) {
                    if let Ok(pos) = states.binary_search(&tran.src) {
                        states.remove(pos);
                    }
                }
            }
        }

        write!(self.sink, "%Final ")?;
        let last = segments.len() - 1;
        let last_finals = segments[last].final_states();
        let non_final: Vec<State> = reachable[last]
            .iter()
            .copied()
            .filter(|s| last_finals.binary_search(s).is_err())
            .collect();
        if non_final.is_empty() {
            write!(self.sink, "true")?;
        } else {
            write!(self.sink, "(")?;
            for (i, s) in non_final.iter().enumerate() {
                if i > 0 {
                    write!(self.sink, " & ")?;
                }
                write!(self.sink, "!q{}", s)?;
            }
            write!(self.sink, ")")?;
        }

        for (init, states) in &previous_non_final {
            if states.is_empty() {
                continue;
            }
            write!(self.sink, " & (!q{}' | (", init)?;
            for (i, s) in states.iter().enumerate() {
                if i > 0 {
                    write!(self.sink, " & ")?;
                }
                write!(self.sink, "!q{}", s)?;
            }
            write!(self.sink, "))")?;
        }
        writeln!(self.sink)
    }

    /// One line per reachable state with outgoing transitions, for every
    /// segment a variable occupies; the variable index is the track.
    fn transition_formulas(
        &mut self,
        segments: &[Nfa],
        reachable: &[Vec<State>],
        variable_locations: &[Vec<usize>],
    ) -> io::Result<()> {
        for (track, locations) in variable_locations.iter().enumerate() {
            for &loc in locations {
                let segment = &segments[loc];
                for &s in &reachable[loc] {
                    let posts = segment.post(s);
                    if posts.is_empty() {
                        continue;
                    }
                    write!(self.sink, "q{} ", s)?;
                    for (i, post) in posts.iter().enumerate() {
                        if i > 0 {
                            write!(self.sink, " | ")?;
                        }
                        let atom = self.encode_symbol(post.symbol, track);
                        write!(self.sink, "({} & (", atom)?;
                        for (j, &tgt) in post.targets.iter().enumerate() {
                            if j > 0 {
                                write!(self.sink, " | ")?;
                            }
                            write!(self.sink, "q{}", tgt)?;
                        }
                        write!(self.sink, "))")?;
                    }
                    writeln!(self.sink)?;
                }
            }
        }
        Ok(())
    }

    /// Remap a symbol on first sight and render it for the given track:
    /// least-significant bit first as `a<bit>` atoms, or `<sym>@t<track>`.
    fn encode_symbol(&mut self, symbol: Symbol, track: usize) -> String {
        let remapped = match self.remap.get(&symbol) {
            Some(&r) => r,
            None => {
                let r = self.next_symbol;
                self.remap.insert(symbol, r);
                self.next_symbol += 1;
                r
            }
        };
        if self.use_bits {
            let start = track as u32 * self.needed_bits;
            let mut out = String::new();
            for i in 0..self.needed_bits {
                if i > 0 {
                    out.push_str(" & ");
                }
                if (remapped >> i) & 1 == 0 {
                    out.push('!');
                }
                out.push_str(&format!("a{}", start + i));
            }
            out
        } else {
            format!("{}@t{}", remapped, track)
        }
    }
}
