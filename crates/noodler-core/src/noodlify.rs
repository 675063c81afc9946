use crate::afa::AfaEmitter;
use crate::nfa::{is_lang_empty, EnumAlphabet, Nfa, State, Symbol};
use crate::segmentation::Segmentation;
use crate::NoodlerError;
use rustc_hash::FxHashMap;
use std::io::Write;
use std::rc::Rc;

/// One choice of trimmed segment automaton per segment, pinned so that
/// consecutive elements meet on a single epsilon transition.
pub type Noodle = Vec<Rc<Nfa>>;

/// All noodles of one call, in mixed-radix combination order.
pub type NoodleSequence = Vec<Noodle>;

/// Memoized map from (init, final) pin pairs to trimmed single-initial /
/// single-final segment copies.
///
/// The sentinel `unused` (the ambient automaton's `num_states`) stands for
/// "all initial states" in a first-segment key `(unused, f)` and for "all
/// final states" in a last-segment key `(i, unused)`. The registry owns the
/// copies; noodles share them through `Rc` handles.
pub struct SegmentRegistry {
    map: FxHashMap<(State, State), Rc<Nfa>>,
    unused: State,
}

impl SegmentRegistry {
    /// Build every viable pinned copy. A copy is stored iff it is non-empty
    /// after trimming, unless `include_empty` keeps the empty ones too.
    pub fn build(segments: &[Nfa], unused: State, include_empty: bool) -> Self {
        let mut map: FxHashMap<(State, State), Rc<Nfa>> = FxHashMap::default();
        let last = segments.len() - 1;
        for (idx, segment) in segments.iter().enumerate() {
            if idx == 0 {
                // first segment keeps all initial states, one final varies
                for &f in segment.final_states() {
                    let mut copy = segment.clone();
                    copy.set_final_states(vec![f]);
                    copy.trim();
                    if !is_lang_empty(&copy) || include_empty {
                        map.insert((unused, f), Rc::new(copy));
                    }
                }
            } else if idx == last {
                // last segment keeps all final states, one initial varies
                for &i in segment.initial_states() {
                    let mut copy = segment.clone();
                    copy.set_initial_states(vec![i]);
                    copy.trim();
                    if !is_lang_empty(&copy) || include_empty {
                        map.insert((i, unused), Rc::new(copy));
                    }
                }
            } else {
                for &i in segment.initial_states() {
                    for &f in segment.final_states() {
                        let mut copy = segment.clone();
                        copy.set_initial_states(vec![i]);
                        copy.set_final_states(vec![f]);
                        copy.trim();
                        if !is_lang_empty(&copy) || include_empty {
                            map.insert((i, f), Rc::new(copy));
                        }
                    }
                }
            }
        }
        SegmentRegistry { map, unused }
    }

    /// Total lookup; a miss is a normal skip condition during enumeration.
    pub fn lookup(&self, init: State, final_state: State) -> Option<&Rc<Nfa>> {
        self.map.get(&(init, final_state))
    }

    /// The sentinel state standing for the unpinned end positions.
    pub fn unused_state(&self) -> State {
        self.unused
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Enumerate the noodles of `aut` and stream its AFA rendering to `sink`.
///
/// `variable_locations[v]` lists the segment indices encoding variable `v`
/// after product construction; `alphabet` is the shared symbol table of the
/// equation including `epsilon`. Combinations of epsilon transitions (one
/// per depth) are walked in mixed-radix order of the combination index, so
/// the output order is deterministic.
pub fn noodlify<W: Write>(
    aut: &Nfa,
    epsilon: Symbol,
    variable_locations: &[Vec<usize>],
    alphabet: &EnumAlphabet,
    include_empty: bool,
    use_bits: bool,
    sink: &mut W,
) -> Result<NoodleSequence, NoodlerError> {
    let segmentation = Segmentation::new(aut, epsilon)?;
    let segments = segmentation.segments();

    if segments.len() == 1 {
        let mut segment = segments[0].clone();
        segment.trim();
        if is_lang_empty(&segment) && !include_empty {
            return Ok(Vec::new());
        }
        AfaEmitter::new(sink, alphabet.len(), use_bits).emit(
            aut,
            &segmentation,
            variable_locations,
        )?;
        return Ok(vec![vec![Rc::new(segment)]]);
    }

    let unused = aut.num_states() as State;
    let registry = SegmentRegistry::build(segments, unused, include_empty);

    AfaEmitter::new(sink, alphabet.len(), use_bits).emit(aut, &segmentation, variable_locations)?;

    let depths = segmentation.epsilon_depths();
    let num_combinations: usize = depths.iter().map(|d| d.len()).product();

    let mut noodles: NoodleSequence = Vec::new();
    for index in 0..num_combinations {
        // decompose the combination index into one transition per depth
        let mut rem = index;
        let chosen: Vec<_> = depths
            .iter()
            .map(|transitions| {
                let pick = &transitions[rem % transitions.len()];
                rem /= transitions.len();
                pick
            })
            .collect();

        let mut noodle: Noodle = Vec::with_capacity(depths.len() + 1);
        match registry.lookup(unused, chosen[0].src) {
            Some(first) => noodle.push(Rc::clone(first)),
            None => continue,
        }

        let mut all_found = true;
        for pair in chosen.windows(2) {
            match registry.lookup(pair[0].tgt, pair[1].src) {
                Some(middle) => noodle.push(Rc::clone(middle)),
                None => {
                    all_found = false;
                    break;
                }
            }
        }
        if !all_found {
            continue;
        }

        match registry.lookup(chosen[chosen.len() - 1].tgt, unused) {
            Some(last) => noodle.push(Rc::clone(last)),
            None => continue,
        }

        noodles.push(noodle);
    }
    Ok(noodles)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: Symbol = 9;

    fn alphabet_with_eps(symbols: &[Symbol]) -> EnumAlphabet {
        let mut alphabet = EnumAlphabet::new();
        for &s in symbols {
            alphabet.add_symbol(s);
        }
        alphabet.add_symbol(EPS);
        alphabet
    }

    fn run(aut: &Nfa, include_empty: bool) -> NoodleSequence {
        let mut sink = Vec::new();
        noodlify(
            aut,
            EPS,
            &[vec![0]],
            &alphabet_with_eps(&[0, 1, 2]),
            include_empty,
            true,
            &mut sink,
        )
        .unwrap()
    }

    #[test]
    fn test_single_segment_identity() {
        // no epsilon: one noodle holding the trimmed automaton itself
        let mut aut = Nfa::new(3);
        aut.add_transition(0, 0, 1);
        aut.add_transition(0, 0, 2); // dead branch, trimmed away
        aut.add_initial(0);
        aut.add_final(1);
        let noodles = run(&aut, false);
        assert_eq!(noodles.len(), 1);
        assert_eq!(noodles[0].len(), 1);
        let segment = &noodles[0][0];
        assert!(segment.accepts(&[0]));
        assert!(segment.post(2).is_empty());
    }

    #[test]
    fn test_single_segment_empty_language() {
        let mut aut = Nfa::new(2);
        aut.add_initial(0);
        aut.add_final(1);
        assert!(run(&aut, false).is_empty());
        let noodles = run(&aut, true);
        assert_eq!(noodles.len(), 1);
        assert!(is_lang_empty(&noodles[0][0]));
    }

    fn multi_depth_aut() -> Nfa {
        // segment 0: 0 -a-> 1, 0 -a-> 2
        // depth 0:   1 -eps-> 3, 2 -eps-> 4        (k0 = 2)
        // segment 1: 3 -b-> 5, 4 -b-> 5
        // depth 1:   5 -eps-> 6, 5 -eps-> 7, 5 -eps-> 8   (k1 = 3)
        // segment 2: 6/7/8 -c-> 9 (final)
        let mut aut = Nfa::new(10);
        aut.add_transition(0, 0, 1);
        aut.add_transition(0, 0, 2);
        aut.add_transition(1, EPS, 3);
        aut.add_transition(2, EPS, 4);
        aut.add_transition(3, 1, 5);
        aut.add_transition(4, 1, 5);
        aut.add_transition(5, EPS, 6);
        aut.add_transition(5, EPS, 7);
        aut.add_transition(5, EPS, 8);
        aut.add_transition(6, 2, 9);
        aut.add_transition(7, 2, 9);
        aut.add_transition(8, 2, 9);
        aut.add_initial(0);
        aut.add_final(9);
        aut
    }

    #[test]
    fn test_registry_keys() {
        let segmentation = Segmentation::new(&multi_depth_aut(), EPS).unwrap();
        let registry = SegmentRegistry::build(segmentation.segments(), 10, false);
        assert_eq!(registry.unused_state(), 10);
        // first: (unused, f) for finals {1, 2}
        assert!(registry.lookup(10, 1).is_some());
        assert!(registry.lookup(10, 2).is_some());
        // middle: (i, f) for {3, 4} x {5}
        assert!(registry.lookup(3, 5).is_some());
        assert!(registry.lookup(4, 5).is_some());
        // last: (i, unused) for initials {6, 7, 8}
        assert!(registry.lookup(6, 10).is_some());
        assert!(registry.lookup(7, 10).is_some());
        assert!(registry.lookup(8, 10).is_some());
        assert_eq!(registry.len(), 7);
        assert!(registry.lookup(5, 6).is_none());
    }

    #[test]
    fn test_combination_count_and_order() {
        let noodles = run(&multi_depth_aut(), false);
        // every lookup succeeds: exactly k0 * k1 = 6 noodles
        assert_eq!(noodles.len(), 6);
        for noodle in &noodles {
            assert_eq!(noodle.len(), 3);
        }
        // mixed-radix order: depth 0 cycles fastest
        assert_eq!(noodles[0][0].final_states(), &[1]);
        assert_eq!(noodles[1][0].final_states(), &[2]);
        assert_eq!(noodles[0][2].initial_states(), &[6]);
        assert_eq!(noodles[2][2].initial_states(), &[7]);
        assert_eq!(noodles[4][2].initial_states(), &[8]);
    }

    #[test]
    fn test_endpoint_consistency() {
        // every noodle's pins line up with one epsilon transition per depth
        let aut = multi_depth_aut();
        let segmentation = Segmentation::new(&aut, EPS).unwrap();
        let depths = segmentation.epsilon_depths();
        for noodle in run(&aut, false) {
            let first_final = noodle[0].final_states()[0];
            let t0 = depths[0].iter().find(|t| t.src == first_final).unwrap();
            assert_eq!(noodle[1].initial_states(), &[t0.tgt]);
            let mid_final = noodle[1].final_states()[0];
            let t1 = depths[1].iter().find(|t| t.src == mid_final).unwrap();
            assert_eq!(noodle[2].initial_states(), &[t1.tgt]);
        }
    }

    #[test]
    fn test_unviable_combination_skipped() {
        // 0 -a-> 1; 1 -eps-> 2, 1 -eps-> 3; 2 -b-> 4; 4 -eps-> 5; 5 final.
        // The (3, 4) middle pin has no path and is skipped.
        let mut aut = Nfa::new(6);
        aut.add_transition(0, 0, 1);
        aut.add_transition(1, EPS, 2);
        aut.add_transition(1, EPS, 3);
        aut.add_transition(2, 1, 4);
        aut.add_transition(4, EPS, 5);
        aut.add_initial(0);
        aut.add_final(5);

        let noodles = run(&aut, false);
        assert_eq!(noodles.len(), 1);
        assert_eq!(noodles[0][1].initial_states(), &[2]);

        // include_empty keeps the empty pinned copy and the combination
        let noodles = run(&aut, true);
        assert_eq!(noodles.len(), 2);
        assert!(is_lang_empty(&noodles[1][1]));
    }

    #[test]
    fn test_noodles_share_segments() {
        // both combinations at depth 1 reuse the same first-segment copy
        let mut aut = Nfa::new(6);
        aut.add_transition(0, 0, 1);
        aut.add_transition(1, EPS, 2);
        aut.add_transition(2, 1, 3);
        aut.add_transition(3, EPS, 4);
        aut.add_transition(3, EPS, 5);
        aut.add_initial(0);
        aut.add_final(4);
        aut.add_final(5);
        let noodles = run(&aut, false);
        assert_eq!(noodles.len(), 2);
        assert!(Rc::ptr_eq(&noodles[0][0], &noodles[1][0]));
    }

    #[test]
    fn test_malformed_segmentation_propagates() {
        let mut aut = Nfa::new(2);
        aut.add_transition(0, EPS, 1);
        aut.add_transition(1, EPS, 0);
        aut.add_initial(0);
        aut.add_final(1);
        let mut sink = Vec::new();
        let err = noodlify(
            &aut,
            EPS,
            &[vec![0]],
            &alphabet_with_eps(&[]),
            false,
            true,
            &mut sink,
        )
        .unwrap_err();
        assert!(matches!(err, NoodlerError::MalformedSegmentation { .. }));
        assert!(sink.is_empty());
    }

    struct FailingSink;

    impl Write for FailingSink {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "sink closed"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_error_propagates() {
        let err = noodlify(
            &multi_depth_aut(),
            EPS,
            &[vec![0]],
            &alphabet_with_eps(&[0, 1, 2]),
            false,
            true,
            &mut FailingSink,
        )
        .unwrap_err();
        assert!(matches!(err, NoodlerError::Sink(_)));
    }

    #[test]
    fn test_trimness_of_returned_segments() {
        for noodle in run(&multi_depth_aut(), false) {
            for segment in noodle {
                let mut again = (*segment).clone();
                again.trim();
                assert_eq!(*segment, again);
            }
        }
    }
}
