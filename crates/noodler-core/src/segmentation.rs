use crate::nfa::{Nfa, State, Symbol, Transition};
use crate::NoodlerError;
use std::collections::VecDeque;

const UNREACHED: usize = usize::MAX;

/// Split of an epsilon-threaded automaton into depth layers.
///
/// Depth d of a state is the minimal number of epsilon edges on any path from
/// an initial state to it; every epsilon edge must advance the depth by
/// exactly one. Segment s is the sub-automaton induced by the depth-s states,
/// sharing the ambient id space. The per-depth epsilon transition lists drive
/// noodle enumeration.
#[derive(Debug, Clone)]
pub struct Segmentation {
    segments: Vec<Nfa>,
    epsilon_depths: Vec<Vec<Transition>>,
}

impl Segmentation {
    /// Segment `aut` along `epsilon`.
    ///
    /// Fails with [`NoodlerError::MalformedSegmentation`] when an epsilon
    /// edge between reachable states does not step one layer down, which is
    /// the case exactly for epsilon cycles and layer-skipping epsilon edges.
    pub fn new(aut: &Nfa, epsilon: Symbol) -> Result<Self, NoodlerError> {
        let n = aut.num_states();
        let depth = assign_depths(aut, epsilon);

        let mut max_depth = 0;
        for s in 0..n {
            if depth[s] != UNREACHED && depth[s] > max_depth {
                max_depth = depth[s];
            }
        }

        for s in 0..n as State {
            if depth[s as usize] == UNREACHED {
                continue;
            }
            for post in aut.post(s) {
                if post.symbol != epsilon {
                    continue;
                }
                for &t in &post.targets {
                    if depth[t as usize] != depth[s as usize] + 1 {
                        return Err(NoodlerError::MalformedSegmentation {
                            src: s,
                            tgt: t,
                            src_depth: depth[s as usize],
                            tgt_depth: depth[t as usize],
                        });
                    }
                }
            }
        }

        // depth-indexed epsilon transitions, in ascending source-id order
        let mut epsilon_depths: Vec<Vec<Transition>> = vec![Vec::new(); max_depth];
        for s in 0..n as State {
            if depth[s as usize] == UNREACHED {
                continue;
            }
            for post in aut.post(s) {
                if post.symbol != epsilon {
                    continue;
                }
                for &t in &post.targets {
                    epsilon_depths[depth[s as usize]].push(Transition {
                        src: s,
                        symbol: epsilon,
                        tgt: t,
                    });
                }
            }
        }

        let mut segments: Vec<Nfa> = (0..=max_depth).map(|_| Nfa::new(n)).collect();
        for s in 0..n as State {
            let d = depth[s as usize];
            if d == UNREACHED {
                continue;
            }
            for post in aut.post(s) {
                if post.symbol == epsilon {
                    continue;
                }
                for &t in &post.targets {
                    if depth[t as usize] == d {
                        segments[d].add_transition(s, post.symbol, t);
                    }
                }
            }
        }
        for &s in aut.initial_states() {
            segments[0].add_initial(s);
        }
        for (d, transitions) in epsilon_depths.iter().enumerate() {
            for tran in transitions {
                segments[d].add_final(tran.src);
                segments[d + 1].add_initial(tran.tgt);
            }
        }
        for &s in aut.final_states() {
            if depth[s as usize] == max_depth {
                segments[max_depth].add_final(s);
            }
        }

        Ok(Segmentation {
            segments,
            epsilon_depths,
        })
    }

    /// Ordered segment sequence; `segments().len() == epsilon_depths().len() + 1`.
    pub fn segments(&self) -> &[Nfa] {
        &self.segments
    }

    /// Epsilon transitions grouped by depth, densely filled `0..D`.
    pub fn epsilon_depths(&self) -> &[Vec<Transition>] {
        &self.epsilon_depths
    }
}

/// 0-1 BFS from the initial states: non-epsilon edges keep the depth,
/// epsilon edges increase it by one. Yields the minimal epsilon count per
/// reachable state; unreached states stay at `UNREACHED`.
fn assign_depths(aut: &Nfa, epsilon: Symbol) -> Vec<usize> {
    let mut depth = vec![UNREACHED; aut.num_states()];
    let mut deque: VecDeque<(State, usize)> = VecDeque::new();
    for &s in aut.initial_states() {
        depth[s as usize] = 0;
        deque.push_back((s, 0));
    }
    while let Some((s, d)) = deque.pop_front() {
        if d > depth[s as usize] {
            continue; // stale entry
        }
        for post in aut.post(s) {
            let nd = if post.symbol == epsilon { d + 1 } else { d };
            for &t in &post.targets {
                if nd < depth[t as usize] {
                    depth[t as usize] = nd;
                    if nd == d {
                        deque.push_front((t, nd));
                    } else {
                        deque.push_back((t, nd));
                    }
                }
            }
        }
    }
    depth
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoodlerError;

    const EPS: Symbol = 9;

    fn two_segment_aut() -> Nfa {
        // 0 -a-> 1 -eps-> 2 -b-> 3
        let mut aut = Nfa::new(4);
        aut.add_transition(0, 0, 1);
        aut.add_transition(1, EPS, 2);
        aut.add_transition(2, 1, 3);
        aut.add_initial(0);
        aut.add_final(3);
        aut
    }

    #[test]
    fn test_two_segments() {
        let seg = Segmentation::new(&two_segment_aut(), EPS).unwrap();
        assert_eq!(seg.segments().len(), 2);
        assert_eq!(seg.epsilon_depths().len(), 1);
        assert_eq!(
            seg.epsilon_depths()[0],
            vec![Transition {
                src: 1,
                symbol: EPS,
                tgt: 2
            }]
        );

        let first = &seg.segments()[0];
        assert_eq!(first.initial_states(), &[0]);
        assert_eq!(first.final_states(), &[1]);
        assert_eq!(first.targets(0, 0), Some(&[1][..]));
        assert!(first.targets(1, EPS).is_none());

        let second = &seg.segments()[1];
        assert_eq!(second.initial_states(), &[2]);
        assert_eq!(second.final_states(), &[3]);
        assert_eq!(second.targets(2, 1), Some(&[3][..]));
    }

    #[test]
    fn test_no_epsilon_single_segment() {
        let mut aut = Nfa::new(2);
        aut.add_transition(0, 0, 1);
        aut.add_initial(0);
        aut.add_final(1);
        let seg = Segmentation::new(&aut, EPS).unwrap();
        assert_eq!(seg.segments().len(), 1);
        assert!(seg.epsilon_depths().is_empty());
        assert_eq!(seg.segments()[0].initial_states(), &[0]);
        assert_eq!(seg.segments()[0].final_states(), &[1]);
    }

    #[test]
    fn test_multiple_transitions_per_depth() {
        // 0 -a-> 1, 0 -a-> 2; 1 -eps-> 3, 2 -eps-> 4; 3/4 -b-> 5; 5 -eps-> 6
        let mut aut = Nfa::new(7);
        aut.add_transition(0, 0, 1);
        aut.add_transition(0, 0, 2);
        aut.add_transition(1, EPS, 3);
        aut.add_transition(2, EPS, 4);
        aut.add_transition(3, 1, 5);
        aut.add_transition(4, 1, 5);
        aut.add_transition(5, EPS, 6);
        aut.add_initial(0);
        aut.add_final(6);
        let seg = Segmentation::new(&aut, EPS).unwrap();
        assert_eq!(seg.segments().len(), 3);
        assert_eq!(seg.epsilon_depths()[0].len(), 2);
        assert_eq!(seg.epsilon_depths()[1].len(), 1);
        assert_eq!(seg.segments()[1].initial_states(), &[3, 4]);
        assert_eq!(seg.segments()[1].final_states(), &[5]);
        assert_eq!(seg.segments()[2].initial_states(), &[6]);
        assert_eq!(seg.segments()[2].final_states(), &[6]);
    }

    #[test]
    fn test_epsilon_cycle_rejected() {
        let mut aut = Nfa::new(2);
        aut.add_transition(0, EPS, 1);
        aut.add_transition(1, EPS, 0);
        aut.add_initial(0);
        aut.add_final(1);
        let err = Segmentation::new(&aut, EPS).unwrap_err();
        assert!(matches!(err, NoodlerError::MalformedSegmentation { .. }));
    }

    #[test]
    fn test_layer_skipping_epsilon_rejected() {
        // 0 -eps-> 1 -eps-> 2 and a shortcut 0 -eps-> 2
        let mut aut = Nfa::new(3);
        aut.add_transition(0, EPS, 1);
        aut.add_transition(1, EPS, 2);
        aut.add_transition(0, EPS, 2);
        aut.add_initial(0);
        aut.add_final(2);
        let err = Segmentation::new(&aut, EPS).unwrap_err();
        match err {
            NoodlerError::MalformedSegmentation {
                src,
                tgt,
                src_depth,
                tgt_depth,
            } => {
                assert_eq!((src, tgt), (1, 2));
                assert_eq!((src_depth, tgt_depth), (1, 1));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_unreachable_states_ignored() {
        let mut aut = Nfa::new(5);
        aut.add_transition(0, 0, 1);
        aut.add_transition(1, EPS, 2);
        // unreachable island with its own epsilon edge
        aut.add_transition(3, EPS, 4);
        aut.add_initial(0);
        aut.add_final(2);
        let seg = Segmentation::new(&aut, EPS).unwrap();
        assert_eq!(seg.segments().len(), 2);
        assert_eq!(seg.epsilon_depths()[0].len(), 1);
        assert_eq!(seg.epsilon_depths()[0][0].src, 1);
    }
}
