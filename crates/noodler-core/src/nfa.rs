use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;

/// State identifier, unique within one automaton. The id space of an
/// automaton is `0..num_states()`.
pub type State = u32;

/// Symbol identifier. The distinguished epsilon symbol is allocated per call
/// via [`EnumAlphabet::next_value`] and is never baked in as a constant.
pub type Symbol = u32;

/// A single transition `src --symbol--> tgt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub src: State,
    pub symbol: Symbol,
    pub tgt: State,
}

/// Outgoing transitions of one state for one symbol. Post-lists are kept
/// sorted by symbol and target lists sorted and deduplicated, so iteration
/// order is deterministic everywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolPost {
    pub symbol: Symbol,
    pub targets: Vec<State>,
}

/// Nondeterministic finite automaton with symbol-grouped post-lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Nfa {
    /// posts[s] holds the outgoing transitions of state s.
    posts: Vec<Vec<SymbolPost>>,
    initial: Vec<State>,
    finals: Vec<State>,
}

impl Nfa {
    /// Create an automaton with `num_states` states and no transitions.
    pub fn new(num_states: usize) -> Self {
        Nfa {
            posts: vec![Vec::new(); num_states],
            initial: Vec::new(),
            finals: Vec::new(),
        }
    }

    /// Size of the id space. States removed by [`trim`](Nfa::trim) still
    /// count here; the bound is what the registry uses as its sentinel.
    #[inline]
    pub fn num_states(&self) -> usize {
        self.posts.len()
    }

    /// Append a fresh state and return its id.
    pub fn add_state(&mut self) -> State {
        self.posts.push(Vec::new());
        (self.posts.len() - 1) as State
    }

    #[inline]
    pub fn initial_states(&self) -> &[State] {
        &self.initial
    }

    #[inline]
    pub fn final_states(&self) -> &[State] {
        &self.finals
    }

    #[inline]
    pub fn is_initial(&self, state: State) -> bool {
        self.initial.binary_search(&state).is_ok()
    }

    #[inline]
    pub fn is_final(&self, state: State) -> bool {
        self.finals.binary_search(&state).is_ok()
    }

    pub fn add_initial(&mut self, state: State) {
        debug_assert!((state as usize) < self.posts.len());
        if let Err(pos) = self.initial.binary_search(&state) {
            self.initial.insert(pos, state);
        }
    }

    pub fn add_final(&mut self, state: State) {
        debug_assert!((state as usize) < self.posts.len());
        if let Err(pos) = self.finals.binary_search(&state) {
            self.finals.insert(pos, state);
        }
    }

    pub fn set_initial_states(&mut self, mut states: Vec<State>) {
        states.sort_unstable();
        states.dedup();
        self.initial = states;
    }

    pub fn set_final_states(&mut self, mut states: Vec<State>) {
        states.sort_unstable();
        states.dedup();
        self.finals = states;
    }

    /// Add `src --symbol--> tgt`, keeping the post-list grouped and sorted.
    pub fn add_transition(&mut self, src: State, symbol: Symbol, tgt: State) {
        debug_assert!((tgt as usize) < self.posts.len());
        let posts = &mut self.posts[src as usize];
        match posts.binary_search_by_key(&symbol, |p| p.symbol) {
            Ok(pos) => {
                let targets = &mut posts[pos].targets;
                if let Err(tpos) = targets.binary_search(&tgt) {
                    targets.insert(tpos, tgt);
                }
            }
            Err(pos) => posts.insert(
                pos,
                SymbolPost {
                    symbol,
                    targets: vec![tgt],
                },
            ),
        }
    }

    /// Outgoing post-list of a state, grouped by symbol.
    #[inline]
    pub fn post(&self, state: State) -> &[SymbolPost] {
        &self.posts[state as usize]
    }

    /// Targets of `state` under `symbol`, if any.
    pub fn targets(&self, state: State, symbol: Symbol) -> Option<&[State]> {
        let posts = &self.posts[state as usize];
        posts
            .binary_search_by_key(&symbol, |p| p.symbol)
            .ok()
            .map(|pos| posts[pos].targets.as_slice())
    }

    /// Iterate all transitions in (src, symbol, tgt) order.
    pub fn transitions(&self) -> impl Iterator<Item = Transition> + '_ {
        self.posts.iter().enumerate().flat_map(|(src, posts)| {
            posts.iter().flat_map(move |post| {
                post.targets.iter().map(move |&tgt| Transition {
                    src: src as State,
                    symbol: post.symbol,
                    tgt,
                })
            })
        })
    }

    /// Sorted set of states reachable from the initial states.
    pub fn reachable_states(&self) -> Vec<State> {
        let mut seen = vec![false; self.posts.len()];
        let mut queue: VecDeque<State> = VecDeque::new();
        for &s in &self.initial {
            if !seen[s as usize] {
                seen[s as usize] = true;
                queue.push_back(s);
            }
        }
        while let Some(s) = queue.pop_front() {
            for post in &self.posts[s as usize] {
                for &t in &post.targets {
                    if !seen[t as usize] {
                        seen[t as usize] = true;
                        queue.push_back(t);
                    }
                }
            }
        }
        (0..self.posts.len() as State)
            .filter(|&s| seen[s as usize])
            .collect()
    }

    /// Keep exactly the states lying on some initial-to-final path.
    ///
    /// State ids are preserved: useless states lose their transitions and
    /// their initial/final membership, but the id space does not shrink.
    /// After trimming, the language is empty iff the initial set is empty.
    pub fn trim(&mut self) {
        let n = self.posts.len();

        let mut fwd = vec![false; n];
        let mut queue: VecDeque<State> = VecDeque::new();
        for &s in &self.initial {
            if !fwd[s as usize] {
                fwd[s as usize] = true;
                queue.push_back(s);
            }
        }
        while let Some(s) = queue.pop_front() {
            for post in &self.posts[s as usize] {
                for &t in &post.targets {
                    if !fwd[t as usize] {
                        fwd[t as usize] = true;
                        queue.push_back(t);
                    }
                }
            }
        }

        let mut rev: Vec<Vec<State>> = vec![Vec::new(); n];
        for (src, posts) in self.posts.iter().enumerate() {
            for post in posts {
                for &t in &post.targets {
                    rev[t as usize].push(src as State);
                }
            }
        }
        let mut bwd = vec![false; n];
        for &s in &self.finals {
            if !bwd[s as usize] {
                bwd[s as usize] = true;
                queue.push_back(s);
            }
        }
        while let Some(s) = queue.pop_front() {
            for &p in &rev[s as usize] {
                if !bwd[p as usize] {
                    bwd[p as usize] = true;
                    queue.push_back(p);
                }
            }
        }

        let useful: Vec<bool> = (0..n).map(|s| fwd[s] && bwd[s]).collect();
        self.initial.retain(|&s| useful[s as usize]);
        self.finals.retain(|&s| useful[s as usize]);
        for (s, posts) in self.posts.iter_mut().enumerate() {
            if !useful[s] {
                posts.clear();
                continue;
            }
            for post in posts.iter_mut() {
                post.targets.retain(|&t| useful[t as usize]);
            }
            posts.retain(|post| !post.targets.is_empty());
        }
    }

    /// Collapse multiple initial states into one fresh state by copying the
    /// outgoing post-lists of every old initial onto it. The fresh state is
    /// final if any old initial was. A single (or absent) initial state is
    /// left untouched.
    pub fn unify_initial(&mut self) {
        if self.initial.len() <= 1 {
            return;
        }
        let old = std::mem::take(&mut self.initial);
        let fresh = self.add_state();
        let make_final = old.iter().any(|&s| self.is_final(s));
        for &s in &old {
            let posts = self.posts[s as usize].clone();
            for post in posts {
                for t in post.targets {
                    self.add_transition(fresh, post.symbol, t);
                }
            }
        }
        self.initial = vec![fresh];
        if make_final {
            self.add_final(fresh);
        }
    }

    /// Collapse multiple final states into one fresh state: every transition
    /// entering an old final also enters the fresh state. The fresh state is
    /// initial if any old final was.
    pub fn unify_final(&mut self) {
        if self.finals.len() <= 1 {
            return;
        }
        let old = std::mem::take(&mut self.finals);
        let mut entering: Vec<(State, Symbol)> = Vec::new();
        for (src, posts) in self.posts.iter().enumerate() {
            for post in posts {
                if post.targets.iter().any(|t| old.binary_search(t).is_ok()) {
                    entering.push((src as State, post.symbol));
                }
            }
        }
        let fresh = self.add_state();
        let make_initial = old.iter().any(|&s| self.is_initial(s));
        for (src, symbol) in entering {
            self.add_transition(src, symbol, fresh);
        }
        self.finals = vec![fresh];
        if make_initial {
            self.add_initial(fresh);
        }
    }

    /// Word membership by state-set simulation. Symbols are matched
    /// literally; intended for epsilon-free automata.
    pub fn accepts(&self, word: &[Symbol]) -> bool {
        let mut current = self.initial.clone();
        for &symbol in word {
            let mut next: Vec<State> = Vec::new();
            for &s in &current {
                if let Some(targets) = self.targets(s, symbol) {
                    next.extend_from_slice(targets);
                }
            }
            next.sort_unstable();
            next.dedup();
            if next.is_empty() {
                return false;
            }
            current = next;
        }
        current.iter().any(|&s| self.is_final(s))
    }
}

/// True iff the automaton accepts no word.
pub fn is_lang_empty(aut: &Nfa) -> bool {
    let mut seen = vec![false; aut.num_states()];
    let mut queue: VecDeque<State> = VecDeque::new();
    for &s in aut.initial_states() {
        if !seen[s as usize] {
            seen[s as usize] = true;
            queue.push_back(s);
        }
    }
    while let Some(s) = queue.pop_front() {
        if aut.is_final(s) {
            return false;
        }
        for post in aut.post(s) {
            for &t in &post.targets {
                if !seen[t as usize] {
                    seen[t as usize] = true;
                    queue.push_back(t);
                }
            }
        }
    }
    true
}

/// Concatenation `L(a) . L(b)` realized by epsilon edges from `a`'s final
/// states to `b`'s initial states. `b`'s ids are offset by `a.num_states()`.
pub fn concatenate(a: &Nfa, b: &Nfa, epsilon: Symbol) -> Nfa {
    let offset = a.num_states() as State;
    let mut out = Nfa::new(a.num_states() + b.num_states());
    for t in a.transitions() {
        out.add_transition(t.src, t.symbol, t.tgt);
    }
    for t in b.transitions() {
        out.add_transition(t.src + offset, t.symbol, t.tgt + offset);
    }
    for &f in a.final_states() {
        for &i in b.initial_states() {
            out.add_transition(f, epsilon, i + offset);
        }
    }
    out.set_initial_states(a.initial_states().to_vec());
    out.set_final_states(b.final_states().iter().map(|&s| s + offset).collect());
    out
}

/// Pair-product of `a` and `b` where `epsilon` on the `a` side moves `a`
/// alone (`b` stands still, as if every `b` state carried an epsilon
/// self-loop). `b` is expected to be epsilon-free.
///
/// Product states are interned in BFS discovery order, which makes the
/// output numbering deterministic.
pub fn intersection(a: &Nfa, b: &Nfa, epsilon: Symbol) -> Nfa {
    let mut out = Nfa::new(0);
    let mut pair_ids: FxHashMap<(State, State), State> = FxHashMap::default();
    let mut pairs: Vec<(State, State)> = Vec::new();
    let mut worklist: VecDeque<State> = VecDeque::new();

    fn intern(
        p: State,
        q: State,
        out: &mut Nfa,
        pair_ids: &mut FxHashMap<(State, State), State>,
        pairs: &mut Vec<(State, State)>,
        worklist: &mut VecDeque<State>,
    ) -> State {
        if let Some(&id) = pair_ids.get(&(p, q)) {
            return id;
        }
        let id = out.add_state();
        pair_ids.insert((p, q), id);
        pairs.push((p, q));
        worklist.push_back(id);
        id
    }

    for &p in a.initial_states() {
        for &q in b.initial_states() {
            let id = intern(p, q, &mut out, &mut pair_ids, &mut pairs, &mut worklist);
            out.add_initial(id);
        }
    }

    while let Some(id) = worklist.pop_front() {
        let (p, q) = pairs[id as usize];
        if a.is_final(p) && b.is_final(q) {
            out.add_final(id);
        }
        for post in a.post(p) {
            if post.symbol == epsilon {
                for &t in &post.targets {
                    let tid = intern(t, q, &mut out, &mut pair_ids, &mut pairs, &mut worklist);
                    out.add_transition(id, epsilon, tid);
                }
            } else if let Some(b_targets) = b.targets(q, post.symbol) {
                for &t in &post.targets {
                    for &u in b_targets {
                        let tid =
                            intern(t, u, &mut out, &mut pair_ids, &mut pairs, &mut worklist);
                        out.add_transition(id, post.symbol, tid);
                    }
                }
            }
        }
    }
    out
}

/// Reverse every transition and swap initial and final states.
pub fn invert(aut: &Nfa) -> Nfa {
    let mut out = Nfa::new(aut.num_states());
    for t in aut.transitions() {
        out.add_transition(t.tgt, t.symbol, t.src);
    }
    out.set_initial_states(aut.final_states().to_vec());
    out.set_final_states(aut.initial_states().to_vec());
    out
}

/// Language-preserving shrink: trim, then merge bisimulation-equivalent
/// states by partition refinement (classes seeded from finality, refined on
/// per-symbol successor-class signatures until stable) and quotient.
pub fn reduce(aut: &Nfa) -> Nfa {
    let mut trimmed = aut.clone();
    trimmed.trim();
    let live = trimmed.reachable_states();
    if live.is_empty() {
        return Nfa::new(0);
    }

    let n = trimmed.num_states();
    let mut class_of: Vec<u32> = vec![0; n];
    for &s in &live {
        class_of[s as usize] = trimmed.is_final(s) as u32;
    }
    let mut num_classes = if live.iter().any(|&s| trimmed.is_final(s))
        && live.iter().any(|&s| !trimmed.is_final(s))
    {
        2
    } else {
        1
    };
    // seed classes 0/1 may be sparse; the first refinement round re-interns
    // them densely together with the successor signatures
    loop {
        let mut sig_ids: FxHashMap<(u32, Vec<(Symbol, Vec<u32>)>), u32> = FxHashMap::default();
        let mut next: Vec<u32> = vec![0; n];
        for &s in &live {
            let mut posts_sig: Vec<(Symbol, Vec<u32>)> = Vec::new();
            for post in trimmed.post(s) {
                let mut classes: Vec<u32> =
                    post.targets.iter().map(|&t| class_of[t as usize]).collect();
                classes.sort_unstable();
                classes.dedup();
                posts_sig.push((post.symbol, classes));
            }
            let sig = (class_of[s as usize], posts_sig);
            let fresh = sig_ids.len() as u32;
            let id = *sig_ids.entry(sig).or_insert(fresh);
            next[s as usize] = id;
        }
        let count = sig_ids.len() as u32;
        class_of = next;
        if count == num_classes {
            break;
        }
        num_classes = count;
    }

    let mut out = Nfa::new(num_classes as usize);
    for &s in &live {
        let c = class_of[s as usize];
        for post in trimmed.post(s) {
            for &t in &post.targets {
                out.add_transition(c, post.symbol, class_of[t as usize]);
            }
        }
    }
    out.set_initial_states(
        trimmed
            .initial_states()
            .iter()
            .map(|&s| class_of[s as usize])
            .collect(),
    );
    out.set_final_states(
        trimmed
            .final_states()
            .iter()
            .map(|&s| class_of[s as usize])
            .collect(),
    );
    out
}

/// Alphabet that grows from automata and hands out fresh symbols.
#[derive(Debug, Clone, Default)]
pub struct EnumAlphabet {
    symbols: FxHashSet<Symbol>,
    next: Symbol,
}

impl EnumAlphabet {
    pub fn new() -> Self {
        EnumAlphabet::default()
    }

    /// Record a symbol as part of the alphabet.
    pub fn add_symbol(&mut self, symbol: Symbol) {
        self.symbols.insert(symbol);
        if symbol >= self.next {
            self.next = symbol + 1;
        }
    }

    /// Record every symbol occurring on a transition of `aut`.
    pub fn add_symbols_from(&mut self, aut: &Nfa) {
        for s in 0..aut.num_states() as State {
            for post in aut.post(s) {
                self.add_symbol(post.symbol);
            }
        }
    }

    /// Return a symbol strictly greater than every recorded one, record it,
    /// and advance.
    pub fn next_value(&mut self) -> Symbol {
        let value = self.next;
        self.add_symbol(value);
        value
    }

    /// Number of recorded symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn contains(&self, symbol: Symbol) -> bool {
        self.symbols.contains(&symbol)
    }
}
