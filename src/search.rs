/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::{Duration, Instant},
};

use arrayvec::ArrayVec;
use uci_parser::{UciInfo, UciResponse, UciSearchOptions};

use crate::{
    evaluate, generate_legal, generate_pseudo_legal, in_check, legal_castle_path_ok, see_full,
    see_quick, tune, Bound, ContinuationHistory, CountermoveTable, HistoryTable, KillerTable,
    Move, MoveList, PieceKind, Position, Score, Square, TranspositionTable,
};

/// Maximum search depth in plies; all per-ply stacks are sized by this.
pub const MAX_PLY: usize = 128;

/// Represents the best sequence of moves found during a search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PrincipalVariation(ArrayVec<Move, MAX_PLY>);

impl PrincipalVariation {
    /// Removes all moves from this PV.
    #[inline(always)]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Replaces the contents of `self` with `mv` followed by `tail`.
    #[inline(always)]
    pub fn load(&mut self, mv: Move, tail: &Self) {
        self.0.clear();
        self.0.push(mv);
        for &m in tail.0.iter().take(MAX_PLY - 1) {
            self.0.push(m);
        }
    }

    /// The move at index `i`, if present.
    #[inline(always)]
    pub fn get(&self, i: usize) -> Option<Move> {
        self.0.get(i).copied()
    }

    /// Number of moves in this PV.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if this PV holds no moves.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterator over the moves of this PV.
    #[inline(always)]
    pub fn iter(&self) -> impl Iterator<Item = &Move> {
        self.0.iter()
    }

    #[inline(always)]
    fn push(&mut self, mv: Move) {
        if self.0.len() < MAX_PLY {
            self.0.push(mv);
        }
    }
}

/// The result of a search: the best move found, its score, and telemetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    /// Number of nodes searched by this thread.
    pub nodes: u64,

    /// Best move found, or `None` if the root has no legal moves.
    pub bestmove: Option<Move>,

    /// The expected reply, if the PV extends that far.
    pub ponder: Option<Move>,

    /// Evaluation of the root position.
    pub score: Score,

    /// Depth of the last completed iteration.
    pub depth: i32,

    /// Principal variation of the last completed iteration.
    pub pv: PrincipalVariation,
}

impl Default for SearchResult {
    #[inline(always)]
    fn default() -> Self {
        Self {
            nodes: 0,
            bestmove: None,
            ponder: None,
            score: Score::DRAW,
            depth: 0,
            pv: PrincipalVariation::default(),
        }
    }
}

/// Configuration for a single `think` call.
#[derive(Debug, Clone, Copy)]
pub struct SearchConfig {
    /// Maximum depth to iterate to.
    pub max_depth: i32,

    /// Node allowance; the search exits as soon as possible once exceeded.
    pub max_nodes: u64,

    /// Moment the search started.
    pub starttime: Instant,

    /// Soft limit: iterative deepening stops early once past this, provided
    /// the best move has settled.
    pub soft_timeout: Duration,

    /// Hard limit: the search cancels outright once past this.
    pub hard_timeout: Duration,
}

impl SearchConfig {
    /// Builds a config from UCI `go` options, ignoring the clock fields.
    ///
    /// Clock-mode time allocation happens at the engine boundary; by the
    /// time a config is built, time control has been reduced to a movetime.
    pub fn new(options: &UciSearchOptions) -> Self {
        let mut config = Self::default();

        if let Some(depth) = options.depth {
            config.max_depth = (depth as i32).min(MAX_PLY as i32 - 1);
        }

        if let Some(nodes) = options.nodes {
            config.max_nodes = nodes as u64;
        }

        if let Some(movetime) = options.movetime {
            config.set_movetime(movetime);
        }

        config
    }

    /// Sets the hard timeout, with the soft timeout at 70% of it.
    pub fn set_movetime(&mut self, movetime: Duration) {
        self.hard_timeout = movetime;
        self.soft_timeout = movetime.mul_f64(0.7);
    }
}

impl Default for SearchConfig {
    /// A default config permits an "infinite" search.
    #[inline(always)]
    fn default() -> Self {
        Self {
            max_depth: MAX_PLY as i32 - 1,
            max_nodes: u64::MAX,
            starttime: Instant::now(),
            soft_timeout: Duration::MAX,
            hard_timeout: Duration::MAX,
        }
    }
}

/// Root-move striping for worker threads: `(offset, stride)`.
///
/// A worker skips root moves whose index is not `offset` modulo `stride`,
/// so overlapping workers spread their effort across the root.
pub type RootSplit = (usize, usize);

/// Long-lived per-thread search state.
///
/// The heuristic tables persist across `think` calls within a game and are
/// only cleared by a new game.
pub struct Searcher {
    killers: KillerTable,
    history: HistoryTable,
    countermoves: CountermoveTable,
    cont_hist: ContinuationHistory,

    /// This thread's index within the pool; 0 is the main thread.
    pub thread_index: usize,
}

impl Searcher {
    /// Creates a fresh searcher for the thread at `thread_index`.
    pub fn new(thread_index: usize) -> Self {
        Self {
            killers: KillerTable::default(),
            history: HistoryTable::default(),
            countermoves: CountermoveTable::default(),
            cont_hist: ContinuationHistory::default(),
            thread_index,
        }
    }

    /// Clears every heuristic table, as at the start of a new game.
    pub fn new_game(&mut self) {
        self.killers.clear();
        self.history.clear();
        self.countermoves.clear();
        self.cont_hist.clear();
    }
}

/// A single `think` call in progress on one thread.
///
/// Borrows the thread's persistent [`Searcher`] tables and the shared
/// transposition table, stop flag, and node counter from the pool.
pub struct Search<'a> {
    searcher: &'a mut Searcher,
    ttable: &'a TranspositionTable,
    stop: &'a AtomicBool,
    global_nodes: &'a AtomicU64,
    config: SearchConfig,

    /// Only the main thread reads the wall clock and emits `info` lines.
    is_main: bool,
    split: RootSplit,

    nodes: u64,
    nodes_batch: u64,
    node_batch_size: u64,
    seldepth: i32,

    key_stack: [u64; MAX_PLY + 4],
    key_ply: usize,
    static_evals: [Score; MAX_PLY],
}

impl<'a> Search<'a> {
    /// Constructs a new [`Search`].
    ///
    /// `is_main` marks the one thread per `think` that owns the clock and
    /// telemetry; all others follow the shared stop flag.
    pub fn new(
        searcher: &'a mut Searcher,
        ttable: &'a TranspositionTable,
        stop: &'a AtomicBool,
        global_nodes: &'a AtomicU64,
        config: SearchConfig,
        is_main: bool,
        split: RootSplit,
    ) -> Self {
        let node_batch_size = if is_main {
            tune::node_batch_main!()
        } else {
            tune::node_batch_worker!()
        };

        Self {
            searcher,
            ttable,
            stop,
            global_nodes,
            config,
            is_main,
            split,
            nodes: 0,
            nodes_batch: 0,
            node_batch_size,
            seldepth: 0,
            key_stack: [0; MAX_PLY + 4],
            key_ply: 0,
            static_evals: [Score::ALPHA; MAX_PLY],
        }
    }

    /// Runs iterative deepening on `pos`, returning the best result found.
    pub fn think(mut self, pos: &mut Position) -> SearchResult {
        self.key_ply = 0;
        self.key_stack[self.key_ply] = pos.key().inner();
        self.key_ply += 1;
        self.static_evals = [Score::ALPHA; MAX_PLY];

        let mut result = SearchResult::default();

        let mut root_moves = generate_legal(pos);
        if root_moves.is_empty() {
            self.flush_nodes();
            return result;
        }

        let mut best_move = root_moves[0];
        let mut best_score = Score::ALPHA;
        let mut root_pv = PrincipalVariation::default();

        // Even a search cancelled before depth 1 completes must hand back a
        // legal move.
        result.bestmove = Some(best_move);

        let mut prev_iter_score = Score::DRAW;
        let mut soft_prev_best = Move::NULL;
        let mut soft_stable_iters = 0;

        for depth in 1..=self.config.max_depth {
            if self.stop_or_hard_timeout() {
                break;
            }

            // Hoist the previous best to the front, then partially sort the
            // next several root moves by their ordering score.
            if let Some(i) = root_moves.iter().position(|&m| m == best_move) {
                root_moves.swap(0, i);
            }
            self.order_root_moves(pos, &mut root_moves, best_move);

            /*
             * Aspiration window: search in a band around the previous score
             * and widen to the full window only when it fails. Workers get
             * wider, jittered bands so overlapping threads diverge.
             */
            let use_asp =
                depth >= tune::min_asp_depth!() && best_score.abs() < Score::INF.abs() / 2;
            let mut asp = tune::asp_window_base!();
            let swing = (best_score - prev_iter_score).abs().inner() as i32;
            asp += (swing / tune::asp_window_swing_divisor!()).min(tune::asp_window_swing_cap!());
            if !self.is_main {
                asp += tune::worker_asp_extra!() + (((self.searcher.thread_index & 7) as i32) << 2);
            }

            let (mut alpha, mut beta) = if use_asp {
                (
                    best_score - asp as i16,
                    best_score + asp as i16,
                )
            } else {
                (Score::ALPHA, Score::BETA)
            };

            let mut iter_best_move = best_move;
            let mut iter_best_score = best_score;
            let mut iter_pv = PrincipalVariation::default();
            let mut iter_asp_failed = false;

            let mut ok = self.root_search(
                pos,
                &root_moves,
                depth,
                alpha,
                beta,
                &mut iter_best_move,
                &mut iter_best_score,
                &mut iter_pv,
            );
            if !ok {
                break;
            }

            if use_asp && (iter_best_score <= alpha || iter_best_score >= beta) {
                iter_asp_failed = true;
                // Only the main thread pays for the full-window redo.
                if self.is_main {
                    alpha = Score::ALPHA;
                    beta = Score::BETA;
                    ok = self.root_search(
                        pos,
                        &root_moves,
                        depth,
                        alpha,
                        beta,
                        &mut iter_best_move,
                        &mut iter_best_score,
                        &mut iter_pv,
                    );
                    if !ok {
                        break;
                    }
                }
            }

            // A stub PV at high depth gets one full-window confirmation pass
            // on the best move so the GUI sees a usable line.
            if self.is_main
                && !iter_best_move.is_null()
                && depth >= tune::pv_confirm_min_depth!()
                && iter_pv.len() < tune::pv_confirm_min_len!()
                && !self.stop_or_hard_timeout()
            {
                self.reconfirm_pv(pos, depth, iter_best_move, &mut iter_best_score, &mut iter_pv);
            }

            prev_iter_score = best_score;
            best_move = iter_best_move;
            best_score = iter_best_score;
            root_pv = iter_pv;

            if best_move == soft_prev_best {
                soft_stable_iters += 1;
            } else {
                soft_prev_best = best_move;
                soft_stable_iters = 0;
            }

            result.depth = depth;
            result.bestmove = Some(best_move);
            result.score = best_score;
            result.pv = sanitize_pv(pos, &root_pv);

            if self.is_main {
                self.send_iteration_info(&result);
            }

            /*
             * Soft time budget: stop deepening only once the best move has
             * held steady and this iteration's window did not fail.
             */
            if self.soft_timeout_elapsed() {
                let deep_enough = depth >= tune::soft_stop_min_depth!();
                let stable_enough = soft_stable_iters >= tune::soft_stop_stable_iters!();
                if deep_enough && stable_enough && !iter_asp_failed {
                    break;
                }
            }
        }

        self.flush_nodes();

        result.nodes = self.nodes;
        result.ponder = result.pv.get(1);
        result
    }

    /// Searches all root moves at `depth`, PVS-style, honoring this
    /// thread's root striping. Returns `false` if the iteration was cut
    /// short and its result must not be trusted.
    #[allow(clippy::too_many_arguments)]
    fn root_search(
        &mut self,
        pos: &mut Position,
        root_moves: &MoveList,
        depth: i32,
        alpha: Score,
        beta: Score,
        out_best_move: &mut Move,
        out_best_score: &mut Score,
        out_pv: &mut PrincipalVariation,
    ) -> bool {
        let mut cur_alpha = alpha;

        let mut iter_best_move = Move::NULL;
        let mut iter_best_score = Score::ALPHA;
        let mut iter_pv = PrincipalVariation::default();

        let (split_offset, split_stride) = self.split;
        let split_active =
            !self.is_main && split_stride > 1 && root_moves.len() >= split_stride;

        let mut searched = 0;

        for (i, &mv) in root_moves.iter().enumerate() {
            if split_active && i % split_stride != split_offset {
                continue;
            }
            if self.stop_or_hard_timeout() {
                return false;
            }

            let is_cap = pos.is_capture(mv);
            let is_promo = mv.is_promotion();

            let undo = pos.do_move(mv);
            searched += 1;

            // Late root quiets get a small reduction, but never checks.
            let mut gives_check = false;
            if depth >= 6 && i >= 4 {
                gives_check = in_check(pos, pos.side_to_move());
            }

            let mut reduction = 0;
            if !is_cap && !is_promo && !gives_check && depth >= 6 && i >= 4 {
                reduction = 1;
                if depth >= 10 && i >= 10 {
                    reduction = 2;
                }
                reduction = reduction.min(depth - 2);
            }

            let prev = Some((mv.from(), mv.to()));
            let last_to = Some(mv.to());
            let mut child_pv = PrincipalVariation::default();

            let mut score;
            if searched == 1 {
                score = -self.negamax(
                    pos,
                    depth - 1,
                    -beta,
                    -cur_alpha,
                    1,
                    prev,
                    last_to,
                    is_cap,
                    &mut child_pv,
                );
            } else {
                let reduced = (depth - 1 - reduction).max(0);
                score = -self.negamax(
                    pos,
                    reduced,
                    -cur_alpha - 1,
                    -cur_alpha,
                    1,
                    prev,
                    last_to,
                    is_cap,
                    &mut child_pv,
                );

                if score > cur_alpha && score < beta {
                    let mut repv = PrincipalVariation::default();
                    score = -self.negamax(
                        pos,
                        depth - 1,
                        -beta,
                        -cur_alpha,
                        1,
                        prev,
                        last_to,
                        is_cap,
                        &mut repv,
                    );
                    child_pv = repv;
                }
            }

            pos.undo_move(mv, &undo);

            if self.stop_or_hard_timeout() {
                return false;
            }

            if score > iter_best_score {
                iter_best_score = score;
                iter_best_move = mv;
                iter_pv.load(mv, &child_pv);
            }

            if score > cur_alpha {
                cur_alpha = score;
            }
            if cur_alpha >= beta {
                break;
            }
        }

        if searched == 0 {
            return false;
        }

        *out_best_move = iter_best_move;
        *out_best_score = iter_best_score;
        *out_pv = iter_pv;
        true
    }

    /// Re-searches the chosen root move with a full window to rebuild a
    /// longer PV.
    fn reconfirm_pv(
        &mut self,
        pos: &mut Position,
        depth: i32,
        best_move: Move,
        best_score: &mut Score,
        pv: &mut PrincipalVariation,
    ) {
        let is_cap = pos.is_capture(best_move);
        let prev = Some((best_move.from(), best_move.to()));
        let last_to = Some(best_move.to());

        let undo = pos.do_move(best_move);
        let mut child_pv = PrincipalVariation::default();
        let score = -self.negamax(
            pos,
            depth - 1,
            Score::ALPHA,
            Score::BETA,
            1,
            prev,
            last_to,
            is_cap,
            &mut child_pv,
        );
        pos.undo_move(best_move, &undo);

        if !self.stop_or_hard_timeout() {
            *best_score = score;
            pv.load(best_move, &child_pv);
        }
    }

    /// The main recursive search.
    ///
    /// Termination paths that must not pollute the repetition stack (stop,
    /// ply cap, horizon, mate-distance, repetition) live here; everything
    /// from the TT probe onward is in [`Search::negamax_inner`], bracketed
    /// by a push/pop of the current key.
    #[allow(clippy::too_many_arguments)]
    fn negamax(
        &mut self,
        pos: &mut Position,
        depth: i32,
        mut alpha: Score,
        mut beta: Score,
        ply: i32,
        prev: Option<(Square, Square)>,
        last_to: Option<Square>,
        last_was_cap: bool,
        pv: &mut PrincipalVariation,
    ) -> Score {
        pv.clear();

        if self.stopped() {
            return alpha;
        }

        self.add_node();
        self.seldepth = self.seldepth.max(ply);

        if ply >= MAX_PLY as i32 - 2 {
            return evaluate(pos);
        }

        if depth <= 0 {
            return self.qsearch(pos, alpha, beta, ply, last_to, last_was_cap);
        }

        // Mate distance pruning: no line from here can beat a mate already
        // proven closer to the root.
        alpha = alpha.max(-Score::MATE + ply as i16);
        beta = beta.min(Score::MATE - ply as i16 - 1);
        if alpha >= beta {
            return alpha;
        }

        // Repetition with any ancestor of the same side to move is a draw.
        let key = pos.key();
        if ply > 0 {
            let mut i = self.key_ply as i32 - 2;
            while i >= 0 {
                if self.key_stack[i as usize] == key.inner() {
                    return Score::DRAW;
                }
                i -= 2;
            }
        }

        self.key_stack[self.key_ply] = key.inner();
        self.key_ply += 1;

        let score = self.negamax_inner(pos, depth, alpha, beta, ply, prev, last_to, last_was_cap, pv);

        self.key_ply -= 1;
        score
    }

    #[allow(clippy::too_many_arguments)]
    fn negamax_inner(
        &mut self,
        pos: &mut Position,
        mut depth: i32,
        mut alpha: Score,
        beta: Score,
        ply: i32,
        prev: Option<(Square, Square)>,
        _last_to: Option<Square>,
        _last_was_cap: bool,
        pv: &mut PrincipalVariation,
    ) -> Score {
        let us = pos.side_to_move();
        let key = pos.key();
        let is_pv = (beta - alpha) > 1;

        /*
         * Transposition table probe. A deep-enough entry can end the node
         * outright; at PV nodes only exact entries may cut, so the PV is
         * never truncated by a bound from a narrower window.
         */
        let mut tt_move = Move::NULL;
        if let Some(hit) = self.ttable.probe(key, ply) {
            tt_move = hit.mv;

            if hit.depth >= depth {
                let cut = match hit.bound {
                    Bound::Exact => Some(hit.score),
                    Bound::Alpha if !is_pv && hit.score <= alpha => Some(alpha),
                    Bound::Beta if !is_pv && hit.score >= beta => Some(beta),
                    _ => None,
                };

                if let Some(score) = cut {
                    if !tt_move.is_null() && self.move_is_legal_here(pos, tt_move) {
                        pv.load(tt_move, &PrincipalVariation::default());
                    }
                    return score;
                }
            }
        }

        let in_check_now = in_check(pos, us);
        if in_check_now {
            depth += 1;
        }

        let static_eval = if in_check_now {
            Score::ALPHA
        } else {
            evaluate(pos)
        };
        self.static_evals[(ply as usize).min(MAX_PLY - 1)] = static_eval;
        let improving = ply >= 2
            && static_eval > self.static_evals[(ply as usize - 2).min(MAX_PLY - 1)];

        /*
         * Razoring: hopeless static evals at the shallowest depths drop
         * straight into quiescence.
         */
        if !in_check_now && !is_pv && ply > 0 && depth <= tune::max_razor_depth!() {
            let mut margin = if depth == 1 {
                tune::razor_margin_shallow!()
            } else {
                tune::razor_margin_deep!()
            };
            if improving {
                margin += tune::razor_improving_extra!();
            }
            if static_eval + margin as i16 <= alpha {
                return self.qsearch(pos, alpha, beta, ply, _last_to, _last_was_cap);
            }
        }

        /*
         * Reverse futility: a static eval comfortably above beta at shallow
         * depth fails high without searching.
         */
        if !in_check_now && !is_pv && ply > 0 && depth <= tune::max_rfp_depth!() {
            let mut margin = tune::rfp_margin_base!() + tune::rfp_margin_per_depth!() * depth;
            if improving {
                margin -= tune::rfp_improving_rebate!();
            }
            if static_eval - margin as i16 >= beta {
                return beta;
            }
        }

        // Internal iterative reduction: with no TT move to order by, a
        // shallower search amortizes the ordering cost.
        if tt_move.is_null() && depth >= tune::min_iir_depth!() {
            depth -= 1;
        }

        /*
         * Null move pruning: hand the opponent a free tempo at reduced
         * depth; if the position still fails high, this node is safe to cut.
         * Unsound in zugzwang, so pawn-and-king-only positions skip it.
         */
        if !in_check_now
            && ply > 0
            && depth >= tune::min_nmp_depth!()
            && pos.has_non_pawn_material(us)
            && beta < Score::MATE - 256
            && alpha > -Score::MATE + 256
        {
            let reduction =
                (tune::nmp_base_reduction!() + depth / tune::nmp_depth_divisor!()).min(depth - 1);

            let undo = pos.do_null_move();
            let mut null_pv = PrincipalVariation::default();
            let score = -self.negamax(
                pos,
                depth - 1 - reduction,
                -beta,
                -beta + 1,
                ply + 1,
                None,
                None,
                false,
                &mut null_pv,
            );
            pos.undo_null_move(&undo);

            if self.stopped() {
                return alpha;
            }
            if score >= beta {
                return beta;
            }
        }

        let moves = generate_pseudo_legal(pos);
        if moves.is_empty() {
            return if in_check_now { -Score::MATE + ply as i16 } else { Score::DRAW };
        }

        let mut scores: ArrayVec<i32, { crate::MAX_MOVES }> = ArrayVec::new();
        for &mv in &moves {
            scores.push(self.move_score(pos, mv, tt_move, ply, prev));
        }

        let mut order: ArrayVec<usize, { crate::MAX_MOVES }> = (0..moves.len()).collect();
        partial_sort_by_scores(&mut order, &scores, tune::order_top_k!());

        let mut best_score = Score::ALPHA;
        let mut best_move = Move::NULL;
        let mut best_child = PrincipalVariation::default();
        let original_alpha = alpha;

        let mut legal_searched = 0usize;
        let mut quiets_searched = 0usize;

        for &oi in &order {
            if self.stopped() {
                return alpha;
            }

            let mv = moves[oi];

            // The generator leaves the attacked-path rule to its callers;
            // a castle must pass it before being made, since the make/
            // test-check filter below only sees the king's landing square.
            if mv.is_castle() && !legal_castle_path_ok(pos, mv) {
                continue;
            }

            let is_cap = pos.is_capture(mv);
            let is_promo = mv.is_promotion();
            let is_quiet = !is_cap && !is_promo;

            /*
             * Shallow futility: a quiet move cannot lift a bad static eval
             * over alpha at the lowest depths.
             */
            if !in_check_now && is_quiet && !is_pv && depth <= 2 && mv != tt_move {
                let margin = if depth == 1 {
                    tune::futility_margin_shallow!()
                } else {
                    tune::futility_margin_deep!()
                };
                if static_eval + margin as i16 <= alpha {
                    continue;
                }
            }

            // Late move pruning: cap the quiets tried at shallow depth.
            if !in_check_now && is_quiet && !is_pv && depth <= 2 && mv != tt_move {
                let limit = if depth == 1 {
                    tune::lmp_limit_shallow!()
                } else {
                    tune::lmp_limit_deep!()
                };
                if quiets_searched >= limit {
                    continue;
                }
            }

            // Shallow losing captures are pruned on SEE, with the full
            // swap-off confirming the deeply negative ones.
            if !in_check_now
                && is_cap
                && !is_promo
                && depth <= tune::max_cap_see_depth!()
                && mv != tt_move
            {
                let quick = see_quick(pos, mv);
                if quick < tune::cap_see_full_trigger!() {
                    if see_full(pos, mv) < tune::cap_see_margin!() {
                        continue;
                    }
                } else if quick < tune::cap_see_margin!() {
                    continue;
                }
            }

            let undo = pos.do_move(mv);
            if in_check(pos, us) {
                pos.undo_move(mv, &undo);
                continue;
            }

            legal_searched += 1;
            if is_quiet {
                quiets_searched += 1;
            }

            let next_prev = Some((mv.from(), mv.to()));
            let next_last_to = Some(mv.to());

            let mut child_pv = PrincipalVariation::default();
            let mut score;

            if legal_searched == 1 {
                score = -self.negamax(
                    pos,
                    depth - 1,
                    -beta,
                    -alpha,
                    ply + 1,
                    next_prev,
                    next_last_to,
                    is_cap,
                    &mut child_pv,
                );
            } else {
                /*
                 * Late move reductions: trusting the ordering, later quiets
                 * are searched shallower with a null window, and re-searched
                 * at full depth (and then full window) only when they raise
                 * alpha anyway.
                 */
                let mut reduction = 0;
                if depth >= tune::min_lmr_depth!() && !in_check_now && is_quiet {
                    reduction = 1;
                    if legal_searched > 4 {
                        reduction += 1;
                    }
                    if legal_searched > 10 {
                        reduction += 1;
                    }
                    if depth >= 7 && legal_searched > 14 {
                        reduction += 1;
                    }

                    let history = self.searcher.history.get(us, mv) / 2;
                    if history < tune::lmr_history_low!() {
                        reduction += 1;
                    }
                    if history > tune::lmr_history_high!() {
                        reduction -= 1;
                    }

                    if improving {
                        reduction -= 1;
                    }
                    if is_pv {
                        reduction -= 1;
                    }

                    reduction = reduction.clamp(0, depth - 2);
                }

                let reduced = (depth - 1 - reduction).max(0);
                score = -self.negamax(
                    pos,
                    reduced,
                    -alpha - 1,
                    -alpha,
                    ply + 1,
                    next_prev,
                    next_last_to,
                    is_cap,
                    &mut child_pv,
                );

                if score > alpha && reduction > 0 && reduced != depth - 1 {
                    let mut repv = PrincipalVariation::default();
                    score = -self.negamax(
                        pos,
                        depth - 1,
                        -alpha - 1,
                        -alpha,
                        ply + 1,
                        next_prev,
                        next_last_to,
                        is_cap,
                        &mut repv,
                    );
                    child_pv = repv;
                }

                if score > alpha && score < beta {
                    let mut repv = PrincipalVariation::default();
                    score = -self.negamax(
                        pos,
                        depth - 1,
                        -beta,
                        -alpha,
                        ply + 1,
                        next_prev,
                        next_last_to,
                        is_cap,
                        &mut repv,
                    );
                    child_pv = repv;
                }
            }

            pos.undo_move(mv, &undo);

            if self.stopped() {
                return alpha;
            }

            if score > best_score {
                best_score = score;
                best_move = mv;
                best_child = child_pv;
            }

            if score > alpha {
                alpha = score;
            }

            if alpha >= beta {
                /*
                 * A quiet refutation is worth remembering: killers for this
                 * ply, gravity history (with a penalty sweep over the quiets
                 * that failed to cut), the countermove slot, and the
                 * continuation history keyed by the previous move.
                 */
                if is_quiet {
                    self.searcher.killers.insert(ply, mv);

                    let bonus =
                        tune::history_multiplier!() * depth - tune::history_offset!();
                    self.searcher.history.update(us, mv, bonus);

                    for &pi in order.iter().take_while(|&&p| p != oi) {
                        let prior = moves[pi];
                        if !pos.is_capture(prior) && !prior.is_promotion() {
                            self.searcher.history.update(us, prior, -bonus);
                        }
                    }

                    if let Some(prev_mv) = prev {
                        self.searcher.countermoves.insert(prev_mv, mv);
                        self.searcher.cont_hist.update(us, prev_mv, mv, bonus);
                    }
                }
                break;
            }
        }

        if legal_searched == 0 {
            return if in_check_now { -Score::MATE + ply as i16 } else { Score::DRAW };
        }

        pv.load(best_move, &best_child);

        let bound = Bound::classify(best_score, original_alpha, beta);
        self.ttable.store(key, best_move, best_score, depth, bound, ply);

        best_score
    }

    /// Quiescence search: captures, promotions, and a couple of plies of
    /// quiet checks, under delta and SEE pruning.
    fn qsearch(
        &mut self,
        pos: &mut Position,
        mut alpha: Score,
        beta: Score,
        ply: i32,
        last_to: Option<Square>,
        last_was_cap: bool,
    ) -> Score {
        self.add_node();
        self.seldepth = self.seldepth.max(ply);

        let us = pos.side_to_move();
        let checked = in_check(pos, us);

        if ply >= MAX_PLY as i32 - 2 {
            return evaluate(pos);
        }

        // In check there is no standing pat; every evasion gets a look.
        let mut stand = Score::ALPHA;
        if !checked {
            stand = evaluate(pos);
            if stand >= beta {
                return beta;
            }
            if stand > alpha {
                alpha = stand;
            }
        }

        let moves = generate_pseudo_legal(pos);

        struct Candidate {
            mv: Move,
            key: i32,
            cap: bool,
            promo: bool,
        }

        let mut list: ArrayVec<Candidate, { crate::MAX_MOVES }> = ArrayVec::new();

        for &mv in &moves {
            if mv.is_castle() {
                continue;
            }

            let promo = mv.is_promotion();
            let cap = pos.is_capture(mv);

            let quiet_candidate =
                !checked && !cap && !promo && ply < tune::qs_quiet_check_max_ply!();
            if !checked && !(cap || promo || quiet_candidate) {
                continue;
            }

            let mut gain = 0;
            if cap {
                gain += if mv.is_en_passant() {
                    crate::MG_VALUE[PieceKind::Pawn.index()]
                } else {
                    match pos.board()[mv.to()].kind() {
                        Some(kind) => crate::MG_VALUE[kind.index()],
                        None => 0,
                    }
                };
            }
            if promo {
                let new_value = match mv.promo_kind() {
                    Some(kind) => crate::MG_VALUE[kind.index()],
                    None => 0,
                };
                gain += new_value - crate::MG_VALUE[PieceKind::Pawn.index()];
            }

            /*
             * Delta pruning: even winning this material outright cannot
             * lift the stand-pat score over alpha. `gain` already folds in
             * the promotion upgrade, so promotions take the same path; the
             * quick-SEE cut escalates to the full swap-off for promotions
             * and rook-or-better victims.
             */
            if !checked && (cap || promo) {
                if stand + (gain + tune::qs_delta_margin!()) as i16 <= alpha {
                    continue;
                }

                let quick = see_quick(pos, mv);
                let big_victim = promo
                    || (!mv.is_en_passant()
                        && matches!(
                            pos.board()[mv.to()].kind(),
                            Some(PieceKind::Rook) | Some(PieceKind::Queen)
                        ));
                if quick <= tune::qs_see_full_trigger!() && big_victim {
                    if see_full(pos, mv) < tune::qs_see_margin!() {
                        continue;
                    }
                } else if quick < tune::qs_see_margin!() {
                    continue;
                }
            }

            if quiet_candidate && stand + tune::qs_quiet_margin!() < alpha {
                continue;
            }

            let mut key = 0;
            if promo {
                key += 400_000;
            }
            if cap {
                key += 80_000;
            }
            key += gain * 300;

            // Recapturing on the square just captured on resolves the
            // exchange first.
            if last_was_cap && cap && last_to == Some(mv.to()) {
                key += 220_000;
            }

            list.push(Candidate {
                mv,
                key,
                cap,
                promo,
            });
        }

        if list.is_empty() {
            if checked {
                return -Score::MATE + ply as i16;
            }
            return alpha;
        }

        list.sort_unstable_by_key(|c| -c.key);

        for candidate in &list {
            let mv = candidate.mv;

            let undo = pos.do_move(mv);
            if in_check(pos, us) {
                pos.undo_move(mv, &undo);
                continue;
            }

            let gives_check = in_check(pos, pos.side_to_move());
            if !checked && !(candidate.cap || candidate.promo || gives_check) {
                pos.undo_move(mv, &undo);
                continue;
            }

            let score = -self.qsearch(
                pos,
                -beta,
                -alpha,
                ply + 1,
                Some(mv.to()),
                candidate.cap,
            );

            pos.undo_move(mv, &undo);

            if score >= beta {
                return beta;
            }
            if score > alpha {
                alpha = score;
            }
        }

        alpha
    }

    /// Scores a move for ordering. Bigger is better.
    fn move_score(
        &self,
        pos: &Position,
        mv: Move,
        tt_move: Move,
        ply: i32,
        prev: Option<(Square, Square)>,
    ) -> i32 {
        if !mv.is_null() && mv == tt_move {
            return i32::MAX;
        }

        let from = mv.from();
        let to = mv.to();
        let mover = pos.board()[from];
        let us = pos.side_to_move();

        let mut score = 0;

        if mv.is_promotion() {
            score += 90_000_000;
        }
        if mv.is_castle() {
            score += 30_000_000;
        }

        if pos.is_capture(mv) {
            score += 50_000_000;

            let victim = if mv.is_en_passant() {
                crate::Piece::new(us.opponent(), PieceKind::Pawn)
            } else {
                pos.board()[to]
            };

            let mut see = see_quick(pos, mv);
            if mv.is_promotion() || see < -250 {
                see = see_full(pos, mv);
            }
            score += see.clamp(-500, 500) * 8000;

            score += mvv_lva(victim, mover) * 200;
            return score;
        }

        if mv == self.searcher.killers.first(ply) {
            score += 20_000_000;
        } else if mv == self.searcher.killers.second(ply) {
            score += 15_000_000;
        }

        score += self.searcher.history.get(us, mv) / 2;

        if let Some(prev_mv) = prev {
            if mv == self.searcher.countermoves.get(prev_mv) {
                score += 18_000_000;
            }
            score += self.searcher.cont_hist.get(us, prev_mv, mv);
        }

        // Development nudges and an early-king-walk deterrent.
        match mover.kind() {
            Some(PieceKind::Bishop) => score += 2000,
            Some(PieceKind::Knight) => score += 1000,
            Some(PieceKind::King) if !mv.is_castle() => {
                score -= if ply < 12 { 8_000_000 } else { 800_000 };
            }
            _ => {}
        }

        if ply < 4 && mover.is_kind(PieceKind::Pawn) && !mv.is_promotion() {
            match (from, to) {
                (Square::E2, Square::E4)
                | (Square::D2, Square::D4)
                | (Square::E7, Square::E5)
                | (Square::D7, Square::D5) => score += 12_000,
                (Square::C2, Square::C4) | (Square::C7, Square::C5) => score += 7_000,
                _ => {}
            }
        }

        score
    }

    /// Scores and partially sorts the root move list for this iteration,
    /// leaving the hoisted previous best in front.
    fn order_root_moves(&self, pos: &Position, root_moves: &mut MoveList, best_move: Move) {
        let mut scores: ArrayVec<i32, { crate::MAX_MOVES }> = ArrayVec::new();
        for &mv in root_moves.iter() {
            scores.push(self.move_score(pos, mv, best_move, 0, None));
        }

        let k = tune::root_order_k!().min(root_moves.len());
        for i in 0..k {
            let mut best_i = i;
            for j in (i + 1)..root_moves.len() {
                if scores[j] > scores[best_i] {
                    best_i = j;
                }
            }
            if best_i != i {
                root_moves.swap(i, best_i);
                scores.swap(i, best_i);
            }
        }
    }

    /// Basic sanity plus a full make/unmake legality check, for moves that
    /// arrive from the TT rather than the generator.
    fn move_is_legal_here(&self, pos: &Position, mv: Move) -> bool {
        if mv.is_null() {
            return false;
        }

        let mover = pos.board()[mv.from()];
        if !mover.is_color(pos.side_to_move()) {
            return false;
        }
        if !mv.is_en_passant() && pos.board()[mv.to()].is_color(pos.side_to_move()) {
            return false;
        }

        if mv.is_castle() && !legal_castle_path_ok(pos, mv) {
            return false;
        }

        let mut scratch = *pos;
        let us = scratch.side_to_move();
        scratch.do_move(mv);
        !in_check(&scratch, us)
    }

    /// Counts a node, periodically publishing to the shared counter and
    /// (on the main thread only) polling the wall clock.
    #[inline(always)]
    fn add_node(&mut self) {
        self.nodes += 1;
        self.nodes_batch += 1;

        if self.nodes_batch >= self.node_batch_size {
            self.flush_nodes();
            if self.is_main && self.config.starttime.elapsed() >= self.config.hard_timeout {
                self.stop.store(true, Ordering::Relaxed);
            }
        }
    }

    #[inline(always)]
    fn flush_nodes(&mut self) {
        if self.nodes_batch > 0 {
            self.global_nodes
                .fetch_add(self.nodes_batch, Ordering::Relaxed);
            self.nodes_batch = 0;
        }
    }

    /// Cheap cancellation check: the shared stop flag and node allowance.
    #[inline(always)]
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed) || self.nodes >= self.config.max_nodes
    }

    /// Cancellation check including a wall-clock read; main thread only,
    /// and only at the root where the cost is amortized.
    #[inline(always)]
    fn stop_or_hard_timeout(&mut self) -> bool {
        if self.stopped() {
            return true;
        }
        if self.is_main && self.config.starttime.elapsed() >= self.config.hard_timeout {
            self.stop.store(true, Ordering::Relaxed);
            return true;
        }
        false
    }

    #[inline(always)]
    fn soft_timeout_elapsed(&self) -> bool {
        self.is_main && self.config.starttime.elapsed() >= self.config.soft_timeout
    }

    /// Emits one `info` line for a completed iteration.
    fn send_iteration_info(&mut self, result: &SearchResult) {
        self.flush_nodes();

        let elapsed = self.config.starttime.elapsed();
        let all_nodes = self.global_nodes.load(Ordering::Relaxed);
        let nps = (all_nodes as f32 / elapsed.as_secs_f32().max(1e-6)).trunc();

        let info = UciInfo::new()
            .depth(result.depth)
            .seldepth(self.seldepth.max(1))
            .score(result.score.into_uci())
            .nodes(all_nodes)
            .nps(nps)
            .hashfull(self.ttable.hashfull())
            .time(elapsed.as_millis())
            .pv(result.pv.iter().map(|mv| mv.to_string()));

        let resp = UciResponse::info(info);
        println!("{resp}");
    }
}

/// MVV-LVA: most valuable victim first, least valuable attacker as the
/// tie-break.
#[inline(always)]
fn mvv_lva(victim: crate::Piece, attacker: crate::Piece) -> i32 {
    let victim_value = match victim.kind() {
        Some(PieceKind::King) | None => 0,
        Some(kind) => crate::MG_VALUE[kind.index()],
    };
    let attacker_value = match attacker.kind() {
        Some(PieceKind::King) | None => 0,
        Some(kind) => crate::MG_VALUE[kind.index()],
    };
    victim_value * 10 - attacker_value
}

/// Moves the `k` highest-scored indices to the front, best first.
///
/// The tail stays unsorted; beta cutoffs mean it is rarely visited.
fn partial_sort_by_scores(order: &mut [usize], scores: &[i32], k: usize) {
    let k = k.min(order.len());
    for i in 0..k {
        let mut best_i = i;
        for j in (i + 1)..order.len() {
            if scores[order[j]] > scores[order[best_i]] {
                best_i = j;
            }
        }
        if best_i != i {
            order.swap(i, best_i);
        }
    }
}

/// Walks `pv` from the root, keeping only the legal prefix.
///
/// Shared-table lines can splice moves from other threads' searches; the
/// emitted PV and the ponder move must both survive strict legality.
pub fn sanitize_pv(root: &Position, pv: &PrincipalVariation) -> PrincipalVariation {
    let mut out = PrincipalVariation::default();
    let mut pos = *root;

    for &mv in pv.iter() {
        if !crate::is_legal(&mut pos, mv) {
            break;
        }
        out.push(mv);
        pos.do_move(mv);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FEN_STARTPOS;

    fn run_search(fen: &str, config: SearchConfig) -> SearchResult {
        let mut searcher = Searcher::new(0);
        let ttable = TranspositionTable::new(4);
        let stop = AtomicBool::new(false);
        let nodes = AtomicU64::new(0);

        let mut pos = Position::from_fen(fen);
        Search::new(&mut searcher, &ttable, &stop, &nodes, config, false, (0, 1))
            .think(&mut pos)
    }

    fn depth_config(depth: i32) -> SearchConfig {
        SearchConfig {
            max_depth: depth,
            ..Default::default()
        }
    }

    #[test]
    fn test_mate_in_one() {
        let res = run_search("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", depth_config(3));
        assert_eq!(res.bestmove.unwrap(), "a1a8");
        assert!(res.score >= Score::MATE - 2, "score was {:?}", res.score);
    }

    #[test]
    fn test_smothered_mate_in_two() {
        // Philidor's legacy: 1.Qg8+ Rxg8 (forced; the knight guards g8)
        // 2.Nf7 smothered mate.
        let res = run_search("5r1k/6pp/7N/8/8/1Q6/8/6K1 w - - 0 1", depth_config(5));
        assert_eq!(res.bestmove.unwrap(), "b3g8");
        assert!(res.score >= Score::MATE - 4, "score was {:?}", res.score);
    }

    #[test]
    fn test_stalemate_scores_zero() {
        let res = run_search("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1", depth_config(4));
        assert!(res.bestmove.is_none());
        assert_eq!(res.score, Score::DRAW);
    }

    #[test]
    fn test_repeated_root_is_drawish() {
        // Shuffle the knights out and back twice; the root position has
        // occurred three times, so the search should see a dead draw.
        let mut pos = Position::from_fen(FEN_STARTPOS);
        for uci in [
            "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8",
        ] {
            let mv = Move::from_uci(&pos, uci).unwrap();
            pos.do_move(mv);
        }

        let mut searcher = Searcher::new(0);
        let ttable = TranspositionTable::new(4);
        let stop = AtomicBool::new(false);
        let nodes = AtomicU64::new(0);

        let res = Search::new(
            &mut searcher,
            &ttable,
            &stop,
            &nodes,
            depth_config(4),
            false,
            (0, 1),
        )
        .think(&mut pos);

        assert!(
            res.score.abs() <= Score::new(150),
            "shuffled startpos should stay near balance, got {:?}",
            res.score
        );
    }

    #[test]
    fn test_obvious_capture_promotion() {
        // The pawn should take the queen and promote.
        let res = run_search("3q1n2/4P3/8/8/8/8/k7/7K w - - 0 1", depth_config(2));
        assert_eq!(res.bestmove.unwrap(), "e7d8q");
    }

    #[test]
    fn test_non_root_node_rejects_castle_through_attacked_square() {
        // The d3 bishop covers f1 but not g1, so e1g1 is emitted by the
        // pseudo-legal generator, lands the king on a safe square, and is
        // only rejected by the attacked-path rule. The position is built so
        // that castling would even be checkmate (Rf1#; the bishop is pinned
        // by the c3 rook and cannot take the rook back): if a node below
        // the root ever searched it, the score would be a bogus mate.
        let mut searcher = Searcher::new(0);
        let ttable = TranspositionTable::new(1);
        let stop = AtomicBool::new(false);
        let nodes = AtomicU64::new(0);

        let mut pos = Position::from_fen("8/8/8/8/8/2Rb1kNP/3P3P/4K2R w K - 0 1");

        // The castle really is pseudo-legal here and really is path-illegal.
        assert!(generate_pseudo_legal(&pos).iter().any(|&m| m == "e1g1"));
        let illegal = Move::from_uci(&pos, "e1g1");
        assert!(illegal.is_err(), "e1g1 must not be legal in this position");

        let mut search = Search::new(
            &mut searcher,
            &ttable,
            &stop,
            &nodes,
            depth_config(2),
            false,
            (0, 1),
        );

        // Drive the node exactly as the search would one ply below a root.
        search.key_stack[0] = 0;
        search.key_ply = 1;
        let mut pv = PrincipalVariation::default();
        let score = search.negamax(
            &mut pos,
            2,
            Score::ALPHA,
            Score::BETA,
            1,
            None,
            None,
            false,
            &mut pv,
        );

        // No legal move mates in one here, so a mate score can only come
        // from the illegal castle.
        assert!(!score.is_mate(), "score {score:?} reflects the illegal castle");
        assert!(pv.iter().all(|&m| m != "e1g1"));

        // The stored best move for the node must itself be legal.
        let hit = ttable.probe(pos.key(), 1).unwrap();
        let mut check_pos = pos;
        assert!(crate::is_legal(&mut check_pos, hit.mv));
    }

    #[test]
    fn test_zero_time_still_finds_a_move() {
        let config = SearchConfig {
            soft_timeout: Duration::ZERO,
            hard_timeout: Duration::ZERO,
            ..Default::default()
        };

        let mut searcher = Searcher::new(0);
        let ttable = TranspositionTable::new(1);
        let stop = AtomicBool::new(false);
        let nodes = AtomicU64::new(0);

        let mut pos = Position::from_fen(FEN_STARTPOS);
        let res = Search::new(&mut searcher, &ttable, &stop, &nodes, config, true, (0, 1))
            .think(&mut pos);

        assert!(res.bestmove.is_some());
    }

    #[test]
    fn test_stop_flag_cancels() {
        let mut searcher = Searcher::new(0);
        let ttable = TranspositionTable::new(1);
        let stop = AtomicBool::new(true);
        let nodes = AtomicU64::new(0);

        let mut pos = Position::from_fen(FEN_STARTPOS);
        let res = Search::new(
            &mut searcher,
            &ttable,
            &stop,
            &nodes,
            SearchConfig::default(),
            false,
            (0, 1),
        )
        .think(&mut pos);

        // Even an immediate stop yields the first legal root move.
        assert!(res.bestmove.is_some());
    }

    #[test]
    fn test_deeper_search_prefers_center() {
        // Not a tactical position; just confirm a few iterations complete
        // and produce a sane PV.
        let res = run_search(FEN_STARTPOS, depth_config(5));
        assert_eq!(res.depth, 5);
        assert!(res.bestmove.is_some());
        assert!(!res.pv.is_empty());
        assert_eq!(res.pv.get(0), res.bestmove);
    }
}
