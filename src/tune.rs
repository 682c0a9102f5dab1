/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Every search margin, reduction, and threshold lives here, so tuning a
//! heuristic never means hunting through the search itself.

/// Base half-width of the aspiration window.
macro_rules! asp_window_base {
    () => {
        35
    };
}
pub(crate) use asp_window_base;

/// Cap on the score-swing contribution to the aspiration window.
macro_rules! asp_window_swing_cap {
    () => {
        64
    };
}
pub(crate) use asp_window_swing_cap;

/// Divisor applied to the previous iteration's score swing when widening.
macro_rules! asp_window_swing_divisor {
    () => {
        4
    };
}
pub(crate) use asp_window_swing_divisor;

/// Iterations below this depth search with a full window instead.
macro_rules! min_asp_depth {
    () => {
        6
    };
}
pub(crate) use min_asp_depth;

/// Extra window width for non-main workers, before the per-thread jitter.
macro_rules! worker_asp_extra {
    () => {
        24
    };
}
pub(crate) use worker_asp_extra;

/// Maximum depth at which razoring applies.
macro_rules! max_razor_depth {
    () => {
        2
    };
}
pub(crate) use max_razor_depth;

/// Razoring margin at depth 1.
macro_rules! razor_margin_shallow {
    () => {
        220
    };
}
pub(crate) use razor_margin_shallow;

/// Razoring margin at depth 2.
macro_rules! razor_margin_deep {
    () => {
        320
    };
}
pub(crate) use razor_margin_deep;

/// Extra razoring margin required when the static eval is improving.
macro_rules! razor_improving_extra {
    () => {
        60
    };
}
pub(crate) use razor_improving_extra;

/// Maximum depth at which reverse futility pruning applies.
macro_rules! max_rfp_depth {
    () => {
        3
    };
}
pub(crate) use max_rfp_depth;

/// Base reverse futility margin.
macro_rules! rfp_margin_base {
    () => {
        120
    };
}
pub(crate) use rfp_margin_base;

/// Per-depth reverse futility margin.
macro_rules! rfp_margin_per_depth {
    () => {
        90
    };
}
pub(crate) use rfp_margin_per_depth;

/// Margin rebate when the static eval is improving.
macro_rules! rfp_improving_rebate {
    () => {
        45
    };
}
pub(crate) use rfp_improving_rebate;

/// Minimum depth for internal iterative reduction when no TT move exists.
macro_rules! min_iir_depth {
    () => {
        6
    };
}
pub(crate) use min_iir_depth;

/// Minimum depth for null move pruning.
macro_rules! min_nmp_depth {
    () => {
        3
    };
}
pub(crate) use min_nmp_depth;

/// Base null move reduction.
macro_rules! nmp_base_reduction {
    () => {
        3
    };
}
pub(crate) use nmp_base_reduction;

/// Depth divisor feeding the null move reduction.
macro_rules! nmp_depth_divisor {
    () => {
        6
    };
}
pub(crate) use nmp_depth_divisor;

/// Futility margin for quiet moves at depth 1.
macro_rules! futility_margin_shallow {
    () => {
        190
    };
}
pub(crate) use futility_margin_shallow;

/// Futility margin for quiet moves at depth 2.
macro_rules! futility_margin_deep {
    () => {
        290
    };
}
pub(crate) use futility_margin_deep;

/// Quiet moves tried at depth 1 before late move pruning kicks in.
macro_rules! lmp_limit_shallow {
    () => {
        5
    };
}
pub(crate) use lmp_limit_shallow;

/// Quiet moves tried at depth 2 before late move pruning kicks in.
macro_rules! lmp_limit_deep {
    () => {
        8
    };
}
pub(crate) use lmp_limit_deep;

/// Maximum depth for shallow capture SEE pruning.
macro_rules! max_cap_see_depth {
    () => {
        4
    };
}
pub(crate) use max_cap_see_depth;

/// Quick-SEE score below which a shallow capture is pruned outright.
macro_rules! cap_see_margin {
    () => {
        -120
    };
}
pub(crate) use cap_see_margin;

/// Quick-SEE score below which the full swap-off confirms before pruning.
macro_rules! cap_see_full_trigger {
    () => {
        -200
    };
}
pub(crate) use cap_see_full_trigger;

/// Minimum depth for late move reductions.
macro_rules! min_lmr_depth {
    () => {
        3
    };
}
pub(crate) use min_lmr_depth;

/// History score below which a reduction deepens by one.
macro_rules! lmr_history_low {
    () => {
        1000
    };
}
pub(crate) use lmr_history_low;

/// History score above which a reduction shrinks by one.
macro_rules! lmr_history_high {
    () => {
        8000
    };
}
pub(crate) use lmr_history_high;

/// Multiplier for the depth-based history bonus.
macro_rules! history_multiplier {
    () => {
        300
    };
}
pub(crate) use history_multiplier;

/// Offset subtracted from the depth-based history bonus.
macro_rules! history_offset {
    () => {
        250
    };
}
pub(crate) use history_offset;

/// Saturation point of the history gravity formula.
macro_rules! max_history_bonus {
    () => {
        16_384
    };
}
pub(crate) use max_history_bonus;

/// Number of moves partially selection-sorted to the front at inner nodes.
macro_rules! order_top_k {
    () => {
        12
    };
}
pub(crate) use order_top_k;

/// Number of root moves partially selection-sorted each iteration.
macro_rules! root_order_k {
    () => {
        16
    };
}
pub(crate) use root_order_k;

/// Delta pruning margin in quiescence.
macro_rules! qs_delta_margin {
    () => {
        140
    };
}
pub(crate) use qs_delta_margin;

/// Quick-SEE score below which a quiescence capture is pruned.
macro_rules! qs_see_margin {
    () => {
        -120
    };
}
pub(crate) use qs_see_margin;

/// Quick-SEE score below which quiescence escalates to the full swap-off.
macro_rules! qs_see_full_trigger {
    () => {
        -240
    };
}
pub(crate) use qs_see_full_trigger;

/// Quiescence plies that may try quiet checking moves.
macro_rules! qs_quiet_check_max_ply {
    () => {
        2
    };
}
pub(crate) use qs_quiet_check_max_ply;

/// Margin below alpha at which quiet quiescence candidates are dropped.
macro_rules! qs_quiet_margin {
    () => {
        40
    };
}
pub(crate) use qs_quiet_margin;

/// Iterations the best move must hold steady before a soft-time stop.
macro_rules! soft_stop_stable_iters {
    () => {
        1
    };
}
pub(crate) use soft_stop_stable_iters;

/// Minimum completed depth before a soft-time stop.
macro_rules! soft_stop_min_depth {
    () => {
        8
    };
}
pub(crate) use soft_stop_min_depth;

/// Minimum depth before a short PV is re-confirmed with a full window.
macro_rules! pv_confirm_min_depth {
    () => {
        8
    };
}
pub(crate) use pv_confirm_min_depth;

/// PV length below which the re-confirmation search runs.
macro_rules! pv_confirm_min_len {
    () => {
        4
    };
}
pub(crate) use pv_confirm_min_len;

/// Node-count batch size for the main thread's global counter updates.
macro_rules! node_batch_main {
    () => {
        4096
    };
}
pub(crate) use node_batch_main;

/// Node-count batch size for worker threads' global counter updates.
macro_rules! node_batch_worker {
    () => {
        16_384
    };
}
pub(crate) use node_batch_worker;
