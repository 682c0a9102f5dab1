/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{sync::Arc, thread::JoinHandle, time::Duration};

use uci_parser::UciSearchOptions;

use crate::{Move, Pool, Position, SearchConfig, SearchResult};

/// The engine boundary consumed by a UCI front-end.
///
/// Owns the game position and the search [`Pool`]. The front-end parses
/// text into [`UciSearchOptions`] and calls [`Engine::go`]; formatting the
/// `bestmove` reply back into text is its job, not ours.
pub struct Engine {
    pos: Position,
    pool: Arc<Pool>,

    skill_level: u8,
    move_overhead: Duration,

    background: Option<JoinHandle<SearchResult>>,
    pondering: bool,
    last_ponder_move: Option<Move>,
}

impl Engine {
    /// Creates an engine at the standard starting position.
    pub fn new() -> Self {
        Self {
            pos: Position::startpos(),
            pool: Arc::new(Pool::new()),
            skill_level: 20,
            move_overhead: Duration::from_millis(10),
            background: None,
            pondering: false,
            last_ponder_move: None,
        }
    }

    /// Starts a new game: stops any search, resets the position, and clears
    /// the transposition table and all per-thread heuristics.
    pub fn new_game(&mut self) {
        self.stop();
        self.pos.set_startpos();
        self.pool.new_game();
        self.last_ponder_move = None;
    }

    /// Resizes the transposition table; ignored while a search is running.
    pub fn set_hash(&self, mb: usize) {
        self.pool.set_hash(mb);
    }

    /// Sets the number of search threads, clamped to `[1, 256]`.
    pub fn set_threads(&self, n: usize) {
        self.pool.set_threads(n);
    }

    /// Sets the skill level, clamped to `[0, 20]`. Levels below 20 cap the
    /// search depth and shrink the time budget in clock mode.
    pub fn set_skill_level(&mut self, level: u8) {
        self.skill_level = level.min(20);
    }

    /// Sets the per-move overhead reserved for transport latency.
    pub fn set_move_overhead(&mut self, overhead: Duration) {
        self.move_overhead = overhead;
    }

    /// Loads the standard starting position.
    pub fn set_startpos(&mut self) {
        self.pos.set_startpos();
    }

    /// Loads a FEN string; malformed fields fall back to defaults.
    pub fn set_fen(&mut self, fen: &str) {
        self.pos.set_fen(fen);
    }

    /// The current position.
    pub fn position(&self) -> &Position {
        &self.pos
    }

    /// Applies a UCI coordinate move if it is legal in the current
    /// position; unknown or illegal moves are ignored.
    pub fn push_uci_move(&mut self, uci: &str) {
        if let Ok(mv) = Move::from_uci(&self.pos, uci) {
            self.pos.do_move(mv);
        }
    }

    /// The expected reply stored by the most recent search, if any.
    pub fn get_last_ponder_move(&self) -> Option<Move> {
        self.last_ponder_move
    }

    /// Runs a search with the given options and returns the best move
    /// (null if the position has no legal moves).
    ///
    /// Precedence: ponder, then infinite, then movetime, then the clock,
    /// then a bare depth limit. `go ponder` starts a background infinite
    /// search and returns immediately with a null move; its result is
    /// harvested by [`Engine::stop`] or [`Engine::ponderhit`].
    pub fn go(&mut self, options: &UciSearchOptions) -> Move {
        // A new `go` supersedes whatever was running.
        self.stop();

        let depth_given = options.depth.is_some();
        let has_clock = options.wtime.is_some()
            || options.btime.is_some()
            || options.winc.is_some()
            || options.binc.is_some()
            || options.movestogo.is_some();

        let mut config = SearchConfig::new(options);

        if options.ponder {
            // Pondering is an infinite search stopped from outside.
            config.soft_timeout = Duration::MAX;
            config.hard_timeout = Duration::MAX;
            self.start_background(config);
            return Move::NULL;
        }

        if options.infinite {
            config.soft_timeout = Duration::MAX;
            config.hard_timeout = Duration::MAX;
        } else if options.movetime.is_none() && has_clock {
            let (time, inc) = if self.pos.side_to_move().is_white() {
                (options.wtime, options.winc)
            } else {
                (options.btime, options.binc)
            };

            let budget = self.allocate_time(
                time.unwrap_or(Duration::ZERO),
                inc.unwrap_or(Duration::ZERO),
                options.movestogo.unwrap_or(0),
            );
            config.set_movetime(budget);

            // Reduced skill plays shallower and faster, never deeper.
            if !depth_given && self.skill_level < 20 {
                let capped = 4 + self.skill_level as i32 / 2;
                config.max_depth = capped.clamp(1, 64);

                let factor = 40 + (self.skill_level as u32 * 50) / 19;
                config.set_movetime(budget * factor / 100);
            }
        }

        let result = self.pool.think(&self.pos, config);
        self.last_ponder_move = result.ponder;
        result.bestmove.unwrap_or(Move::NULL)
    }

    /// Signals any running search to stop, and joins a background (ponder)
    /// search if one exists, harvesting its result.
    pub fn stop(&mut self) {
        self.pool.stop();

        if let Some(handle) = self.background.take() {
            if let Ok(result) = handle.join() {
                self.last_ponder_move = result.ponder;
            }
            self.pondering = false;
        }
    }

    /// The opponent played the expected move while we were pondering.
    ///
    /// Minimal handling: finish the background search and keep its result.
    pub fn ponderhit(&mut self) {
        if self.pondering {
            self.stop();
        }
    }

    /// Time allocation for clock mode.
    ///
    /// Splits the remaining time by `movestogo` (or a fixed horizon), adds
    /// most of the increment, reserves the transport overhead, and never
    /// spends more than a healthy fraction of what is left.
    fn allocate_time(&self, time: Duration, inc: Duration, movestogo: u32) -> Duration {
        let time_ms = time.as_millis() as u64;
        if time_ms == 0 {
            return Duration::from_millis(1);
        }

        let overhead = self.move_overhead.as_millis() as u64;
        let left = time_ms.saturating_sub(overhead).max(1);

        // With almost no time left, just blitz moves out.
        if left <= 200 {
            return Duration::from_millis((left / 4).max(1));
        }

        let inc_part = inc.as_millis() as u64 * 85 / 100;

        let mut budget = if movestogo > 0 {
            let base = left / movestogo.max(1) as u64;
            (base + inc_part).min(left * 60 / 100)
        } else {
            (left / 30 + inc_part).min(left / 2)
        };

        budget = budget.max(5);
        if budget > 2 {
            budget -= 2;
        }
        Duration::from_millis(budget)
    }

    fn start_background(&mut self, config: SearchConfig) {
        let pool = Arc::clone(&self.pool);
        let pos = self.pos;

        self.background = Some(std::thread::spawn(move || pool.think(&pos, config)));
        self.pondering = true;
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth_options(depth: u32) -> UciSearchOptions {
        UciSearchOptions {
            depth: Some(depth),
            ..Default::default()
        }
    }

    #[test]
    fn test_go_depth_finds_mate() {
        let mut engine = Engine::new();
        engine.set_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");

        let best = engine.go(&depth_options(3));
        assert_eq!(best, "a1a8");
    }

    #[test]
    fn test_go_no_legal_moves_returns_null() {
        let mut engine = Engine::new();
        // Stalemate; Black to move.
        engine.set_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1");

        let best = engine.go(&depth_options(3));
        assert!(best.is_null());
    }

    #[test]
    fn test_push_uci_move() {
        let mut engine = Engine::new();
        engine.push_uci_move("e2e4");
        assert_eq!(
            engine.position().to_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );

        // Illegal and junk moves are ignored.
        engine.push_uci_move("e2e4");
        engine.push_uci_move("zzz");
        assert_eq!(
            engine.position().to_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1"
        );
    }

    #[test]
    fn test_new_game_resets_position() {
        let mut engine = Engine::new();
        engine.push_uci_move("e2e4");
        engine.new_game();
        assert_eq!(engine.position().to_fen(), crate::FEN_STARTPOS);
    }

    #[test]
    fn test_ponder_and_stop() {
        let mut engine = Engine::new();

        let options = UciSearchOptions {
            ponder: true,
            ..Default::default()
        };
        let best = engine.go(&options);
        assert!(best.is_null());

        // Let it chew briefly, then reel it back in.
        std::thread::sleep(Duration::from_millis(50));
        engine.stop();
        assert!(!engine.pondering);
    }

    #[test]
    fn test_time_allocation_is_bounded() {
        let engine = Engine::new();

        let budget = engine.allocate_time(Duration::from_secs(60), Duration::ZERO, 0);
        assert!(budget <= Duration::from_secs(30));
        assert!(budget >= Duration::from_millis(5));

        let scramble = engine.allocate_time(Duration::from_millis(100), Duration::ZERO, 0);
        assert!(scramble <= Duration::from_millis(100));
    }
}
