/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Mutex,
    },
    thread,
    time::Duration,
};

use crate::{Position, Search, SearchConfig, SearchResult, Searcher, TranspositionTable};

/// Maximum number of search threads.
pub const MAX_THREADS: usize = 256;

/// The Lazy SMP thread pool.
///
/// Owns the shared transposition table, the stop flag, the global node
/// counter, and one persistent [`Searcher`] per thread. Each `think` call
/// runs the main search on the calling thread and overlapping helper
/// searches on workers, all sharing the table.
pub struct Pool {
    ttable: TranspositionTable,
    stop: AtomicBool,
    global_nodes: AtomicU64,
    searchers: Mutex<Vec<Searcher>>,
    threads: AtomicUsize,
    searching: AtomicBool,
}

impl Pool {
    /// Creates a single-threaded pool with a default-sized table.
    pub fn new() -> Self {
        Self {
            ttable: TranspositionTable::default(),
            stop: AtomicBool::new(false),
            global_nodes: AtomicU64::new(0),
            searchers: Mutex::new(vec![Searcher::new(0)]),
            threads: AtomicUsize::new(1),
            searching: AtomicBool::new(false),
        }
    }

    /// The shared transposition table.
    #[inline(always)]
    pub fn ttable(&self) -> &TranspositionTable {
        &self.ttable
    }

    /// Number of threads configured.
    #[inline(always)]
    pub fn threads(&self) -> usize {
        self.threads.load(Ordering::Relaxed)
    }

    /// Returns `true` while a search is running.
    #[inline(always)]
    pub fn is_searching(&self) -> bool {
        self.searching.load(Ordering::Acquire)
    }

    /// Requests that any running search stop and return its best move.
    #[inline(always)]
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Sets the thread count, clamped to `[1, 256]`.
    ///
    /// Rebuilding the searchers is rejected while a search is running.
    pub fn set_threads(&self, n: usize) {
        if self.is_searching() {
            return;
        }

        let n = n.clamp(1, MAX_THREADS);
        let mut searchers = self.searchers.lock().unwrap();
        *searchers = (0..n).map(Searcher::new).collect();
        self.threads.store(n, Ordering::Relaxed);
    }

    /// Resizes the shared table; a no-op while a search is running.
    pub fn set_hash(&self, mb: usize) {
        if self.is_searching() {
            return;
        }
        self.ttable.resize(mb);
    }

    /// Clears the table and every thread's heuristic tables.
    pub fn new_game(&self) {
        if self.is_searching() {
            return;
        }
        self.ttable.clear();
        for searcher in self.searchers.lock().unwrap().iter_mut() {
            searcher.new_game();
        }
    }

    /// Caps the effective thread count by the time budget: short searches
    /// cannot amortize the startup and duplicated work of many threads.
    fn effective_threads(&self, config: &SearchConfig) -> usize {
        let configured = self.threads();
        if config.hard_timeout == Duration::MAX {
            return configured;
        }

        let ms = config.hard_timeout.as_millis();
        let cap = if ms <= 1200 {
            1
        } else if ms <= 2500 {
            2
        } else if ms <= 5000 {
            4
        } else if ms <= 12_000 {
            8
        } else {
            MAX_THREADS
        };

        configured.min(cap)
    }

    /// Runs a search on `pos` with up to the configured thread count.
    ///
    /// The calling thread is the main thread: it reads the clock, emits
    /// `info`, and its result is the one returned. Workers search copies of
    /// the position with striped root moves and stop when the main thread
    /// finishes.
    pub fn think(&self, pos: &Position, config: SearchConfig) -> SearchResult {
        self.searching.store(true, Ordering::Release);
        self.stop.store(false, Ordering::Relaxed);
        self.global_nodes.store(0, Ordering::Relaxed);

        let n = self.effective_threads(&config);

        let mut guard = self.searchers.lock().unwrap();
        let n = n.min(guard.len()).max(1);
        let (main, workers) = guard.split_at_mut(1);

        let mut result = thread::scope(|scope| {
            for (i, searcher) in workers.iter_mut().take(n - 1).enumerate() {
                let mut worker_pos = *pos;
                let split = (i + 1, n);
                scope.spawn(move || {
                    let search = Search::new(
                        searcher,
                        &self.ttable,
                        &self.stop,
                        &self.global_nodes,
                        config,
                        false,
                        split,
                    );
                    search.think(&mut worker_pos);
                });
            }

            let mut main_pos = *pos;
            let search = Search::new(
                &mut main[0],
                &self.ttable,
                &self.stop,
                &self.global_nodes,
                config,
                true,
                (0, 1),
            );
            let result = search.think(&mut main_pos);

            // The main thread is done; workers must wind down before the
            // scope closes.
            self.stop.store(true, Ordering::Relaxed);

            result
        });

        result.nodes = self.global_nodes.load(Ordering::Relaxed);

        self.searching.store(false, Ordering::Release);
        result
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Score, FEN_STARTPOS};

    #[test]
    fn test_single_thread_think() {
        let pool = Pool::new();
        let pos = Position::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1");

        let config = SearchConfig {
            max_depth: 3,
            ..Default::default()
        };

        let res = pool.think(&pos, config);
        assert_eq!(res.bestmove.unwrap(), "a1a8");
        assert!(res.score >= Score::MATE - 2);
        assert!(res.nodes > 0);
    }

    #[test]
    fn test_multi_thread_think() {
        let pool = Pool::new();
        pool.set_threads(4);
        assert_eq!(pool.threads(), 4);

        let pos = Position::from_fen(FEN_STARTPOS);
        let config = SearchConfig {
            max_depth: 5,
            ..Default::default()
        };

        let res = pool.think(&pos, config);
        assert!(res.bestmove.is_some());
        assert!(res.nodes > 0);
        assert!(!pool.is_searching());
    }

    #[test]
    fn test_thread_clamp() {
        let pool = Pool::new();
        pool.set_threads(0);
        assert_eq!(pool.threads(), 1);
        pool.set_threads(100_000);
        assert_eq!(pool.threads(), MAX_THREADS);
    }

    #[test]
    fn test_short_budget_caps_threads() {
        let pool = Pool::new();
        pool.set_threads(8);

        let mut config = SearchConfig::default();
        config.set_movetime(Duration::from_millis(800));
        assert_eq!(pool.effective_threads(&config), 1);

        config.set_movetime(Duration::from_millis(3000));
        assert_eq!(pool.effective_threads(&config), 4);

        config.set_movetime(Duration::from_secs(60));
        assert_eq!(pool.effective_threads(&config), 8);
    }
}
