/* ************************************************************************ **
** This file is part of rsp2, and is licensed under EITHER the MIT license  **
** or the Apache 2.0 license, at your option.                               **
**                                                                          **
**     http://www.apache.org/licenses/LICENSE-2.0                           **
**     http://opensource.org/licenses/MIT                                   **
**                                                                          **
** Be aware that not all of rsp2 is provided under this permissive license, **
** and that the project as a whole is licensed under the GPL 3.0.           **
** ************************************************************************ */

use crate::FailResult;

use std::sync::{Barrier, Mutex, PoisonError};

/// A fixed team of worker threads that run each phase together.
///
/// Every call to [`ThreadTeam::broadcast`] runs the closure exactly once on every
/// thread of the team, so the threads can meet at the team's barrier.
#[derive(Debug)]
pub struct ThreadTeam {
    pool: rayon::ThreadPool,
    barrier: Barrier,
    // held for the whole of a broadcast, so that only one phase uses the barrier
    phase: Mutex<()>,
    nthreads: usize,
}

/// What one thread of a [`ThreadTeam`] knows about its team during a broadcast.
#[derive(Debug, Copy, Clone)]
pub struct TeamContext<'a> {
    tid: usize,
    nthreads: usize,
    barrier: &'a Barrier,
}

impl ThreadTeam {
    /// `None` uses rayon's default thread count.
    pub fn new(num_threads: Option<usize>) -> FailResult<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new()
            .thread_name(|tid| format!("rsp2-tally-{}", tid));
        if let Some(n) = num_threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build()?;

        let nthreads = pool.current_num_threads();
        Ok(ThreadTeam { pool, barrier: Barrier::new(nthreads), phase: Mutex::new(()), nthreads })
    }

    pub fn num_threads(&self) -> usize { self.nthreads }

    /// Run `op` once on every thread of the team, and collect the results by thread.
    ///
    /// Broadcasts started from different threads run one after the other.  Calling
    /// this from inside `op` deadlocks.
    pub fn broadcast<R, F>(&self, op: F) -> Vec<R>
    where
        R: Send,
        F: Fn(&TeamContext<'_>) -> R + Sync,
    {
        let _phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        let nthreads = self.nthreads;
        let barrier = &self.barrier;
        self.pool.broadcast(|ctx| {
            op(&TeamContext { tid: ctx.index(), nthreads, barrier })
        })
    }

    /// Run `op` inside the team's pool, so that rayon iterators use its threads.
    pub fn install<R, F>(&self, op: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        self.pool.install(op)
    }
}

impl<'a> TeamContext<'a> {
    pub fn tid(&self) -> usize { self.tid }
    pub fn num_threads(&self) -> usize { self.nthreads }

    /// Block until every thread of the team has called this.
    pub fn sync_threads(&self) {
        self.barrier.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn every_thread_runs_once() {
        let team = ThreadTeam::new(Some(4)).unwrap();
        assert_eq!(team.num_threads(), 4);

        let mut tids = team.broadcast(|ctx| {
            assert_eq!(ctx.num_threads(), 4);
            ctx.tid()
        });
        tids.sort();
        assert_eq!(tids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn barrier_separates_stages() {
        let team = ThreadTeam::new(Some(3)).unwrap();
        let arrived = AtomicUsize::new(0);
        let seen = team.broadcast(|ctx| {
            arrived.fetch_add(1, Ordering::SeqCst);
            ctx.sync_threads();
            arrived.load(Ordering::SeqCst)
        });
        assert_eq!(seen, vec![3, 3, 3]);
    }

    #[test]
    fn default_size() {
        let team = ThreadTeam::new(None).unwrap();
        assert!(team.num_threads() >= 1);
        assert_eq!(team.install(|| rayon::current_num_threads()), team.num_threads());
    }

    #[test]
    fn concurrent_broadcasts_keep_their_barriers() {
        let team = ThreadTeam::new(Some(3)).unwrap();
        std::thread::scope(|scope| {
            for _ in 0..2 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let arrived = AtomicUsize::new(0);
                        let seen = team.broadcast(|ctx| {
                            arrived.fetch_add(1, Ordering::SeqCst);
                            ctx.sync_threads();
                            let seen = arrived.load(Ordering::SeqCst);
                            ctx.sync_threads();
                            seen
                        });
                        assert_eq!(seen, vec![3, 3, 3]);
                    }
                });
            }
        });
    }
}
