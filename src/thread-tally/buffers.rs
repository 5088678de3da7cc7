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

//! Per-thread per-atom arrays.
//!
//! All of these use the same "collect" layout: one buffer of `nthreads * nall`
//! entries, where thread `tid` owns `[tid * nall, (tid + 1) * nall)`.  After a
//! reduction the first `nall` entries hold the sum over threads.

use crate::V3;

use rayon_cond::CondIterator;
use slice_of_array::prelude::*;
use std::ops::Range;

/// The range of a collect-layout buffer owned by thread `tid`.
#[inline]
pub fn thread_range(tid: usize, nall: usize) -> Range<usize> {
    tid * nall..(tid + 1) * nall
}

/// A collect-layout buffer, split into the disjoint ranges of each thread.
///
/// Each thread's range can be taken exactly once.
#[derive(Debug)]
pub struct PerThread<'a, T> {
    nall: usize,
    slices: Vec<Option<&'a mut [T]>>,
}

impl<'a, T> PerThread<'a, T> {
    pub fn split(buf: &'a mut [T], nthreads: usize, nall: usize) -> Self {
        debug_assert!(
            buf.len() >= nthreads * nall,
            "buffer of {} too small for {} threads x {} atoms", buf.len(), nthreads, nall,
        );
        let mut rest = &mut buf[..nthreads * nall];
        let mut slices = Vec::with_capacity(nthreads);
        for _ in 0..nthreads {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(nall);
            slices.push(Some(head));
            rest = tail;
        }
        PerThread { nall, slices }
    }

    /// A split with no buffer behind it; every take yields `None`.
    pub fn absent(nthreads: usize) -> Self {
        PerThread { nall: 0, slices: (0..nthreads).map(|_| None).collect() }
    }

    pub fn nall(&self) -> usize { self.nall }

    pub fn num_threads(&self) -> usize { self.slices.len() }

    /// Take the range of thread `tid`.
    ///
    /// `None` if the buffer is absent or the range was already taken.
    pub fn take(&mut self, tid: usize) -> Option<&'a mut [T]> {
        debug_assert!(tid < self.slices.len(), "thread {} out of range", tid);
        self.slices.get_mut(tid).and_then(Option::take)
    }
}

/// Sum the per-thread sections of a collect-layout buffer into the first one.
///
/// `dall` holds `nthreads` sections of `ndim * nall` scalars.  The work is divided
/// into `nthreads` contiguous chunks of the first section, so that each worker
/// reads and writes a disjoint set of elements.
pub fn data_reduce(dall: &mut [f64], nall: usize, nthreads: usize, ndim: usize, use_rayon: bool) {
    let nvals = ndim * nall;
    if nthreads <= 1 || nvals == 0 {
        return;
    }
    debug_assert!(dall.len() >= nthreads * nvals);

    let (dest, others) = dall[..nthreads * nvals].split_at_mut(nvals);
    let others = &*others;
    let idelta = nvals / nthreads + 1;

    let chunks: Vec<_> = dest.chunks_mut(idelta).enumerate()
        .map(|(tid, chunk)| (tid * idelta, chunk))
        .collect();

    CondIterator::new(chunks, use_rayon).for_each(|(ifrom, chunk)| {
        for (offset, value) in chunk.iter_mut().enumerate() {
            let m = ifrom + offset;
            for n in 1..nthreads {
                *value += others[(n - 1) * nvals + m];
            }
        }
    });
}

/// The host's per-thread force and torque arrays.
#[derive(Debug, Clone)]
pub struct ForceBuffers {
    nthreads: usize,
    nall: usize,
    f: Vec<V3>,
    torque: Option<Vec<V3>>,
}

impl ForceBuffers {
    pub fn new(nthreads: usize, nall: usize, with_torque: bool) -> Self {
        let zeros = || vec![[0.0; 3]; nthreads * nall];
        ForceBuffers {
            nthreads, nall,
            f: zeros(),
            torque: if with_torque { Some(zeros()) } else { None },
        }
    }

    pub fn num_threads(&self) -> usize { self.nthreads }
    pub fn nall(&self) -> usize { self.nall }

    /// Zero every thread's section, ready for a new force computation.
    pub fn clear(&mut self) {
        self.f.iter_mut().for_each(|x| *x = [0.0; 3]);
        if let Some(torque) = &mut self.torque {
            torque.iter_mut().for_each(|x| *x = [0.0; 3]);
        }
    }

    /// Total forces; valid after the final reduction of a force computation.
    pub fn forces(&self) -> &[V3] { &self.f[..self.nall] }

    /// Total torques; valid after the final reduction of a force computation.
    pub fn torques(&self) -> Option<&[V3]> {
        self.torque.as_ref().map(|t| &t[..self.nall])
    }

    /// The section of one thread, for inspection.
    pub fn thread_forces(&self, tid: usize) -> &[V3] { &self.f[thread_range(tid, self.nall)] }

    /// Mutable access to the sections of all threads at once.
    pub fn thread_forces_mut(&mut self) -> &mut [V3] { &mut self.f }

    pub(crate) fn split(&mut self) -> (PerThread<'_, V3>, PerThread<'_, V3>) {
        let ForceBuffers { nthreads, nall, f, torque } = self;
        let f = PerThread::split(f, *nthreads, *nall);
        let torque = match torque {
            Some(torque) => PerThread::split(torque, *nthreads, *nall),
            None => PerThread::absent(*nthreads),
        };
        (f, torque)
    }

    /// Fold all sections into the first.
    pub fn reduce(&mut self, use_rayon: bool) {
        data_reduce(self.f.flat_mut(), self.nall, self.nthreads, 3, use_rayon);
        if let Some(torque) = &mut self.torque {
            data_reduce(torque.flat_mut(), self.nall, self.nthreads, 3, use_rayon);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_thread_ranges_are_disjoint() {
        let mut buf = vec![0; 12];
        {
            let mut split = PerThread::split(&mut buf, 3, 4);
            assert_eq!(split.num_threads(), 3);
            for tid in (0..3).rev() {
                let slice = split.take(tid).unwrap();
                assert_eq!(slice.len(), 4);
                slice.iter_mut().for_each(|x| *x = tid + 1);
            }
            assert!(split.take(1).is_none());
        }
        assert_eq!(buf, vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);
        assert_eq!(thread_range(2, 4), 8..12);
    }

    #[test]
    fn split_without_atoms() {
        let mut buf: Vec<f64> = vec![];
        let mut split = PerThread::split(&mut buf, 4, 0);
        assert_eq!(split.take(3).map(|s| s.len()), Some(0));
        assert!(PerThread::<f64>::absent(2).take(0).is_none());
    }

    fn check_fold(nthreads: usize, nall: usize, use_rayon: bool) {
        let ndim = 3;
        let nvals = ndim * nall;
        let mut dall = vec![0.0; nthreads * nvals];
        for t in 0..nthreads {
            for p in 0..nall {
                for d in 0..ndim {
                    dall[t * nvals + p * ndim + d] = (t * 100 + p) as f64;
                }
            }
        }
        data_reduce(&mut dall, nall, nthreads, ndim, use_rayon);

        let t = nthreads as f64;
        for p in 0..nall {
            let expected = p as f64 * t + 100.0 * t * (t - 1.0) / 2.0;
            for d in 0..ndim {
                assert_eq!(dall[p * ndim + d], expected, "p = {}, T = {}", p, nthreads);
            }
        }
    }

    #[test]
    fn fold_sums_thread_sections() {
        for &nthreads in &[1, 2, 3, 4, 7] {
            for &nall in &[0, 1, 5, 33] {
                check_fold(nthreads, nall, false);
                check_fold(nthreads, nall, true);
            }
        }
    }

    #[test]
    fn force_buffers_roundtrip() {
        let mut forces = ForceBuffers::new(3, 2, true);
        for (k, f) in forces.thread_forces_mut().iter_mut().enumerate() {
            *f = [k as f64, 1.0, -1.0];
        }
        forces.reduce(false);
        // sections are [0, 1], [2, 3], [4, 5]
        assert_eq!(forces.forces(), &[[6.0, 3.0, -3.0], [9.0, 3.0, -3.0]]);
        assert_eq!(forces.torques(), Some(&[[0.0; 3]; 2][..]));

        forces.clear();
        assert_eq!(forces.thread_forces(2), &[[0.0; 3]; 2]);
    }
}
