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

//! The shared totals of one interaction category.

use crate::{Category, EnergyFlags, EvFlags, PerThread, ThreadRecord, VirialFlags, Voigt};
use crate::buffers::data_reduce;
use crate::voigt;

use slice_of_array::prelude::*;
use std::sync::{Mutex, PoisonError};

/// Global outputs of one category, summed over all threads.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    /// For pair styles, the van der Waals energy.
    pub energy: f64,
    /// Coulomb energy; only pair styles produce this.
    pub eng_coul: f64,
    pub virial: Voigt,
}

/// The host object of one category, as seen by the reduction.
///
/// The global totals are only ever modified through [`SharedTotals::merge`], and the
/// per-atom arrays only through the tallies and the end-of-phase fold.
#[derive(Debug)]
pub struct SharedTotals {
    category: Category,
    flags: EvFlags,
    nall: usize,
    nthreads: usize,
    totals: Mutex<Totals>,
    eatom: Vec<f64>,
    vatom: Vec<Voigt>,
}

/// Merges thread records into the totals of a [`SharedTotals`] while its per-atom
/// arrays are lent out to the threads.
#[derive(Debug, Copy, Clone)]
pub struct MergeTarget<'a> {
    category: Category,
    totals: &'a Mutex<Totals>,
}

impl SharedTotals {
    pub fn new(category: Category) -> Self {
        SharedTotals {
            category,
            flags: EvFlags::none(),
            nall: 0,
            nthreads: 0,
            totals: Mutex::new(Totals::default()),
            eatom: vec![],
            vatom: vec![],
        }
    }

    /// Start a new phase.
    ///
    /// Zeroes the totals, and sizes the per-atom arrays to hold one section per
    /// thread if they were requested.
    pub fn setup(&mut self, eflag: EnergyFlags, vflag: VirialFlags, nall: usize, nthreads: usize) {
        self.flags = EvFlags::new(eflag, vflag, self.category.supports_fdotr());
        self.nall = nall;
        self.nthreads = nthreads;
        *self.totals_mut() = Totals::default();

        let len = |requested: bool| if requested { nthreads * nall } else { 0 };
        self.eatom.clear();
        self.eatom.resize(len(self.flags.eflag_atom), 0.0);
        self.vatom.clear();
        self.vatom.resize(len(self.flags.vflag_atom), voigt::ZERO);
    }

    pub fn category(&self) -> Category { self.category }
    pub fn flags(&self) -> &EvFlags { &self.flags }
    pub fn nall(&self) -> usize { self.nall }
    pub fn num_threads(&self) -> usize { self.nthreads }

    /// Add one thread's contribution to the totals.
    pub fn merge(&self, thr: &ThreadRecord<'_>) {
        self.merge_target().merge(thr)
    }

    pub fn totals(&self) -> Totals {
        self.totals.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Per-atom energies; valid after the end-of-phase fold.
    pub fn eatom(&self) -> Option<&[f64]> {
        match self.flags.eflag_atom {
            true => Some(&self.eatom[..self.nall]),
            false => None,
        }
    }

    /// Per-atom virials; valid after the end-of-phase fold.
    pub fn vatom(&self) -> Option<&[Voigt]> {
        match self.flags.vflag_atom {
            true => Some(&self.vatom[..self.nall]),
            false => None,
        }
    }

    /// Fold the per-thread sections of the per-atom arrays into the first.
    pub fn reduce_per_atom(&mut self, use_rayon: bool) {
        let SharedTotals { nall, nthreads, .. } = *self;
        if self.flags.eflag_atom {
            data_reduce(&mut self.eatom, nall, nthreads, 1, use_rayon);
        }
        if self.flags.vflag_atom {
            data_reduce(self.vatom.flat_mut(), nall, nthreads, 6, use_rayon);
        }
    }

    pub(crate) fn split(&mut self) -> (MergeTarget<'_>, PerThread<'_, f64>, PerThread<'_, Voigt>) {
        let SharedTotals { category, nall, nthreads, totals, eatom, vatom, .. } = self;
        let merge = MergeTarget { category: *category, totals };
        // arrays that were not requested are empty, and split into empty sections
        let e_nall = if eatom.is_empty() { 0 } else { *nall };
        let v_nall = if vatom.is_empty() { 0 } else { *nall };
        let eatom = PerThread::split(eatom, *nthreads, e_nall);
        let vatom = PerThread::split(vatom, *nthreads, v_nall);
        (merge, eatom, vatom)
    }

    fn merge_target(&self) -> MergeTarget<'_> {
        MergeTarget { category: self.category, totals: &self.totals }
    }

    fn totals_mut(&mut self) -> &mut Totals {
        self.totals.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<'a> MergeTarget<'a> {
    pub fn category(&self) -> Category { self.category }

    /// Add one thread's contribution to the totals, all under one lock.
    ///
    /// Only the accumulators of this category are read.  Pair tallies made by the
    /// kernel of another category (e.g. the nonbonded part of a bond style) are
    /// discarded.
    pub fn merge(&self, thr: &ThreadRecord<'_>) {
        let category = self.category;
        let flags = thr.flags();
        let (with_energy, with_virial) = match category {
            Category::Pair => (flags.eflag.contains(EnergyFlags::GLOBAL), flags.merges_pair_virial()),
            _ => (true, true),
        };

        if category != Category::Pair && has_pair_contribution(thr) {
            debug!("discarding pair tallies made by thread {} during {} phase", thr.tid(), category);
        }

        let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        if with_energy {
            totals.energy += thr.energy(category);
            if category == Category::Pair {
                totals.eng_coul += thr.eng_coul();
            }
        }
        if with_virial {
            voigt::accumulate6(&mut totals.virial, thr.virial(category));
        }
        trace!(
            "merged {} totals of thread {} (energy: {}, virial: {})",
            category, thr.tid(), with_energy, with_virial,
        );
    }
}

fn has_pair_contribution(thr: &ThreadRecord<'_>) -> bool {
    thr.energy(Category::Pair) != 0.0
        || thr.eng_coul() != 0.0
        || thr.virial(Category::Pair) != &voigt::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with(category: Category, flags: EvFlags, f: &mut [[f64; 3]]) -> ThreadRecord<'_> {
        let mut thr = ThreadRecord::new(0, f, None);
        thr.flags = flags;
        thr.energy[category] = 2.0;
        thr.eng_coul = if category == Category::Pair { 0.5 } else { 0.0 };
        thr.virial[category] = [1.0; 6];
        thr
    }

    #[test]
    fn pair_merge_follows_raw_bits() {
        crate::init_test_logger();
        let mut f: Vec<[f64; 3]> = vec![];

        let mut shared = SharedTotals::new(Category::Pair);
        shared.setup(EnergyFlags::ATOM, VirialFlags::FDOTR, 0, 2);
        let thr = record_with(Category::Pair, *shared.flags(), &mut f);
        shared.merge(&thr);
        shared.merge(&thr);
        // no global energy requested; fdotr still lands in the virial
        assert_eq!(shared.totals(), Totals { energy: 0.0, eng_coul: 0.0, virial: [2.0; 6] });

        shared.setup(EnergyFlags::GLOBAL, VirialFlags::ATOM, 0, 2);
        let thr = record_with(Category::Pair, *shared.flags(), &mut f);
        shared.merge(&thr);
        assert_eq!(shared.totals(), Totals { energy: 2.0, eng_coul: 0.5, virial: [0.0; 6] });
    }

    #[test]
    fn bonded_merge_is_unconditional() {
        let mut f: Vec<[f64; 3]> = vec![];
        let mut shared = SharedTotals::new(Category::Angle);
        shared.setup(EnergyFlags::empty(), VirialFlags::empty(), 0, 1);
        let thr = record_with(Category::Angle, *shared.flags(), &mut f);
        shared.merge(&thr);
        assert_eq!(shared.totals(), Totals { energy: 2.0, eng_coul: 0.0, virial: [1.0; 6] });
    }

    #[test]
    fn setup_sizes_per_atom_arrays() {
        let mut shared = SharedTotals::new(Category::Bond);
        shared.setup(EnergyFlags::ATOM, VirialFlags::GLOBAL, 5, 3);
        assert_eq!(shared.eatom.len(), 15);
        assert!(shared.vatom.is_empty());
        assert_eq!(shared.eatom(), Some(&[0.0; 5][..]));
        assert_eq!(shared.vatom(), None);

        let (_, mut eatom, mut vatom) = shared.split();
        assert_eq!(eatom.take(2).map(|s| s.len()), Some(5));
        assert_eq!(vatom.take(2).map(|s| s.len()), Some(0));
    }

    #[test]
    fn per_atom_fold() {
        let mut shared = SharedTotals::new(Category::Dihedral);
        shared.setup(EnergyFlags::ATOM, VirialFlags::ATOM, 2, 2);
        {
            let (_, mut eatom, mut vatom) = shared.split();
            for tid in 0..2 {
                let eatom = eatom.take(tid).unwrap();
                let vatom = vatom.take(tid).unwrap();
                for atom in 0..2 {
                    eatom[atom] = (10 * tid + atom) as f64;
                    vatom[atom] = [tid as f64; 6];
                }
            }
        }
        shared.reduce_per_atom(true);
        assert_eq!(shared.eatom(), Some(&[10.0, 12.0][..]));
        assert_eq!(shared.vatom(), Some(&[[1.0; 6], [1.0; 6]][..]));
    }

    #[test]
    fn setup_clears_previous_phase() {
        let mut f: Vec<[f64; 3]> = vec![];
        let mut shared = SharedTotals::new(Category::KSpace);
        shared.setup(EnergyFlags::GLOBAL, VirialFlags::GLOBAL, 0, 1);
        shared.merge(&record_with(Category::KSpace, *shared.flags(), &mut f));
        assert_ne!(shared.totals(), Totals::default());

        shared.setup(EnergyFlags::GLOBAL, VirialFlags::GLOBAL, 0, 1);
        assert_eq!(shared.totals(), Totals::default());
    }

    #[test]
    fn bonded_merge_ignores_pair_tallies() {
        crate::init_test_logger();
        let mut f: Vec<[f64; 3]> = vec![];
        let mut shared = SharedTotals::new(Category::Bond);
        shared.setup(EnergyFlags::GLOBAL, VirialFlags::GLOBAL, 0, 1);

        let mut thr = record_with(Category::Bond, *shared.flags(), &mut f);
        thr.energy[Category::Pair] = 1.0;
        thr.eng_coul = 1.0;
        thr.virial[Category::Pair] = [3.0; 6];
        shared.merge(&thr);
        assert_eq!(shared.totals(), Totals { energy: 2.0, eng_coul: 0.0, virial: [1.0; 6] });
    }
}
