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

use crate::{Category, EnergyFlags, EvFlags, PerThread, V3, VirialFlags, Voigt};
use crate::voigt;

use enum_map::EnumMap;

/// Everything one worker thread accumulates during one phase.
///
/// The per-atom views are this thread's sections of collect-layout buffers
/// (see [`crate::buffers`]), so tallies never contend with other threads.
#[derive(Debug)]
pub struct ThreadRecord<'a> {
    tid: usize,
    pub(crate) flags: EvFlags,

    /// Energy of each category.  For `Pair` this is the van der Waals part.
    pub(crate) energy: EnumMap<Category, f64>,
    /// Coulomb part of the pair energy.
    pub(crate) eng_coul: f64,
    pub(crate) virial: EnumMap<Category, Voigt>,

    eatom: Option<&'a mut [f64]>,
    vatom: Option<&'a mut [Voigt]>,
    f: &'a mut [V3],
    torque: Option<&'a mut [V3]>,
}

impl<'a> ThreadRecord<'a> {
    /// A fresh record with zero totals and no per-atom outputs bound.
    pub fn new(tid: usize, f: &'a mut [V3], torque: Option<&'a mut [V3]>) -> Self {
        ThreadRecord {
            tid,
            flags: EvFlags::none(),
            energy: EnumMap::default(),
            eng_coul: 0.0,
            virial: EnumMap::default(),
            eatom: None,
            vatom: None,
            f, torque,
        }
    }

    /// Hook this thread's sections of the per-atom buffers into the tallies.
    ///
    /// Only the sections that the flags ask for are bound; the other buffers may be
    /// [`PerThread::absent`].
    pub fn setup(
        &mut self,
        flags: EvFlags,
        eatom: &mut PerThread<'a, f64>,
        vatom: &mut PerThread<'a, Voigt>,
    ) {
        self.flags = flags;
        if flags.eflag.contains(EnergyFlags::ATOM) {
            self.eatom = eatom.take(self.tid);
            debug_assert!(self.eatom.is_some(), "per-atom energy requested without a buffer");
        }
        if flags.vflag.contains(VirialFlags::ATOM) {
            self.vatom = vatom.take(self.tid);
            debug_assert!(self.vatom.is_some(), "per-atom virial requested without a buffer");
        }
    }

    pub fn tid(&self) -> usize { self.tid }
    pub fn flags(&self) -> &EvFlags { &self.flags }

    pub fn energy(&self, category: Category) -> f64 { self.energy[category] }
    pub fn eng_vdwl(&self) -> f64 { self.energy[Category::Pair] }
    pub fn eng_coul(&self) -> f64 { self.eng_coul }
    pub fn virial(&self, category: Category) -> &Voigt { &self.virial[category] }

    /// Forces computed by this thread.
    pub fn f(&mut self) -> &mut [V3] { &mut self.f[..] }

    pub fn torque(&mut self) -> Option<&mut [V3]> { self.torque.as_deref_mut() }

    /// This thread's per-atom energies, if bound.
    pub fn eatom(&self) -> Option<&[f64]> { self.eatom.as_deref() }

    /// This thread's per-atom virials, if bound.
    pub fn vatom(&self) -> Option<&[Voigt]> { self.vatom.as_deref() }

    // Unbound views index as empty slices, so a missing buffer panics on first use.
    #[inline(always)]
    pub(crate) fn eatom_mut(&mut self) -> &mut [f64] {
        self.eatom.as_deref_mut().unwrap_or(&mut [])
    }

    #[inline(always)]
    pub(crate) fn vatom_mut(&mut self) -> &mut [Voigt] {
        self.vatom.as_deref_mut().unwrap_or(&mut [])
    }

    /// Add `Σ x_i ⊗ f_i` of this thread's forces to its pair virial.
    ///
    /// With `nfirst`, only the first group of owned atoms and the ghosts contribute.
    pub fn virial_fdotr_compute(&mut self, x: &[V3], nlocal: usize, nghost: usize, nfirst: Option<usize>) {
        let nall = nlocal + nghost;
        let ranges = match nfirst {
            None => [0..nall, nall..nall],
            Some(nfirst) => [0..nfirst, nlocal..nall],
        };

        let virial = &mut self.virial[Category::Pair];
        for range in ranges.iter().cloned() {
            for i in range {
                voigt::accumulate6(virial, &voigt::outer(x[i], self.f[i]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_binds_only_requested_views() {
        let nall = 3;
        let mut f = vec![[0.0; 3]; 2 * nall];
        let mut eatom = vec![0.0; 2 * nall];
        let mut vatom = vec![[0.0; 6]; 2 * nall];

        let mut f_split = PerThread::split(&mut f, 2, nall);
        let mut e_split = PerThread::split(&mut eatom, 2, nall);
        let mut v_split = PerThread::split(&mut vatom, 2, nall);

        let flags = EvFlags::new(EnergyFlags::all(), VirialFlags::GLOBAL, false);
        let mut thr = ThreadRecord::new(1, f_split.take(1).unwrap(), None);
        thr.setup(flags, &mut e_split, &mut v_split);

        assert_eq!(thr.eatom().map(|e| e.len()), Some(nall));
        assert!(thr.vatom().is_none());
        assert!(v_split.take(1).is_some());
        assert!(e_split.take(1).is_none());

        thr.eatom_mut()[0] = 4.0;
        drop(thr);
        drop(e_split);
        assert_eq!(eatom, vec![0.0, 0.0, 0.0, 4.0, 0.0, 0.0]);
    }

    #[test]
    fn fdotr_ranges() {
        let x = vec![[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 3.0], [1.0, 1.0, 1.0]];
        let mut f = vec![[1.0, 1.0, 1.0]; 4];

        let mut thr = ThreadRecord::new(0, &mut f, None);
        thr.virial_fdotr_compute(&x, 3, 1, None);
        // Σ x: [2, 3, 4]; f is uniform so component ab is Σ x_a
        assert_eq!(thr.virial(Category::Pair), &[2.0, 3.0, 4.0, 2.0, 2.0, 3.0]);

        let mut thr = ThreadRecord::new(0, &mut f, None);
        thr.virial_fdotr_compute(&x, 3, 1, Some(1));
        // atoms 0 and 3 only
        assert_eq!(thr.virial(Category::Pair), &[2.0, 1.0, 1.0, 2.0, 2.0, 1.0]);
    }
}
