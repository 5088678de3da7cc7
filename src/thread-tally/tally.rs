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

//! Tallies called by force kernels for each interaction.
//!
//! Everything here writes only to the calling thread's [`ThreadRecord`].
//!
//! Whenever a tally takes `nlocal` and a `newton` flag: with `newton` on, every
//! interaction is visited exactly once across all processes and is tallied in full.
//! With it off, an interaction involving ghost atoms is also visited by the owners of
//! those atoms, so each process only tallies the shares of its own atoms
//! (`index < nlocal`).

use crate::{Category, ThreadRecord, V3, Voigt};
use crate::voigt::{self, accumulate6, accumulate6_scaled, add3, outer, outer_sym};

const THIRD: f64 = 1.0 / 3.0;

impl<'a> ThreadRecord<'a> {
    /// Tally pair energy into the global and per-atom accumulators.
    pub fn e_tally(
        &mut self,
        i: usize,
        j: usize,
        nlocal: usize,
        newton_pair: bool,
        evdwl: f64,
        ecoul: f64,
    ) {
        if self.flags.eflag_global {
            if newton_pair {
                self.energy[Category::Pair] += evdwl;
                self.eng_coul += ecoul;
            } else {
                let evdwlhalf = 0.5 * evdwl;
                let ecoulhalf = 0.5 * ecoul;
                for &atom in &[i, j] {
                    if atom < nlocal {
                        self.energy[Category::Pair] += evdwlhalf;
                        self.eng_coul += ecoulhalf;
                    }
                }
            }
        }
        if self.flags.eflag_atom {
            let epairhalf = 0.5 * (evdwl + ecoul);
            let eatom = self.eatom_mut();
            if newton_pair || i < nlocal { eatom[i] += epairhalf; }
            if newton_pair || j < nlocal { eatom[j] += epairhalf; }
        }
    }

    /// Tally a pair virial into the global and per-atom accumulators.
    pub fn v_tally(&mut self, i: usize, j: usize, nlocal: usize, newton_pair: bool, v: &Voigt) {
        if self.flags.vflag_global {
            let va = &mut self.virial[Category::Pair];
            if newton_pair {
                accumulate6(va, v);
            } else {
                if i < nlocal { accumulate6_scaled(va, 0.5, v); }
                if j < nlocal { accumulate6_scaled(va, 0.5, v); }
            }
        }
        if self.flags.vflag_atom {
            let vatom = self.vatom_mut();
            if newton_pair || i < nlocal { accumulate6_scaled(&mut vatom[i], 0.5, v); }
            if newton_pair || j < nlocal { accumulate6_scaled(&mut vatom[j], 0.5, v); }
        }
    }

    /// Tally energy and virial of a central pair force.
    ///
    /// `fpair` is the force magnitude divided by the distance, and `del` is the
    /// separation `x_i - x_j`.
    pub fn ev_tally(
        &mut self,
        i: usize,
        j: usize,
        nlocal: usize,
        newton_pair: bool,
        evdwl: f64,
        ecoul: f64,
        fpair: f64,
        del: V3,
    ) {
        if self.flags.eflag_either {
            self.e_tally(i, j, nlocal, newton_pair, evdwl, ecoul);
        }
        if self.flags.vflag_either {
            let v = outer_sym(del, fpair);
            self.v_tally(i, j, nlocal, newton_pair, &v);
        }
    }

    /// Like [`ThreadRecord::ev_tally`], for pair forces given as a vector `f` on atom `i`.
    pub fn ev_tally_xyz(
        &mut self,
        i: usize,
        j: usize,
        nlocal: usize,
        newton_pair: bool,
        evdwl: f64,
        ecoul: f64,
        f: V3,
        del: V3,
    ) {
        if self.flags.eflag_either {
            self.e_tally(i, j, nlocal, newton_pair, evdwl, ecoul);
        }
        if self.flags.vflag_either {
            let v = outer(del, f);
            self.v_tally(i, j, nlocal, newton_pair, &v);
        }
    }

    /// Tally a pair from a full neighbor list, where the pair is visited from both
    /// ends and each visit contributes half, all of it to atom `i`.
    pub fn ev_tally_full(&mut self, i: usize, evdwl: f64, ecoul: f64, fpair: f64, del: V3) {
        if self.flags.eflag_either {
            if self.flags.eflag_global {
                self.energy[Category::Pair] += 0.5 * evdwl;
                self.eng_coul += 0.5 * ecoul;
            }
            if self.flags.eflag_atom {
                self.eatom_mut()[i] += 0.5 * (evdwl + ecoul);
            }
        }
        if self.flags.vflag_either {
            let v = outer_sym(del, fpair);
            if self.flags.vflag_global {
                accumulate6_scaled(&mut self.virial[Category::Pair], 0.5, &v);
            }
            if self.flags.vflag_atom {
                accumulate6_scaled(&mut self.vatom_mut()[i], 0.5, &v);
            }
        }
    }

    /// Tally a three-body term.  Only valid with newton on.
    ///
    /// virial = r_i F_i + r_j F_j + r_k F_k = (r_j - r_i) F_j + (r_k - r_i) F_k
    pub fn ev_tally3(
        &mut self,
        [i, j, k]: [usize; 3],
        evdwl: f64,
        ecoul: f64,
        [fj, fk]: [V3; 2],
        [drji, drki]: [V3; 2],
    ) {
        if self.flags.eflag_either {
            if self.flags.eflag_global {
                self.energy[Category::Pair] += evdwl;
                self.eng_coul += ecoul;
            }
            if self.flags.eflag_atom {
                let epairthird = THIRD * (evdwl + ecoul);
                let eatom = self.eatom_mut();
                eatom[i] += epairthird;
                eatom[j] += epairthird;
                eatom[k] += epairthird;
            }
        }

        if self.flags.vflag_either {
            let mut v = outer(drji, fj);
            accumulate6(&mut v, &outer(drki, fk));

            if self.flags.vflag_global {
                accumulate6(&mut self.virial[Category::Pair], &v);
            }
            if self.flags.vflag_atom {
                let vatom = self.vatom_mut();
                accumulate6_scaled(&mut vatom[i], THIRD, &v);
                accumulate6_scaled(&mut vatom[j], THIRD, &v);
                accumulate6_scaled(&mut vatom[k], THIRD, &v);
            }
        }
    }

    /// Tally a four-body term.  Only valid with newton on.
    ///
    /// Only the per-atom virial is tallied here; the global virial of these terms
    /// is expected to come from `Σ x ⊗ f`.
    pub fn ev_tally4(
        &mut self,
        ids: [usize; 4],
        evdwl: f64,
        forces: [V3; 3],
        deltas: [V3; 3],
    ) {
        if self.flags.eflag_either {
            if self.flags.eflag_global {
                self.energy[Category::Pair] += evdwl;
            }
            if self.flags.eflag_atom {
                let epairfourth = 0.25 * evdwl;
                let eatom = self.eatom_mut();
                for &atom in &ids {
                    eatom[atom] += epairfourth;
                }
            }
        }

        if self.flags.vflag_atom {
            let v = four_body_virial(forces, deltas);
            let vatom = self.vatom_mut();
            for &atom in &ids {
                accumulate6(&mut vatom[atom], &v);
            }
        }
    }

    /// Tally a Coulomb energy and virial shared evenly among the atoms of `list`.
    ///
    /// Only valid with newton on.
    pub fn ev_tally_list(&mut self, list: &[usize], ecoul: f64, v: &Voigt) {
        let n = list.len() as f64;

        if self.flags.eflag_either {
            if self.flags.eflag_global {
                self.eng_coul += ecoul;
            }
            if self.flags.eflag_atom {
                let epairatom = ecoul / n;
                let eatom = self.eatom_mut();
                for &atom in list {
                    eatom[atom] += epairatom;
                }
            }
        }

        if self.flags.vflag_either {
            if self.flags.vflag_global {
                accumulate6(&mut self.virial[Category::Pair], v);
            }
            if self.flags.vflag_atom {
                let vtmp = voigt::scaled(1.0 / n, v);
                let vatom = self.vatom_mut();
                for &atom in list {
                    accumulate6(&mut vatom[atom], &vtmp);
                }
            }
        }
    }

    /// Tally a bond.
    ///
    /// `fbond` is the force magnitude divided by the bond length and `del` is
    /// `x_i - x_j`.
    pub fn ev_tally_bond(
        &mut self,
        i: usize,
        j: usize,
        nlocal: usize,
        newton_bond: bool,
        ebond: f64,
        fbond: f64,
        del: V3,
    ) {
        if self.flags.eflag_either {
            let ebondhalf = 0.5 * ebond;
            if self.flags.eflag_global {
                self.energy[Category::Bond] += match newton_bond {
                    true => ebond,
                    false => ebondhalf * count_local(&[i, j], nlocal),
                };
            }
            if self.flags.eflag_atom {
                let eatom = self.eatom_mut();
                if newton_bond || i < nlocal { eatom[i] += ebondhalf; }
                if newton_bond || j < nlocal { eatom[j] += ebondhalf; }
            }
        }

        if self.flags.vflag_either {
            let v = outer_sym(del, fbond);
            if self.flags.vflag_global {
                let va = &mut self.virial[Category::Bond];
                match newton_bond {
                    true => accumulate6(va, &v),
                    false => accumulate6_scaled(va, 0.5 * count_local(&[i, j], nlocal), &v),
                }
            }
            if self.flags.vflag_atom {
                let vatom = self.vatom_mut();
                if newton_bond || i < nlocal { accumulate6_scaled(&mut vatom[i], 0.5, &v); }
                if newton_bond || j < nlocal { accumulate6_scaled(&mut vatom[j], 0.5, &v); }
            }
        }
    }

    /// Tally an angle `i1-i2-i3`.
    ///
    /// virial = r1 F1 + r2 F2 + r3 F3 = (r1 - r2) F1 + (r3 - r2) F3 = del1 f1 + del2 f3
    pub fn ev_tally_angle(
        &mut self,
        ids: [usize; 3],
        nlocal: usize,
        newton_bond: bool,
        eangle: f64,
        [f1, f3]: [V3; 2],
        [del1, del2]: [V3; 2],
    ) {
        if self.flags.eflag_either {
            let eanglethird = THIRD * eangle;
            if self.flags.eflag_global {
                self.energy[Category::Angle] += match newton_bond {
                    true => eangle,
                    false => eanglethird * count_local(&ids, nlocal),
                };
            }
            if self.flags.eflag_atom {
                let eatom = self.eatom_mut();
                for &atom in &ids {
                    if newton_bond || atom < nlocal { eatom[atom] += eanglethird; }
                }
            }
        }

        if self.flags.vflag_either {
            let mut v = outer(del1, f1);
            accumulate6(&mut v, &outer(del2, f3));

            if self.flags.vflag_global {
                let va = &mut self.virial[Category::Angle];
                match newton_bond {
                    true => accumulate6(va, &v),
                    false => accumulate6_scaled(va, THIRD * count_local(&ids, nlocal), &v),
                }
            }
            if self.flags.vflag_atom {
                let v = voigt::scaled(THIRD, &v);
                let vatom = self.vatom_mut();
                for &atom in &ids {
                    if newton_bond || atom < nlocal { accumulate6(&mut vatom[atom], &v); }
                }
            }
        }
    }

    /// Tally a dihedral `i1-i2-i3-i4`.
    ///
    /// `forces` are the forces on atoms 1, 3 and 4; `bonds` are the bond vectors
    /// `vb1 = x1 - x2`, `vb2 = x3 - x2` and `vb3 = x4 - x3`.
    ///
    /// virial = r1 F1 + r2 F2 + r3 F3 + r4 F4 = (r1 - r2) F1 + (r3 - r2) F3 + (r4 - r2) F4
    ///        = (r1 - r2) F1 + (r3 - r2) F3 + (r4 - r3 + r3 - r2) F4
    ///        = vb1 f1 + vb2 f3 + (vb3 + vb2) f4
    ///
    /// With newton off, the per-atom virial is added four times to `i1` (when it is
    /// local) instead of once to each local atom.  Impropers do not share this
    /// behavior.
    pub fn ev_tally_dihedral(
        &mut self,
        ids: [usize; 4],
        nlocal: usize,
        newton_bond: bool,
        edihedral: f64,
        forces: [V3; 3],
        bonds: [V3; 3],
    ) {
        self.ev_tally_bonded4(Category::Dihedral, ids, nlocal, newton_bond, edihedral, forces, bonds);
    }

    /// Tally an improper `i1-i2-i3-i4`.  Arguments are as for
    /// [`ThreadRecord::ev_tally_dihedral`].
    pub fn ev_tally_improper(
        &mut self,
        ids: [usize; 4],
        nlocal: usize,
        newton_bond: bool,
        eimproper: f64,
        forces: [V3; 3],
        bonds: [V3; 3],
    ) {
        self.ev_tally_bonded4(Category::Improper, ids, nlocal, newton_bond, eimproper, forces, bonds);
    }

    fn ev_tally_bonded4(
        &mut self,
        category: Category,
        ids: [usize; 4],
        nlocal: usize,
        newton_bond: bool,
        energy: f64,
        [f1, f3, f4]: [V3; 3],
        [vb1, vb2, vb3]: [V3; 3],
    ) {
        if self.flags.eflag_either {
            let equarter = 0.25 * energy;
            if self.flags.eflag_global {
                self.energy[category] += match newton_bond {
                    true => energy,
                    false => equarter * count_local(&ids, nlocal),
                };
            }
            if self.flags.eflag_atom {
                let eatom = self.eatom_mut();
                for &atom in &ids {
                    if newton_bond || atom < nlocal { eatom[atom] += equarter; }
                }
            }
        }

        if self.flags.vflag_either {
            let mut v = outer(vb1, f1);
            accumulate6(&mut v, &outer(vb2, f3));
            accumulate6(&mut v, &outer(add3(vb3, vb2), f4));

            if self.flags.vflag_global {
                let va = &mut self.virial[category];
                match newton_bond {
                    true => accumulate6(va, &v),
                    false => accumulate6_scaled(va, 0.25 * count_local(&ids, nlocal), &v),
                }
            }

            if self.flags.vflag_atom {
                let v = voigt::scaled(0.25, &v);
                let vatom = self.vatom_mut();
                if newton_bond {
                    for &atom in &ids {
                        accumulate6(&mut vatom[atom], &v);
                    }
                } else if category == Category::Dihedral {
                    let i1 = ids[0];
                    for _ in 0..4 {
                        if i1 < nlocal { accumulate6(&mut vatom[i1], &v); }
                    }
                } else {
                    for &atom in &ids {
                        if atom < nlocal { accumulate6(&mut vatom[atom], &v); }
                    }
                }
            }
        }
    }

    /// Tally the per-atom virial of a two-body term.  Only valid with newton on.
    ///
    /// `fpair` is the force magnitude on atom `i` divided by the distance.
    pub fn v_tally2(&mut self, i: usize, j: usize, fpair: f64, drij: V3) {
        let v = outer_sym(drij, 0.5 * fpair);
        let vatom = self.vatom_mut();
        accumulate6(&mut vatom[i], &v);
        accumulate6(&mut vatom[j], &v);
    }

    /// Tally the per-atom virial of a three-body term.  Only valid with newton on.
    ///
    /// Each atom receives the complete `(drik fi + drjk fj) / 3`; it is not split
    /// three ways again.
    pub fn v_tally3(&mut self, [i, j, k]: [usize; 3], [fi, fj]: [V3; 2], [drik, drjk]: [V3; 2]) {
        let mut v = outer(drik, fi);
        accumulate6(&mut v, &outer(drjk, fj));
        let v = voigt::scaled(THIRD, &v);

        let vatom = self.vatom_mut();
        accumulate6(&mut vatom[i], &v);
        accumulate6(&mut vatom[j], &v);
        accumulate6(&mut vatom[k], &v);
    }

    /// Tally the per-atom virial of a four-body term.  Only valid with newton on.
    ///
    /// Each atom receives the complete four-body virial.
    pub fn v_tally4(&mut self, ids: [usize; 4], forces: [V3; 3], deltas: [V3; 3]) {
        let v = four_body_virial(forces, deltas);
        let vatom = self.vatom_mut();
        for &atom in &ids {
            accumulate6(&mut vatom[atom], &v);
        }
    }
}

/// `(drim fi + drjm fj + drkm fk) / 4`
#[inline(always)]
fn four_body_virial([fi, fj, fk]: [V3; 3], [drim, drjm, drkm]: [V3; 3]) -> Voigt {
    let mut v = outer(drim, fi);
    accumulate6(&mut v, &outer(drjm, fj));
    accumulate6(&mut v, &outer(drkm, fk));
    voigt::scaled(0.25, &v)
}

#[inline(always)]
fn count_local(ids: &[usize], nlocal: usize) -> f64 {
    ids.iter().filter(|&&atom| atom < nlocal).count() as f64
}
