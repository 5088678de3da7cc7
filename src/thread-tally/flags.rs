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

use bitflags::bitflags;

bitflags! {
    /// What energy output the host asked for this phase.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct EnergyFlags: u32 {
        /// Accumulate the total energy.
        const GLOBAL = 1;
        /// Accumulate per-atom energies.
        const ATOM = 2;
    }
}

bitflags! {
    /// What virial output the host asked for this phase.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct VirialFlags: u32 {
        /// Accumulate the global virial from the individual interactions.
        const GLOBAL = 1;
        /// Accumulate the global virial as `Σ x ⊗ f` once all forces are known.
        const FDOTR = 2;
        /// Accumulate per-atom virials.
        const ATOM = 4;
    }
}

/// The flags of one interaction category, as the tallies consult them.
///
/// Derived once per phase from the raw request bits, the same way for every
/// category.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EvFlags {
    /// Raw request bits, as given.
    pub eflag: EnergyFlags,
    pub vflag: VirialFlags,

    pub eflag_either: bool,
    pub eflag_global: bool,
    pub eflag_atom: bool,

    pub vflag_either: bool,
    /// Tallies should add to the global virial.
    ///
    /// This is false when the global virial comes from `Σ x ⊗ f` instead.
    pub vflag_global: bool,
    pub vflag_atom: bool,
    pub vflag_fdotr: bool,
}

impl EvFlags {
    /// `supports_fdotr` says whether the category can compute its global virial from
    /// `Σ x ⊗ f`.  Only pair styles ever do.
    pub fn new(eflag: EnergyFlags, vflag: VirialFlags, supports_fdotr: bool) -> Self {
        let eflag_global = eflag.contains(EnergyFlags::GLOBAL);
        let eflag_atom = eflag.contains(EnergyFlags::ATOM);

        let mut vflag_global = vflag.intersects(VirialFlags::GLOBAL | VirialFlags::FDOTR);
        let vflag_atom = vflag.contains(VirialFlags::ATOM);
        let mut vflag_either = !vflag.is_empty();

        let fdotr_only = (vflag & (VirialFlags::GLOBAL | VirialFlags::FDOTR)) == VirialFlags::FDOTR;
        let vflag_fdotr = fdotr_only && supports_fdotr;
        if vflag_fdotr {
            vflag_global = false;
            vflag_either = vflag_atom;
        }

        EvFlags {
            eflag, vflag,
            eflag_either: !eflag.is_empty(),
            eflag_global, eflag_atom,
            vflag_either, vflag_global, vflag_atom, vflag_fdotr,
        }
    }

    /// Nothing requested; tallies are no-ops.
    pub fn none() -> Self { EvFlags::new(EnergyFlags::empty(), VirialFlags::empty(), false) }

    /// Whether anything at all was requested (by the raw bits).
    pub fn evflag(&self) -> bool { !self.eflag.is_empty() || !self.vflag.is_empty() }

    /// Whether the reduction should fold the global virial of a pair style.
    ///
    /// Unlike `vflag_global`, this includes the `Σ x ⊗ f` case.
    pub fn merges_pair_virial(&self) -> bool {
        self.vflag.intersects(VirialFlags::GLOBAL | VirialFlags::FDOTR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_request() {
        let flags = EvFlags::new(EnergyFlags::all(), VirialFlags::GLOBAL | VirialFlags::ATOM, true);
        assert!(flags.eflag_global && flags.eflag_atom && flags.eflag_either);
        assert!(flags.vflag_global && flags.vflag_atom && flags.vflag_either);
        assert!(!flags.vflag_fdotr);
    }

    #[test]
    fn fdotr_replaces_global_virial() {
        let flags = EvFlags::new(EnergyFlags::empty(), VirialFlags::FDOTR, true);
        assert!(flags.vflag_fdotr);
        assert!(!flags.vflag_global);
        assert!(!flags.vflag_either);
        assert!(flags.merges_pair_virial());
        assert!(flags.evflag());

        let flags = EvFlags::new(EnergyFlags::empty(), VirialFlags::FDOTR | VirialFlags::ATOM, true);
        assert!(flags.vflag_fdotr && flags.vflag_either && flags.vflag_atom);
    }

    #[test]
    fn fdotr_needs_support() {
        let flags = EvFlags::new(EnergyFlags::empty(), VirialFlags::FDOTR, false);
        assert!(!flags.vflag_fdotr);
        assert!(flags.vflag_global);
    }

    #[test]
    fn fdotr_with_explicit_global_is_pairwise() {
        let flags = EvFlags::new(EnergyFlags::empty(), VirialFlags::GLOBAL | VirialFlags::FDOTR, true);
        assert!(!flags.vflag_fdotr);
        assert!(flags.vflag_global);
    }

    #[test]
    fn none_is_inert() {
        let flags = EvFlags::none();
        assert!(!flags.evflag());
        assert!(!flags.eflag_either && !flags.vflag_either);
    }
}
