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

use crate::V3;

/// The host's view of the atoms on this process, as needed by the reduction.
///
/// Atoms `0..nlocal` are owned here; `nlocal..nall` are ghost copies of atoms
/// owned elsewhere.
#[derive(Debug, Copy, Clone)]
pub struct Atoms<'a> {
    /// Positions of all local and ghost atoms.
    pub x: &'a [V3],
    pub nlocal: usize,
    pub nghost: usize,
    /// `Some(n)` when neighbor lists only include the first `n` owned atoms
    /// (plus all ghosts).
    pub nfirst: Option<usize>,
}

impl<'a> Atoms<'a> {
    /// All atoms local, none in a first group.
    pub fn local(x: &'a [V3]) -> Self {
        Atoms { x, nlocal: x.len(), nghost: 0, nfirst: None }
    }

    pub fn nall(&self) -> usize { self.nlocal + self.nghost }
}
