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

//! Thread-local energy/virial accumulation for threaded force kernels.
//!
//! Every worker thread of a [`ThreadTeam`] tallies into its own [`ThreadRecord`]
//! while it walks its share of the interactions.  At the end of the phase,
//! [`ThreadedStyle::reduce_thr`] folds the records into the [`SharedTotals`] of the
//! interaction category, and the last threaded category of the evaluation order
//! folds the per-thread force arrays.

#[macro_use] extern crate failure;
#[macro_use] extern crate log;
#[cfg(test)] #[macro_use] extern crate rsp2_assert_close;

pub use rsp2_thread_tally_config as config;

pub mod voigt;
pub mod flags;
pub mod category;
pub mod atoms;
pub mod record;
pub mod buffers;
pub mod reduce;
pub mod team;
pub mod package;
mod tally;

pub use crate::voigt::{V3, Voigt};
pub use crate::flags::{EnergyFlags, VirialFlags, EvFlags};
pub use crate::category::Category;
pub use crate::atoms::Atoms;
pub use crate::record::ThreadRecord;
pub use crate::buffers::{ForceBuffers, PerThread, data_reduce};
pub use crate::reduce::{SharedTotals, Totals, MergeTarget};
pub use crate::team::{ThreadTeam, TeamContext};
pub use crate::package::{ThreadPackage, PackageRegistry, ThreadedStyle, MissingThreadPackage};

pub type FailResult<T> = Result<T, failure::Error>;

#[cfg(test)]
pub(crate) fn init_test_logger() {
    let _ = env_logger::Builder::from_default_env().is_test(true).try_init();
}
