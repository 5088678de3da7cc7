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

//! Registration of threaded styles, and the per-phase driver.

use crate::{FailResult, Atoms, Category, EnergyFlags, EvFlags, ForceBuffers, PerThread};
use crate::{SharedTotals, TeamContext, ThreadRecord, ThreadTeam, VirialFlags, Voigt};
use crate::config::Settings;
use crate::reduce::MergeTarget;

use enum_map::EnumMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Fail)]
#[fail(display = "The 'package omp' command is required for /omp styles")]
pub struct MissingThreadPackage;

/// The threading support shared by all threaded styles of a run.
#[derive(Debug)]
pub struct ThreadPackage {
    team: ThreadTeam,
    active: EnumMap<Category, bool>,
    parallel_fold: bool,
}

impl ThreadPackage {
    pub fn new(team: ThreadTeam, styles: impl IntoIterator<Item=Category>, parallel_fold: bool) -> Self {
        let mut active = EnumMap::default();
        for category in styles {
            active[category] = true;
        }
        ThreadPackage { team, active, parallel_fold }
    }

    pub fn from_settings(settings: &Settings) -> FailResult<Self> {
        let team = ThreadTeam::new(settings.threads)?;
        let styles = settings.styles.iter().map(|&style| Category::from(style));
        let package = ThreadPackage::new(team, styles, settings.parallel_fold);

        let names = package.active_styles().map(|c| c.to_string()).collect::<Vec<_>>();
        info!("Threaded styles on {} threads: {}", package.team.num_threads(), names.join(", "));
        if names.is_empty() {
            warn!("No threaded styles are active; forces will never be folded.");
        }
        Ok(package)
    }

    pub fn team(&self) -> &ThreadTeam { &self.team }
    pub fn num_threads(&self) -> usize { self.team.num_threads() }
    pub fn parallel_fold(&self) -> bool { self.parallel_fold }

    pub fn is_active(&self, category: Category) -> bool { self.active[category] }

    pub fn active_styles(&self) -> impl Iterator<Item=Category> + '_ {
        self.active.iter().filter(|&(_, &on)| on).map(|(category, _)| category)
    }

    /// The last active category in evaluation order.
    ///
    /// Its reduction is the one that folds the per-thread forces.
    pub fn last_style(&self) -> Option<Category> {
        Category::last_of(self.active_styles())
    }
}

/// Where the host keeps its thread package, once one has been configured.
#[derive(Debug, Default)]
pub struct PackageRegistry {
    package: Option<Arc<ThreadPackage>>,
}

impl PackageRegistry {
    pub fn new() -> Self { Self::default() }

    /// Install a package, replacing any previous one.
    pub fn register(&mut self, package: ThreadPackage) -> Arc<ThreadPackage> {
        let package = Arc::new(package);
        self.package = Some(package.clone());
        package
    }

    pub fn thread_package(&self) -> Option<&Arc<ThreadPackage>> { self.package.as_ref() }
}

/// The threading half of a threaded force style.
#[derive(Debug, Clone)]
pub struct ThreadedStyle {
    package: Arc<ThreadPackage>,
    category: Category,
}

impl ThreadedStyle {
    pub fn new(registry: &PackageRegistry, category: Category) -> FailResult<Self> {
        let package = registry.thread_package().cloned().ok_or(MissingThreadPackage)?;
        if !package.is_active(category) {
            warn!(
                "A threaded {} style was created, but {} is not among the package's \
                styles; its forces may never be folded.",
                category, category,
            );
        }
        Ok(ThreadedStyle { package, category })
    }

    pub fn category(&self) -> Category { self.category }
    pub fn package(&self) -> &Arc<ThreadPackage> { &self.package }

    /// Hook a thread's sections of the per-atom arrays into its tallies.
    pub fn ev_setup_thr<'a>(
        &self,
        eflag: EnergyFlags,
        vflag: VirialFlags,
        eatom: &mut PerThread<'a, f64>,
        vatom: &mut PerThread<'a, Voigt>,
        thr: &mut ThreadRecord<'a>,
    ) {
        let flags = EvFlags::new(eflag, vflag, self.category.supports_fdotr());
        thr.setup(flags, eatom, vatom);
    }

    /// Fold one thread's global totals into the shared ones.
    ///
    /// Must be called by every thread of the team, since it may wait on the barrier.
    pub fn reduce_thr(
        &self,
        ctx: &TeamContext<'_>,
        totals: &MergeTarget<'_>,
        atoms: &Atoms<'_>,
        thr: &mut ThreadRecord<'_>,
    ) {
        debug_assert_eq!(totals.category(), self.category);
        let flags = *thr.flags();
        match self.category {
            Category::Pair => {
                if flags.vflag_fdotr {
                    ctx.sync_threads();
                    thr.virial_fdotr_compute(atoms.x, atoms.nlocal, atoms.nghost, atoms.nfirst);
                }
                if flags.evflag() {
                    ctx.sync_threads();
                    totals.merge(thr);
                }
            },
            _ => {
                ctx.sync_threads();
                totals.merge(thr);
            },
        }
    }

    /// Whether this style's reduction folds the per-thread force arrays.
    pub fn is_last_style(&self) -> bool {
        self.package.last_style() == Some(self.category)
    }

    /// Run one force computation of this style on every thread of the team.
    ///
    /// `shared` must have been set up for this phase.  `kernel` is called once per
    /// thread with that thread's record, and the reduction follows on the same thread.
    /// Afterwards the per-atom arrays of `shared` are folded, as are the forces if
    /// this is the last active style.
    ///
    /// If `kernel` panics on any thread, the other threads still finish their kernels,
    /// nothing is merged or folded, and the panic resumes on the calling thread.
    /// `shared` and `forces` must be set up again before they are reused.
    ///
    /// Phases on the same team are serialized (see [`ThreadTeam::broadcast`]), so
    /// `kernel` must not start another phase on this package.
    pub fn run_phase<K>(
        &self,
        atoms: &Atoms<'_>,
        forces: &mut ForceBuffers,
        shared: &mut SharedTotals,
        kernel: K,
    ) -> FailResult<()>
    where
        K: Fn(&TeamContext<'_>, &mut ThreadRecord<'_>) + Sync,
    {
        let team = self.package.team();
        let nthreads = team.num_threads();
        let nall = atoms.nall();

        ensure!(
            shared.category() == self.category,
            "{} style was given the totals of a {} style", self.category, shared.category(),
        );
        ensure!(
            (shared.num_threads(), shared.nall()) == (nthreads, nall),
            "totals were set up for {} threads x {} atoms, but the phase has {} x {}",
            shared.num_threads(), shared.nall(), nthreads, nall,
        );
        ensure!(
            (forces.num_threads(), forces.nall()) == (nthreads, nall),
            "force buffers hold {} threads x {} atoms, but the phase has {} x {}",
            forces.num_threads(), forces.nall(), nthreads, nall,
        );
        ensure!(atoms.x.len() >= nall, "{} positions for {} atoms", atoms.x.len(), nall);

        let EvFlags { eflag, vflag, .. } = *shared.flags();
        debug!("Begin {} phase on {} threads ({:?}, {:?})", self.category, nthreads, eflag, vflag);
        {
            let (mut f, mut torque) = forces.split();
            let (merge, mut eatom, mut vatom) = shared.split();

            let records = (0..nthreads).map(|tid| {
                let f = f.take(tid).unwrap_or_default();
                let mut thr = ThreadRecord::new(tid, f, torque.take(tid));
                self.ev_setup_thr(eflag, vflag, &mut eatom, &mut vatom, &mut thr);
                Mutex::new(thr)
            }).collect::<Vec<_>>();

            let failed = AtomicBool::new(false);
            let panics = team.broadcast(|ctx| {
                let mut thr = records[ctx.tid()].lock().unwrap_or_else(PoisonError::into_inner);
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| kernel(ctx, &mut *thr)));
                if outcome.is_err() {
                    failed.store(true, Ordering::SeqCst);
                }
                // every thread must agree on whether to enter the reduction's barriers
                ctx.sync_threads();
                if !failed.load(Ordering::SeqCst) {
                    self.reduce_thr(ctx, &merge, atoms, &mut *thr);
                }
                outcome.err()
            });

            if let Some(payload) = panics.into_iter().flatten().next() {
                error!("A {} kernel panicked; abandoning the phase", self.category);
                panic::resume_unwind(payload);
            }
        }

        let use_rayon = self.package.parallel_fold();
        team.install(|| {
            shared.reduce_per_atom(use_rayon);
            if self.is_last_style() {
                debug!("Folding forces of {} threads after {} phase", nthreads, self.category);
                forces.reduce(use_rayon);
            }
        });
        debug!("End {} phase", self.category);
        Ok(())
    }

    /// Extra memory held by the threading support of this style, in bytes.
    pub fn memory_usage_thr(&self) -> f64 { 0.0 }
}
