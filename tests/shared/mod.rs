//! A toy system for driving whole phases: a cloud of atoms with a soft gaussian
//! repulsion between every pair, all atoms local.

#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;

use rsp2_threads::thread_tally::{Atoms, Category, EnergyFlags, ForceBuffers, PackageRegistry};
use rsp2_threads::thread_tally::{SharedTotals, TeamContext, ThreadPackage, ThreadRecord};
use rsp2_threads::thread_tally::{ThreadTeam, ThreadedStyle, Totals, V3, VirialFlags, Voigt};

pub struct Cluster {
    pub x: Vec<V3>,
    pub pairs: Vec<(usize, usize)>,
}

impl Cluster {
    pub fn random(n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let x = (0..n).map(|_| {
            [rng.gen_range(0.0..4.0), rng.gen_range(0.0..4.0), rng.gen_range(0.0..4.0)]
        }).collect();

        let pairs = (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))).collect();
        Cluster { x, pairs }
    }

    pub fn atoms(&self) -> Atoms<'_> { Atoms::local(&self.x) }
}

/// `E = exp(-r^2)`, returning `(E, -(dE/dr) / r)`.
pub fn gaussian(del: V3) -> (f64, f64) {
    let rsq = del[0] * del[0] + del[1] * del[1] + del[2] * del[2];
    let energy = f64::exp(-rsq);
    (energy, 2.0 * energy)
}

/// Pair kernel: each thread takes every `nthreads`-th pair.
pub fn pair_kernel(cluster: &Cluster, ctx: &TeamContext<'_>, thr: &mut ThreadRecord<'_>) {
    let nlocal = cluster.x.len();
    let evflag = thr.flags().evflag();
    for &(i, j) in cluster.pairs.iter().skip(ctx.tid()).step_by(ctx.num_threads()) {
        let (xi, xj) = (cluster.x[i], cluster.x[j]);
        let del = [xi[0] - xj[0], xi[1] - xj[1], xi[2] - xj[2]];
        let (evdwl, fpair) = gaussian(del);

        let f = thr.f();
        for k in 0..3 {
            f[i][k] += del[k] * fpair;
            f[j][k] -= del[k] * fpair;
        }
        if evflag {
            thr.ev_tally(i, j, nlocal, true, evdwl, 0.0, fpair, del);
        }
    }
}

pub fn registry(threads: usize, styles: &[Category]) -> PackageRegistry {
    let team = ThreadTeam::new(Some(threads)).unwrap();
    let mut registry = PackageRegistry::new();
    registry.register(ThreadPackage::new(team, styles.iter().cloned(), true));
    registry
}

#[derive(Debug, Clone)]
pub struct Output {
    pub totals: Totals,
    pub forces: Vec<V3>,
    pub eatom: Option<Vec<f64>>,
    pub vatom: Option<Vec<Voigt>>,
}

/// Run a single pair phase with pair as the only threaded style.
pub fn run_pair(threads: usize, cluster: &Cluster, eflag: EnergyFlags, vflag: VirialFlags) -> Output {
    let registry = registry(threads, &[Category::Pair]);
    let style = ThreadedStyle::new(&registry, Category::Pair).unwrap();

    let atoms = cluster.atoms();
    let mut forces = ForceBuffers::new(threads, atoms.nall(), false);
    let mut shared = SharedTotals::new(Category::Pair);
    shared.setup(eflag, vflag, atoms.nall(), threads);

    style.run_phase(&atoms, &mut forces, &mut shared, |ctx, thr| {
        pair_kernel(cluster, ctx, thr)
    }).unwrap();

    Output {
        totals: shared.totals(),
        forces: forces.forces().to_vec(),
        eatom: shared.eatom().map(|e| e.to_vec()),
        vatom: shared.vatom().map(|v| v.to_vec()),
    }
}
