//! The ABC-SMC generation loop.
//!
//! Purpose
//! -------
//! Orchestrate one full fit: propose particles, run the simulator, evaluate
//! distances, accept against the tolerance, update importance weights, commit
//! the generation, and pick the next tolerance until the schedule is
//! exhausted or the adaptive stopping rule fires. [`AbcSmc`] owns all mutable
//! state; workers only see cloned simulator handles and write into
//! per-proposal scratch handed back to the loop.
//!
//! Key behaviors
//! -------------
//! - **Global target (`gdata`)**: each trajectory encodes one particle;
//!   proposals are evaluated in parallel with `rayon`, each with its own
//!   seeded RNG derived from the engine seed. A shared atomic counter gates
//!   acceptance so workers stand down once `n_particles` have been accepted;
//!   accepted particles commit in proposal order.
//! - **Per-node target (`ldata`)**: many particles are packed into one
//!   trajectory by replicating the first node. The batch starts at
//!   `LDATA_BATCH_FACTOR * n_particles` and doubles (capped at
//!   [`LDATA_BATCH_CAP`]) whenever the generation's proposal count exceeds
//!   twice the batch, tracking acceptance pressure.
//! - Recoverable simulation failures are absorbed and retried up to the
//!   per-generation budget; distance and tolerance violations abort the run
//!   with the in-progress generation discarded.
//! - The cancellation token is polled between trajectories and between
//!   batches; committed generations always remain valid.
//!
//! Invariants & assumptions
//! ------------------------
//! - Every committed generation satisfies the `ParticleStore` invariants
//!   (normalized weights, `d <= epsilon`, strictly decreasing tolerances).
//! - The ancestor recorded with each accepted particle indexes the previous
//!   committed generation, never a transient batch.
use crate::events::EventTable;
use crate::priors::{BoundPriorSet, ParamTarget, PriorSet};
use crate::simulator::{Distance, InitModel, PostGen, SimError, Simulator};
use crate::smc::cancel::CancelToken;
use crate::smc::distance::DistanceAdapter;
use crate::smc::errors::{AbcError, AbcResult, ToleranceError};
use crate::smc::generation::{Generation, ParticleStore};
use crate::smc::mvn::MvNormal;
use crate::smc::options::{validate_schedule, AbcOptions, ToleranceSpec};
use crate::smc::proposal::{Proposal, ProposalSampler};
use crate::smc::tolerance::{summed_distances, ToleranceSource};
use crate::smc::weights::{initial_weights, update_weights};
use ndarray::{Array1, Array2, ArrayView1};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// The persisted view of a fit: everything needed to inspect or resume the
/// run elsewhere — the priors, their target space, the parameter names, and
/// the full committed history with its tolerances, weights, distances,
/// effective sample sizes, and proposal counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcSnapshot {
    /// The parsed priors, in parameter order.
    pub priors: Vec<crate::priors::PriorSpec>,
    /// Which parameter space the priors write into.
    pub target: ParamTarget,
    /// Parameter names, in particle-column order.
    pub pars: Vec<String>,
    /// The committed generations.
    pub store: ParticleStore,
}

/// The engine state handed to the post-generation hook: the bound priors,
/// the committed particle history, the materialized tolerance history, and
/// the index of the generation that just committed.
///
/// The simulator handle and the user callables are deliberately absent: the
/// handle is mid-run mutable state (and exposing it would make the hook
/// generic over the model type), and the callables are the hook's own
/// peers. Everything else the run owns is reachable here.
pub struct AbcState<'a> {
    /// The bound priors (target space and slot indices).
    pub priors: &'a BoundPriorSet,
    /// The committed generations.
    pub store: &'a ParticleStore,
    /// The `s x g` tolerance history, one column per committed generation.
    pub tolerance_history: Array2<f64>,
    /// 1-based index of the generation just committed.
    pub generation: usize,
}

/// Initial per-node batch size, as a multiple of the particle count.
pub const LDATA_BATCH_FACTOR: usize = 10;

/// Hard cap on the per-node replication batch.
pub const LDATA_BATCH_CAP: usize = 100_000;

/// The ABC-SMC engine: model, priors, events, callbacks, and accumulated
/// state.
///
/// Construct with [`AbcSmc::new`], optionally install hooks, then call
/// [`AbcSmc::fit`] once and [`AbcSmc::continue_abc`] to extend a finished
/// run with further tolerance columns.
pub struct AbcSmc<M: Simulator, D: Distance<M::Trajectory, Data>, Data> {
    model: M,
    events: EventTable,
    priors: BoundPriorSet,
    distance: DistanceAdapter<D>,
    data: Data,
    init_model: Option<Box<dyn InitModel<M>>>,
    post_gen: Option<Box<dyn PostGen>>,
    options: AbcOptions,
    source: ToleranceSource,
    store: ParticleStore,
    rng: StdRng,
    cancel: CancelToken,
}

impl<M: Simulator, D: Distance<M::Trajectory, Data>, Data: Sync> AbcSmc<M, D, Data> {
    /// Bind the priors against the model and assemble an engine.
    ///
    /// `data` is the observed dataset; the engine owns it for the lifetime
    /// of the run and passes it into every distance evaluation.
    ///
    /// # Errors
    /// Prior binding failures (unknown names, mixed gdata/ldata targets).
    pub fn new(
        model: M, events: EventTable, priors: PriorSet, distance: D, data: Data,
        options: AbcOptions,
    ) -> AbcResult<Self> {
        let priors = priors.bind(&model.gdata_names(), &model.ldata_names())?;
        let adaptive = matches!(options.tolerance, ToleranceSpec::Adaptive { .. });
        let source = ToleranceSource::from_spec(&options.tolerance, &options.kliep);
        let rng = StdRng::seed_from_u64(options.seed);
        Ok(AbcSmc {
            model,
            events,
            priors,
            distance: DistanceAdapter::new(distance, adaptive),
            data,
            init_model: None,
            post_gen: None,
            options,
            source,
            store: ParticleStore::new(),
            rng,
            cancel: CancelToken::new(),
        })
    }

    /// Install a hook applied to each cloned model before its run.
    ///
    /// # Errors
    /// [`AbcError::InitModelWithLdataTarget`] when the parameter target is
    /// the per-node matrix.
    pub fn with_init_model(mut self, hook: impl InitModel<M> + 'static) -> AbcResult<Self> {
        if self.priors.target() == ParamTarget::Ldata {
            return Err(AbcError::InitModelWithLdataTarget);
        }
        self.init_model = Some(Box::new(hook));
        Ok(self)
    }

    /// Install a hook invoked after each committed generation.
    pub fn with_post_gen(mut self, hook: impl PostGen + 'static) -> Self {
        self.post_gen = Some(Box::new(hook));
        self
    }

    /// Install a cancellation token polled between trajectories and batches.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// The committed generations.
    pub fn store(&self) -> &ParticleStore {
        &self.store
    }

    /// The bound priors (target space and slot indices).
    pub fn priors(&self) -> &BoundPriorSet {
        &self.priors
    }

    /// A serializable snapshot of the run: priors, target, parameter names,
    /// and the committed history.
    pub fn snapshot(&self) -> AbcSnapshot {
        AbcSnapshot {
            priors: self.priors.specs().to_vec(),
            target: self.priors.target(),
            pars: self.priors.names().iter().map(|n| n.to_string()).collect(),
            store: self.store.clone(),
        }
    }

    /// Run the full fit: generations until the tolerance source is
    /// exhausted, the stopping rule fires, or a fatal error occurs.
    ///
    /// # Errors
    /// See the taxonomy on [`AbcError`]; on any error the last committed
    /// generation remains valid and inspectable through [`AbcSmc::store`].
    pub fn fit(&mut self) -> AbcResult<&ParticleStore> {
        if !self.store.is_empty() {
            return Err(AbcError::FitAlreadyRun);
        }
        match self.source.initial() {
            Some(epsilon) => {
                let sampler = ProposalSampler::from_prior(&self.priors);
                let collected = collect_particles(
                    &self.model,
                    &self.events,
                    &self.priors,
                    &self.distance,
                    &self.data,
                    self.init_model.as_deref(),
                    &self.cancel,
                    self.options.max_failures,
                    &sampler,
                    Some(&epsilon),
                    self.options.n_particles,
                    1,
                    &mut self.rng,
                )?;
                let (weight, ess) = initial_weights(collected.x.nrows());
                self.store.push_generation(Generation {
                    x: collected.x,
                    weight,
                    distance: collected.distance,
                    tolerance: epsilon,
                    ess,
                    nprop: collected.nprop,
                })?;
            }
            None => self.run_adaptive_first_generation()?,
        }
        self.after_commit()?;
        self.run_remaining()
    }

    /// Resume a finished run with additional tolerance columns.
    ///
    /// The new schedule is validated to remain strictly decreasing against
    /// the last committed tolerance before any generation runs.
    pub fn continue_abc(&mut self, schedule: Array2<f64>) -> AbcResult<&ParticleStore> {
        let last = self
            .store
            .last()
            .ok_or(ToleranceError::ContinueRequiresCommittedGeneration)?;
        validate_schedule(schedule.view(), Some(last.tolerance.view()), self.store.len())?;
        self.source = ToleranceSource::Schedule { matrix: schedule, next: 0 };
        self.run_remaining()
    }

    /// Oversample `n_init` prior draws, derive the first tolerance from the
    /// sorted summed distances, and retain the best `n_particles`.
    fn run_adaptive_first_generation(&mut self) -> AbcResult<()> {
        let n_init = self.source.n_init().expect("adaptive mode carries n_init");
        let n_particles = self.options.n_particles;
        let sampler = ProposalSampler::from_prior(&self.priors);
        let collected = collect_particles(
            &self.model,
            &self.events,
            &self.priors,
            &self.distance,
            &self.data,
            self.init_model.as_deref(),
            &self.cancel,
            self.options.max_failures,
            &sampler,
            None,
            n_init,
            1,
            &mut self.rng,
        )?;

        let sums = summed_distances(collected.distance.view());
        let mut order: Vec<usize> = (0..n_init).collect();
        order.sort_by(|&a, &b| sums[a].partial_cmp(&sums[b]).expect("distances are finite"));

        let epsilon = Array1::from_elem(1, sums[order[n_particles - 1]]);
        let k = collected.x.ncols();
        let mut x = Array2::zeros((n_particles, k));
        let mut distance = Array2::zeros((n_particles, 1));
        for (target, &source_row) in order[..n_particles].iter().enumerate() {
            x.row_mut(target).assign(&collected.x.row(source_row));
            distance.row_mut(target).assign(&collected.distance.row(source_row));
        }

        self.source.set_prior_cloud(collected.x);
        let (weight, ess) = initial_weights(n_particles);
        self.store.push_generation(Generation {
            x,
            weight,
            distance,
            tolerance: epsilon,
            ess,
            nprop: collected.nprop,
        })
    }

    /// Run generations until the tolerance source reports exhaustion.
    fn run_remaining(&mut self) -> AbcResult<&ParticleStore> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(AbcError::Cancelled);
            }
            let Some(epsilon) = self.source.next(&self.store, &mut self.rng)? else {
                break;
            };
            let generation = self.store.len() + 1;
            let previous = self.store.last().expect("run_remaining follows a commit");
            let previous_x = previous.x.clone();
            let previous_w = previous.weight.clone();
            let kernel = MvNormal::from_particles(previous_x.view())?;
            let sampler = ProposalSampler::from_generation(
                &self.priors,
                previous_x.view(),
                previous_w.view(),
                &kernel,
            );
            let collected = collect_particles(
                &self.model,
                &self.events,
                &self.priors,
                &self.distance,
                &self.data,
                self.init_model.as_deref(),
                &self.cancel,
                self.options.max_failures,
                &sampler,
                Some(&epsilon),
                self.options.n_particles,
                generation,
                &mut self.rng,
            )?;
            let (weight, ess) = update_weights(
                collected.x.view(),
                &self.priors,
                previous_x.view(),
                previous_w.view(),
                &kernel,
            )?;
            self.store.push_generation(Generation {
                x: collected.x,
                weight,
                distance: collected.distance,
                tolerance: epsilon,
                ess,
                nprop: collected.nprop,
            })?;
            self.after_commit()?;
        }
        Ok(&self.store)
    }

    /// Logging and the post-generation hook, after a successful commit.
    fn after_commit(&self) -> AbcResult<()> {
        let g = self.store.len();
        if self.options.verbose {
            let generation = self.store.last().expect("after_commit follows a commit");
            log::info!(
                "generation {g}: ess = {:.2}, acceptance = {:.4}, tolerance = {:?}",
                generation.ess,
                self.store.acceptance_rate(g - 1),
                generation.tolerance.as_slice().unwrap_or(&[]),
            );
        }
        if let Some(hook) = &self.post_gen {
            let state = AbcState {
                priors: &self.priors,
                store: &self.store,
                tolerance_history: self.store.tolerance_history(),
                generation: g,
            };
            hook.post_gen(&state).map_err(AbcError::from)?;
        }
        Ok(())
    }
}

/// Accepted particles for one generation, in acceptance order.
struct Collected {
    x: Array2<f64>,
    distance: Array2<f64>,
    #[allow(dead_code)]
    ancestors: Vec<Option<usize>>,
    nprop: usize,
}

enum Evaluated {
    Skipped,
    Rejected,
    Accepted(Array1<f64>),
    SimFailed(SimError),
    Fatal(AbcError),
}

/// Componentwise acceptance test: `d <= epsilon` for every statistic.
pub(crate) fn accept_row(distance: ArrayView1<f64>, epsilon: ArrayView1<f64>) -> bool {
    distance.iter().zip(epsilon.iter()).all(|(&d, &e)| d <= e)
}

/// The doubled batch size under acceptance pressure.
pub(crate) fn grown_batch(batch: usize) -> usize {
    (batch * 2).min(LDATA_BATCH_CAP)
}

/// Collect `target` accepted particles, dispatching on the parameter target.
///
/// `epsilon = None` accepts everything (the adaptive oversample).
#[allow(clippy::too_many_arguments)]
fn collect_particles<M: Simulator, D: Distance<M::Trajectory, Data>, Data: Sync>(
    model: &M, events: &EventTable, priors: &BoundPriorSet, distance: &DistanceAdapter<D>,
    data: &Data, init_model: Option<&dyn InitModel<M>>, cancel: &CancelToken,
    max_failures: usize, sampler: &ProposalSampler<'_>, epsilon: Option<&Array1<f64>>,
    target: usize, generation: usize, rng: &mut StdRng,
) -> AbcResult<Collected> {
    match priors.target() {
        ParamTarget::Gdata => collect_gdata(
            model,
            events,
            priors,
            distance,
            data,
            init_model,
            cancel,
            max_failures,
            sampler,
            epsilon,
            target,
            generation,
            rng,
        ),
        ParamTarget::Ldata => collect_ldata(
            model,
            events,
            priors,
            distance,
            data,
            cancel,
            max_failures,
            sampler,
            epsilon,
            target,
            generation,
            rng,
        ),
    }
}

/// One particle per trajectory, trajectories fanned out over `rayon`.
#[allow(clippy::too_many_arguments)]
fn collect_gdata<M: Simulator, D: Distance<M::Trajectory, Data>, Data: Sync>(
    model: &M, events: &EventTable, priors: &BoundPriorSet, distance: &DistanceAdapter<D>,
    data: &Data, init_model: Option<&dyn InitModel<M>>, cancel: &CancelToken,
    max_failures: usize, sampler: &ProposalSampler<'_>, epsilon: Option<&Array1<f64>>,
    target: usize, generation: usize, rng: &mut StdRng,
) -> AbcResult<Collected> {
    let mut accepted: Vec<(Proposal, Array1<f64>)> = Vec::with_capacity(target);
    let mut pending: Vec<(Proposal, u64)> = Vec::new();
    let mut nprop = 0;
    let mut failures = 0;

    while accepted.len() < target {
        if cancel.is_cancelled() {
            return Err(AbcError::Cancelled);
        }
        while pending.len() < target - accepted.len() {
            let proposal = sampler.draw(rng)?;
            let seed = rng.gen();
            pending.push((proposal, seed));
        }

        let batch = std::mem::take(&mut pending);
        let gate = AtomicUsize::new(accepted.len());
        let outcomes: Vec<Evaluated> = batch
            .par_iter()
            .map(|(proposal, seed)| {
                if gate.load(Ordering::SeqCst) >= target {
                    return Evaluated::Skipped;
                }
                let outcome = evaluate_one(
                    model, events, priors, distance, data, init_model, proposal, *seed,
                    epsilon, generation,
                );
                if matches!(outcome, Evaluated::Accepted(_)) {
                    gate.fetch_add(1, Ordering::SeqCst);
                }
                outcome
            })
            .collect();

        for ((proposal, _), outcome) in batch.into_iter().zip(outcomes) {
            match outcome {
                Evaluated::Skipped => {
                    let seed = rng.gen();
                    pending.push((proposal, seed));
                }
                Evaluated::Rejected => nprop += 1,
                Evaluated::Accepted(row) => {
                    nprop += 1;
                    if accepted.len() < target {
                        accepted.push((proposal, row));
                    }
                }
                Evaluated::SimFailed(error) => {
                    failures += 1;
                    log::warn!("discarding failed trajectory (failure {failures}): {error}");
                    if failures > max_failures {
                        return Err(AbcError::SimulationBudgetExceeded {
                            failures,
                            budget: max_failures,
                            last: error.to_string(),
                        });
                    }
                    let seed = rng.gen();
                    pending.push((proposal, seed));
                }
                Evaluated::Fatal(error) => return Err(error),
            }
        }
    }

    Ok(assemble(accepted, nprop, priors.len()))
}

/// Evaluate one proposal on a cloned handle: init hook, parameter writes,
/// run, distance, tolerance test.
#[allow(clippy::too_many_arguments)]
fn evaluate_one<M: Simulator, D: Distance<M::Trajectory, Data>, Data>(
    model: &M, events: &EventTable, priors: &BoundPriorSet, distance: &DistanceAdapter<D>,
    data: &Data, init_model: Option<&dyn InitModel<M>>, proposal: &Proposal, seed: u64,
    epsilon: Option<&Array1<f64>>, generation: usize,
) -> Evaluated {
    let mut model = model.clone();
    if let Some(hook) = init_model {
        if let Err(error) = hook.init(&mut model) {
            return Evaluated::Fatal(AbcError::Callback { message: error.to_string() });
        }
    }
    for (i, &slot) in priors.slots().iter().enumerate() {
        if let Err(error) = model.set_gdata(slot, proposal.particle[i]) {
            return Evaluated::Fatal(AbcError::Simulation(error));
        }
    }
    let mut run_rng = StdRng::seed_from_u64(seed);
    let trajectory = match model.run(events, &mut run_rng) {
        Ok(trajectory) => trajectory,
        Err(error @ SimError::RunFailed { .. }) => return Evaluated::SimFailed(error),
        Err(error) => return Evaluated::Fatal(AbcError::Simulation(error)),
    };
    let measured = match distance.measure(&trajectory, generation, data, 1) {
        Ok(measured) => measured,
        Err(error) => return Evaluated::Fatal(error),
    };
    let row = measured.row(0).to_owned();
    match epsilon {
        Some(epsilon) if !accept_row(row.view(), epsilon.view()) => Evaluated::Rejected,
        _ => Evaluated::Accepted(row),
    }
}

/// Many particles per trajectory via first-node replication.
#[allow(clippy::too_many_arguments)]
fn collect_ldata<M: Simulator, D: Distance<M::Trajectory, Data>, Data>(
    model: &M, events: &EventTable, priors: &BoundPriorSet, distance: &DistanceAdapter<D>,
    data: &Data, cancel: &CancelToken, max_failures: usize, sampler: &ProposalSampler<'_>,
    epsilon: Option<&Array1<f64>>, target: usize, generation: usize, rng: &mut StdRng,
) -> AbcResult<Collected> {
    let mut accepted: Vec<(Proposal, Array1<f64>)> = Vec::with_capacity(target);
    let mut nprop = 0;
    let mut failures = 0;
    let mut batch_size = (LDATA_BATCH_FACTOR * target).min(LDATA_BATCH_CAP);
    let mut replicated: Option<(usize, EventTable)> = None;

    while accepted.len() < target {
        if cancel.is_cancelled() {
            return Err(AbcError::Cancelled);
        }
        if replicated.as_ref().map_or(true, |(n, _)| *n != batch_size) {
            replicated = Some((batch_size, events.replicate_first_node(batch_size)?));
        }
        let (_, batch_events) = replicated.as_ref().expect("replicated events were just built");

        let proposals = sampler.draw_batch(batch_size, rng)?;
        let mut batch_model = model.clone();
        batch_model.replicate_first_node(batch_size)?;
        for (node, proposal) in proposals.iter().enumerate() {
            for (i, &slot) in priors.slots().iter().enumerate() {
                batch_model.set_ldata(slot, node, proposal.particle[i])?;
            }
        }

        let mut run_rng = StdRng::seed_from_u64(rng.gen());
        let trajectory = match batch_model.run(batch_events, &mut run_rng) {
            Ok(trajectory) => trajectory,
            Err(error @ SimError::RunFailed { .. }) => {
                failures += 1;
                log::warn!("discarding failed batch trajectory (failure {failures}): {error}");
                if failures > max_failures {
                    return Err(AbcError::SimulationBudgetExceeded {
                        failures,
                        budget: max_failures,
                        last: error.to_string(),
                    });
                }
                continue;
            }
            Err(error) => return Err(error.into()),
        };
        let measured = distance.measure(&trajectory, generation, data, batch_size)?;

        for (row, proposal) in measured.rows().into_iter().zip(proposals) {
            if accepted.len() >= target {
                break;
            }
            nprop += 1;
            let pass = epsilon.map_or(true, |eps| accept_row(row, eps.view()));
            if pass {
                accepted.push((proposal, row.to_owned()));
            }
        }

        if nprop > 2 * batch_size {
            batch_size = grown_batch(batch_size);
        }
    }

    Ok(assemble(accepted, nprop, priors.len()))
}

fn assemble(accepted: Vec<(Proposal, Array1<f64>)>, nprop: usize, k: usize) -> Collected {
    let n = accepted.len();
    let s = accepted.first().map_or(1, |(_, row)| row.len());
    let mut x = Array2::zeros((n, k));
    let mut distance = Array2::zeros((n, s));
    let mut ancestors = Vec::with_capacity(n);
    for (row, (proposal, d)) in accepted.into_iter().enumerate() {
        x.row_mut(row).assign(&proposal.particle);
        distance.row_mut(row).assign(&d);
        ancestors.push(proposal.ancestor);
    }
    Collected { x, distance, ancestors, nprop }
}
