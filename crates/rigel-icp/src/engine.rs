use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;

use rigel_3d::PointCloud;
use rigel_kdtree::KdTree;
use rigel_linalg::{estimate_rigid, LinalgError, RigidTransform};

use crate::ops::find_correspondences;

/// Configuration of a registration run.
#[derive(Debug, Clone)]
pub struct RegistrationConfig {
    /// Iteration cap; reaching it is a terminal outcome, not an error.
    pub max_iterations: usize,
    /// Correspondences farther than this are discarded as outliers.
    pub max_correspondence_distance: f64,
    /// Converge when the relative improvement of the mean squared
    /// correspondence distance between consecutive iterations drops below
    /// this value.
    pub relative_tolerance: f64,
    /// Converge when the per-iteration transform update rotates less than
    /// this angle (radians) and translates less than
    /// [`RegistrationConfig::translation_tolerance`].
    pub rotation_tolerance: f64,
    /// Translation part of the transform-update convergence test.
    pub translation_tolerance: f64,
    /// Emit a warning when more than this fraction of source points is
    /// discarded by the distance gate in one iteration.
    pub outlier_warn_fraction: f64,
    /// Cooperative cancellation flag, checked between iterations.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            max_correspondence_distance: f64::INFINITY,
            relative_tolerance: 1e-6,
            rotation_tolerance: 1e-6,
            translation_tolerance: 1e-6,
            outlier_warn_fraction: 0.5,
            cancel: None,
        }
    }
}

impl RegistrationConfig {
    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Why a registration run failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FailureReason {
    /// Every correspondence was rejected by the distance gate.
    #[error("no correspondences within distance {max_distance} at iteration {iteration}")]
    NoCorrespondences {
        /// Iteration at which the failure occurred.
        iteration: usize,
        /// The configured gate distance.
        max_distance: f64,
    },

    /// The surviving correspondences could not determine a rigid update.
    #[error("rigid estimation failed at iteration {iteration}: {source}")]
    EstimateFailed {
        /// Iteration at which the failure occurred.
        iteration: usize,
        /// The underlying estimation error.
        #[source]
        source: LinalgError,
    },
}

/// The registration state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationState {
    /// No iteration has run yet.
    Initialized,
    /// At least one iteration ran without meeting a terminal condition.
    Iterating,
    /// The convergence test was met.
    Converged,
    /// The iteration cap was reached; the best estimate so far is carried.
    MaxIterationsReached,
    /// The run was aborted between iterations via the cancellation flag.
    Cancelled,
    /// The run aborted; the last valid estimate and the reason are carried.
    Failed(FailureReason),
}

impl RegistrationState {
    /// Whether no further iteration will run from this state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Initialized | Self::Iterating)
    }
}

/// Outcome of a registration run.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationResult {
    /// Final source-to-target transform estimate.
    pub transform: RigidTransform,
    /// Terminal state the run ended in.
    pub state: RegistrationState,
    /// Number of iterations performed.
    pub num_iterations: usize,
    /// Mean squared correspondence distance of the last iteration, infinite
    /// when no iteration ran.
    pub mse: f64,
}

/// Iterative closest point (point-to-point) registration of a source cloud
/// onto a target cloud.
///
/// The engine owns the single running transform estimate; the target's
/// spatial index is built once at construction and only read afterwards.
/// Runs are deterministic for identical inputs, initial transform, and
/// configuration.
pub struct Registration<'a> {
    source: &'a PointCloud,
    target: &'a PointCloud,
    tree: KdTree<'a>,
    config: RegistrationConfig,
    estimate: RigidTransform,
    state: RegistrationState,
    iterations: usize,
    mse: f64,
    scratch: Vec<[f64; 3]>,
}

impl<'a> Registration<'a> {
    /// Set up a registration of `source` onto `target`, starting from
    /// `initial`. Builds the k-d tree over the target points.
    pub fn new(
        source: &'a PointCloud,
        target: &'a PointCloud,
        initial: RigidTransform,
        config: RegistrationConfig,
    ) -> Self {
        let tree = KdTree::new(target.points());
        let scratch = vec![[0.0; 3]; source.len()];
        Self {
            source,
            target,
            tree,
            config,
            estimate: initial,
            state: RegistrationState::Initialized,
            iterations: 0,
            mse: f64::INFINITY,
            scratch,
        }
    }

    /// The current state.
    pub fn state(&self) -> &RegistrationState {
        &self.state
    }

    /// The current transform estimate.
    pub fn estimate(&self) -> &RigidTransform {
        &self.estimate
    }

    /// Number of iterations performed so far.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Mean squared correspondence distance of the last iteration, infinite
    /// before the first.
    pub fn mse(&self) -> f64 {
        self.mse
    }

    /// Run a single iteration and return the resulting state. A no-op when
    /// the engine is already in a terminal state.
    pub fn step(&mut self) -> &RegistrationState {
        if self.state.is_terminal() {
            return &self.state;
        }
        if self.config.is_cancelled() {
            log::debug!("registration cancelled after {} iterations", self.iterations);
            self.state = RegistrationState::Cancelled;
            return &self.state;
        }
        if self.iterations >= self.config.max_iterations {
            self.state = RegistrationState::MaxIterationsReached;
            return &self.state;
        }
        self.state = RegistrationState::Iterating;
        let iteration = self.iterations;

        // move the source into the target frame with the running estimate
        self.estimate.apply_many(self.source.points(), &mut self.scratch);

        let correspondences = find_correspondences(
            &self.scratch,
            self.target.points(),
            &self.tree,
            self.config.max_correspondence_distance,
        );
        if correspondences.source.is_empty() {
            self.state = RegistrationState::Failed(FailureReason::NoCorrespondences {
                iteration,
                max_distance: self.config.max_correspondence_distance,
            });
            return &self.state;
        }
        let total = self.scratch.len();
        if correspondences.discarded as f64 > self.config.outlier_warn_fraction * total as f64 {
            log::warn!(
                "iteration {}: discarded {}/{} source points beyond distance {}",
                iteration,
                correspondences.discarded,
                total,
                self.config.max_correspondence_distance
            );
        }

        let delta = match estimate_rigid(&correspondences.source, &correspondences.target) {
            Ok(delta) => delta,
            Err(source) => {
                self.state = RegistrationState::Failed(FailureReason::EstimateFailed {
                    iteration,
                    source,
                });
                return &self.state;
            }
        };

        let mse = correspondences.squared_distances.iter().sum::<f64>()
            / correspondences.squared_distances.len() as f64;

        // the incremental update applies after the previous estimate
        self.estimate = delta.compose(&self.estimate);
        self.iterations += 1;

        log::debug!(
            "iteration {}: {} correspondences, mse {:e}",
            iteration,
            correspondences.source.len(),
            mse
        );

        let relative_improvement = if self.mse == 0.0 {
            0.0
        } else if self.mse.is_finite() {
            ((self.mse - mse) / self.mse).abs()
        } else {
            f64::INFINITY
        };
        let small_update = delta.rotation_angle() < self.config.rotation_tolerance
            && delta.translation_norm() < self.config.translation_tolerance;
        self.mse = mse;

        if relative_improvement < self.config.relative_tolerance || small_update {
            self.state = RegistrationState::Converged;
        } else if self.iterations >= self.config.max_iterations {
            self.state = RegistrationState::MaxIterationsReached;
        }
        &self.state
    }

    /// Iterate until a terminal state is reached and return the outcome.
    pub fn run(mut self) -> RegistrationResult {
        while !self.state.is_terminal() {
            self.step();
        }
        RegistrationResult {
            transform: self.estimate,
            state: self.state,
            num_iterations: self.iterations,
            mse: self.mse,
        }
    }
}
