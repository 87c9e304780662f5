//! # Cooperative covariance fusion
//!
//! When the planning agent is within communication range of a second agent
//! the two exchange position estimates, and a relative position measurement
//! between them is used to shrink the planning agent's positional
//! covariance. Because the two estimates become correlated after the first
//! exchange the cross covariance `P12` between them must be tracked, and the
//! update has two forms:
//!
//! - On first contact the estimates are independent, so the plain Kalman
//!   update is used and the cross covariance is initialised.
//! - On every following in-range step the correlated update is used.
//!
//! Heading is never fused.
//!
//! The fusion is run over the planning horizon at the start of each cycle
//! (the "sweep"), producing the gain and fused covariance for every interior
//! step. These are then frozen into the dynamics and chance constraints.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{trace, warn};
use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

use crate::loc::Pose;
pub use params::Params as FusionParams;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Matrices whose determinant has a magnitude below this are treated as
/// singular.
const SINGULAR_DET_THRESHOLD: f64 = 1e-15;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Estimate of the other agent's trajectory over the horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEstimate {
    /// Predicted poses for steps `0..=N`.
    pub poses: Vec<Pose>,

    /// Positional covariance (P22) for steps `0..=N`.
    pub covs: Vec<Matrix2<f64>>,
}

/// The persistent fusion state carried between steps and cycles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusionContext {
    pub contact: ContactState,

    /// Cross covariance between the two agents' position estimates (P12).
    pub cross_cov: Matrix2<f64>,
}

/// The result of fusing at a single horizon step.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FusionStep {
    /// Which update branch was taken at this step.
    pub branch: ContactState,

    /// Fusion gain applied to the predicted position. Zero when out of range.
    pub gain: Matrix2<f64>,

    /// The planning agent's positional covariance after fusion (P11').
    pub fused_cov: Matrix2<f64>,

    /// The context to be used by the next step.
    pub next: FusionContext,

    /// Number of singular inverses which were replaced by zero.
    pub num_singular_fallbacks: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Communication contact between the two agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactState {
    /// The agents are out of range, or there is no other agent.
    NoContact,

    /// The agents have just come into range. Only ever lasts for one update.
    FirstContact,

    /// The agents have been in range for more than one update.
    SteadyContact,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ContactState {
    fn default() -> Self {
        ContactState::NoContact
    }
}

impl Default for FusionContext {
    fn default() -> Self {
        Self {
            contact: ContactState::NoContact,
            cross_cov: Matrix2::zeros(),
        }
    }
}

impl FusionContext {
    /// Run the fusion over every interior step of the horizon.
    ///
    /// `lin_poses` and `own_covs` must both cover steps `0..=N`, as must the
    /// other agent's estimate if one is given. One step is returned for each
    /// `k` in `0..N-1`, distances being measured between the linearisation
    /// pose and the other agent's pose at step `k`.
    pub fn sweep(
        &self,
        lin_poses: &[Pose],
        own_covs: &[Matrix2<f64>],
        other: Option<&AgentEstimate>,
        params: &FusionParams,
    ) -> Vec<FusionStep> {
        let num_interior = lin_poses.len().saturating_sub(2);
        let mut ctx = *self;
        let mut steps = Vec::with_capacity(num_interior);

        for k in 0..num_interior {
            let peer = other.and_then(|o| {
                let pose = o.poses.get(k)?;
                let cov = o.covs.get(k)?;
                Some((cov, lin_poses[k].distance_to(pose)))
            });

            let step = ctx.fuse(&own_covs[k], peer, params);

            trace!(
                "Fusion step {}: branch {:?}, next {:?}",
                k,
                step.branch,
                step.next.contact
            );

            ctx = step.next;
            steps.push(step);
        }

        steps
    }

    /// Fuse a single step.
    ///
    /// `peer` holds the other agent's covariance (P22) and the distance
    /// between the agents, or `None` if there is no other agent.
    pub fn fuse(
        &self,
        own_cov: &Matrix2<f64>,
        peer: Option<(&Matrix2<f64>, f64)>,
        params: &FusionParams,
    ) -> FusionStep {
        let (other_cov, dist_m) = match peer {
            Some((c, d)) if d < params.max_comm_distance_m => (c, d),
            _ => return self.no_contact(own_cov),
        };

        trace!("In contact at {:.3} m", dist_m);

        let p11 = own_cov;
        let p12 = &self.cross_cov;
        let p22 = other_cov;
        let r12 = params.meas_cov();

        match self.contact {
            ContactState::NoContact => {
                let (s_inv, singular) = inverse_or_zero(&(p11 + p22 + r12));
                let gain = p11 * s_inv;

                FusionStep {
                    branch: ContactState::FirstContact,
                    gain,
                    fused_cov: p11 - gain * p11,
                    next: FusionContext {
                        contact: ContactState::SteadyContact,
                        cross_cov: p11 * s_inv * p22,
                    },
                    num_singular_fallbacks: singular as usize,
                }
            }
            ContactState::FirstContact | ContactState::SteadyContact => {
                let (s_inv, singular) =
                    inverse_or_zero(&(p11 - p12 - p12.transpose() + p22 + r12));
                let gain = (p11 - p12) * s_inv;

                FusionStep {
                    branch: ContactState::SteadyContact,
                    gain,
                    fused_cov: p11 - gain * (p11 - p12.transpose()),
                    next: FusionContext {
                        contact: ContactState::SteadyContact,
                        cross_cov: p12 - (p11 - p12) * s_inv * (p12 - p22),
                    },
                    num_singular_fallbacks: singular as usize,
                }
            }
        }
    }

    fn no_contact(&self, own_cov: &Matrix2<f64>) -> FusionStep {
        FusionStep {
            branch: ContactState::NoContact,
            gain: Matrix2::zeros(),
            fused_cov: *own_cov,
            next: FusionContext {
                contact: ContactState::NoContact,
                cross_cov: self.cross_cov,
            },
            num_singular_fallbacks: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Invert the matrix, or return zero if it is singular.
///
/// The second element of the returned tuple is true if the fallback was used.
pub fn inverse_or_zero(mat: &Matrix2<f64>) -> (Matrix2<f64>, bool) {
    if mat.determinant().abs() >= SINGULAR_DET_THRESHOLD {
        if let Some(inv) = mat.try_inverse() {
            return (inv, false);
        }
    }

    warn!("Singular innovation covariance {:?}, using a zero inverse", mat);
    (Matrix2::zeros(), true)
}
