//! Prior sets: ordered collections of named priors bound to a parameter space.
//!
//! Purpose
//! -------
//! Combine independent univariate priors into the joint prior over a particle
//! vector, and resolve each parameter name against the model's parameter
//! slots: either the global `gdata` vector or the per-node `ldata` matrix.
//! A set targets exactly one of the two spaces; mixing is a construction
//! error.
//!
//! Conventions
//! -----------
//! - Parameter order is declaration order; a particle's `i`-th component
//!   belongs to the `i`-th prior.
//! - `slots[i]` is the index of parameter `i` in its target space: a `gdata`
//!   position or an `ldata` row.
use crate::priors::errors::{PriorError, PriorResult};
use crate::priors::parse::PriorSpec;
use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The parameter space a bound prior set writes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamTarget {
    /// The global parameter vector, one value per model.
    Gdata,
    /// The local parameter matrix, one row per parameter and one column per
    /// node.
    Ldata,
}

/// An ordered set of named priors, not yet resolved against a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorSet {
    specs: Vec<PriorSpec>,
}

impl PriorSet {
    /// Build a set from parsed specs, rejecting empties and duplicates.
    pub fn new(specs: Vec<PriorSpec>) -> PriorResult<Self> {
        if specs.is_empty() {
            return Err(PriorError::EmptySet);
        }
        for (i, spec) in specs.iter().enumerate() {
            if specs[..i].iter().any(|s| s.name == spec.name) {
                return Err(PriorError::DuplicateParameter { name: spec.name.clone() });
            }
        }
        Ok(PriorSet { specs })
    }

    /// Parse one expression per element of `expressions` and combine them.
    pub fn parse(expressions: &[&str]) -> PriorResult<Self> {
        let specs = expressions
            .iter()
            .map(|e| PriorSpec::from_str(e))
            .collect::<PriorResult<Vec<_>>>()?;
        PriorSet::new(specs)
    }

    /// Number of parameters (the particle dimension `k`).
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// `true` only before construction; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Parameter names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    /// The parsed specs in declaration order.
    pub fn specs(&self) -> &[PriorSpec] {
        &self.specs
    }

    /// Resolve every parameter name against the model's `gdata` names and
    /// `ldata` row names.
    ///
    /// All names must resolve in the same space. The returned
    /// [`BoundPriorSet`] carries the target and the slot index of each
    /// parameter.
    ///
    /// # Errors
    /// - [`PriorError::UnknownParameter`] if a name matches neither space.
    /// - [`PriorError::MixedTarget`] if the names straddle both spaces.
    pub fn bind(self, gdata_names: &[String], ldata_names: &[String]) -> PriorResult<BoundPriorSet> {
        let mut target: Option<(ParamTarget, String)> = None;
        let mut slots = Vec::with_capacity(self.specs.len());
        for spec in &self.specs {
            let (this_target, slot) =
                if let Some(i) = gdata_names.iter().position(|n| *n == spec.name) {
                    (ParamTarget::Gdata, i)
                } else if let Some(i) = ldata_names.iter().position(|n| *n == spec.name) {
                    (ParamTarget::Ldata, i)
                } else {
                    return Err(PriorError::UnknownParameter { name: spec.name.clone() });
                };
            match &target {
                None => target = Some((this_target, spec.name.clone())),
                Some((seen, seen_name)) if *seen != this_target => {
                    let (gdata_name, ldata_name) = if *seen == ParamTarget::Gdata {
                        (seen_name.clone(), spec.name.clone())
                    } else {
                        (spec.name.clone(), seen_name.clone())
                    };
                    return Err(PriorError::MixedTarget { gdata_name, ldata_name });
                }
                Some(_) => {}
            }
            slots.push(slot);
        }
        let (target, _) = target.expect("non-empty by construction");
        Ok(BoundPriorSet { set: self, target, slots })
    }

    /// Draw a particle vector: one independent draw per prior.
    pub fn sample_vector(&self, rng: &mut StdRng) -> PriorResult<Array1<f64>> {
        let mut x = Array1::zeros(self.specs.len());
        for (value, spec) in x.iter_mut().zip(&self.specs) {
            *value = spec.prior.sample(rng)?;
        }
        Ok(x)
    }

    /// Joint density of a particle: the product of the marginal densities.
    pub fn joint_pdf(&self, x: ArrayView1<f64>) -> PriorResult<f64> {
        let mut density = 1.0;
        for (&value, spec) in x.iter().zip(&self.specs) {
            density *= spec.prior.pdf(value)?;
        }
        Ok(density)
    }

    /// Joint log-density of a particle; `-inf` outside the joint support.
    pub fn joint_log_pdf(&self, x: ArrayView1<f64>) -> PriorResult<f64> {
        let mut log_density = 0.0;
        for (&value, spec) in x.iter().zip(&self.specs) {
            log_density += spec.prior.log_pdf(value)?;
        }
        Ok(log_density)
    }

    /// Whether every component of `x` lies in its marginal support.
    pub fn support_contains(&self, x: ArrayView1<f64>) -> bool {
        x.iter().zip(&self.specs).all(|(&value, spec)| spec.prior.support_contains(value))
    }
}

/// A prior set resolved against a model: target space plus slot indices.
///
/// Dereferences to the underlying [`PriorSet`] for densities and sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundPriorSet {
    set: PriorSet,
    target: ParamTarget,
    slots: Vec<usize>,
}

impl BoundPriorSet {
    /// The parameter space this set writes into.
    pub fn target(&self) -> ParamTarget {
        self.target
    }

    /// The slot index of parameter `i` in the target space.
    pub fn slot(&self, i: usize) -> usize {
        self.slots[i]
    }

    /// All slot indices, in parameter order.
    pub fn slots(&self) -> &[usize] {
        &self.slots
    }
}

impl std::ops::Deref for BoundPriorSet {
    type Target = PriorSet;

    fn deref(&self) -> &PriorSet {
        &self.set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::SeedableRng;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Set construction (duplicates, empties) and expression parsing.
    // - Binding against gdata/ldata names, including the mixed-target and
    //   unknown-name rejections.
    // - Joint densities and support over particle vectors.
    //
    // They intentionally DO NOT cover:
    // - Marginal density values (covered in `priors::distribution`).
    // -------------------------------------------------------------------------

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    // Purpose
    // -------
    // Construction rejects empty sets and duplicated names.
    //
    // Given
    // -----
    // - No expressions, then two expressions for the same parameter.
    //
    // Expect
    // ------
    // - `EmptySet` and `DuplicateParameter` respectively.
    fn new_rejects_empty_and_duplicate_sets() {
        // Act / Assert
        assert_eq!(PriorSet::parse(&[]), Err(PriorError::EmptySet));
        assert!(matches!(
            PriorSet::parse(&["beta ~ uniform(0, 1)", "beta ~ normal(0, 1)"]),
            Err(PriorError::DuplicateParameter { name }) if name == "beta"
        ));
    }

    #[test]
    // Purpose
    // -------
    // Binding resolves all names in one space and records slot indices.
    //
    // Given
    // -----
    // - Two priors over gdata names, declared in reverse slot order.
    //
    // Expect
    // ------
    // - Target `Gdata`; slots follow the model's name positions, not the
    //   declaration order.
    fn bind_resolves_gdata_slots() {
        // Arrange
        let set = PriorSet::parse(&["gamma ~ uniform(0, 1)", "beta ~ uniform(0, 1)"]).unwrap();

        // Act
        let bound = set.bind(&names(&["beta", "gamma"]), &names(&["phi"])).unwrap();

        // Assert
        assert_eq!(bound.target(), ParamTarget::Gdata);
        assert_eq!(bound.slots(), &[1, 0]);
        assert_eq!(bound.names(), vec!["gamma", "beta"]);
    }

    #[test]
    // Purpose
    // -------
    // Cross-space mixing and unknown names are rejected.
    //
    // Given
    // -----
    // - One name in gdata and one in ldata, then a name in neither.
    //
    // Expect
    // ------
    // - `MixedTarget` naming both parameters, and `UnknownParameter`.
    fn bind_rejects_mixed_and_unknown_names() {
        // Arrange
        let mixed = PriorSet::parse(&["beta ~ uniform(0, 1)", "phi ~ uniform(0, 1)"]).unwrap();
        let unknown = PriorSet::parse(&["nu ~ uniform(0, 1)"]).unwrap();

        // Act / Assert
        assert_eq!(
            mixed.bind(&names(&["beta"]), &names(&["phi"])),
            Err(PriorError::MixedTarget {
                gdata_name: "beta".to_string(),
                ldata_name: "phi".to_string()
            })
        );
        assert!(matches!(
            unknown.bind(&names(&["beta"]), &names(&["phi"])),
            Err(PriorError::UnknownParameter { name }) if name == "nu"
        ));
    }

    #[test]
    // Purpose
    // -------
    // Joint densities multiply marginals and the support guard is vectorwise.
    //
    // Given
    // -----
    // - Uniform(0, 2) x Normal(0, 1) priors and points inside/outside the
    //   uniform support.
    //
    // Expect
    // ------
    // - Joint pdf equals the product; joint log pdf equals the sum; a point
    //   outside one marginal has density 0 and log density -inf.
    fn joint_densities_multiply_marginals() {
        // Arrange
        let set = PriorSet::parse(&["a ~ uniform(0, 2)", "b ~ normal(0, 1)"]).unwrap();
        let inside = array![1.0, 0.0];
        let outside = array![3.0, 0.0];

        // Act / Assert
        let std_normal_at_zero = 1.0 / (2.0 * std::f64::consts::PI).sqrt();
        assert_relative_eq!(
            set.joint_pdf(inside.view()).unwrap(),
            0.5 * std_normal_at_zero,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            set.joint_log_pdf(inside.view()).unwrap(),
            (0.5f64).ln() + std_normal_at_zero.ln(),
            epsilon = 1e-12
        );
        assert_eq!(set.joint_pdf(outside.view()).unwrap(), 0.0);
        assert_eq!(set.joint_log_pdf(outside.view()).unwrap(), f64::NEG_INFINITY);
        assert!(set.support_contains(inside.view()));
        assert!(!set.support_contains(outside.view()));
    }

    #[test]
    // Purpose
    // -------
    // `sample_vector` draws one component per prior, each in support.
    //
    // Given
    // -----
    // - A two-parameter set and a seeded RNG.
    //
    // Expect
    // ------
    // - Vectors of length 2 whose components satisfy `support_contains`.
    fn sample_vector_draws_in_support() {
        // Arrange
        let set = PriorSet::parse(&["a ~ uniform(0, 1)", "b ~ gamma(2, 1)"]).unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        // Act / Assert
        for _ in 0..200 {
            let x = set.sample_vector(&mut rng).unwrap();
            assert_eq!(x.len(), 2);
            assert!(set.support_contains(x.view()));
        }
    }
}
