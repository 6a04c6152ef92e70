//! Univariate prior families for ABC parameters.
//!
//! Purpose
//! -------
//! Represent the four supported prior families — uniform, normal, lognormal,
//! and gamma — as a tagged enum with a uniform interface: sampling, density,
//! log-density, and support membership. Parameters are validated once at
//! construction; the underlying `statrs` distributions are built on demand.
//!
//! Key behaviors
//! -------------
//! - Constructors validate finiteness and positivity constraints and report
//!   failures as [`PriorError::InvalidParam`].
//! - `pdf` and `log_pdf` guard the support explicitly, returning `0` (resp.
//!   `-inf`) outside it instead of relying on the backend's edge behavior.
//! - Sampling draws through `rand::Distribution` with a caller-provided
//!   `StdRng`, keeping every stochastic path reproducible given a seed.
//! - The uniform family additionally exposes the inverse CDF used for
//!   quantile-based draws.
//!
//! Conventions
//! -----------
//! - Parameterizations follow the conventional `(p1, p2)` pairs: uniform
//!   `(a, b)` endpoints, normal and lognormal `(mu, sigma)` on the natural
//!   and log scale respectively, gamma `(shape, scale)`.
use crate::priors::errors::{PriorError, PriorResult};
use rand::{prelude::Distribution, rngs::StdRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, ContinuousCDF, Gamma, LogNormal, Normal, Uniform};

/// A univariate prior: one of the four supported families.
///
/// Construct through [`Prior::uniform`], [`Prior::normal`],
/// [`Prior::lognormal`], or [`Prior::gamma`]; the stored parameters are
/// guaranteed valid afterwards. Downstream code should match exhaustively so
/// new families cannot be added silently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Prior {
    /// Uniform on the closed interval `[a, b]`.
    Uniform { a: f64, b: f64 },
    /// Normal with mean `mu` and standard deviation `sigma > 0`.
    Normal { mu: f64, sigma: f64 },
    /// Lognormal whose logarithm is normal with location `mu` and scale
    /// `sigma > 0`.
    LogNormal { mu: f64, sigma: f64 },
    /// Gamma with shape `k > 0` and scale `theta > 0`.
    Gamma { shape: f64, scale: f64 },
}

impl Prior {
    /// Uniform prior on `[a, b]`.
    ///
    /// # Errors
    /// [`PriorError::InvalidParam`] if either endpoint is non-finite or if
    /// `a >= b`.
    pub fn uniform(a: f64, b: f64) -> PriorResult<Self> {
        if !a.is_finite() {
            return Err(PriorError::InvalidParam {
                family: "uniform",
                param: "a",
                value: a,
                reason: "endpoints must be finite",
            });
        }
        if !b.is_finite() || b <= a {
            return Err(PriorError::InvalidParam {
                family: "uniform",
                param: "b",
                value: b,
                reason: "upper endpoint must be finite and strictly greater than the lower",
            });
        }
        Ok(Prior::Uniform { a, b })
    }

    /// Normal prior with mean `mu` and standard deviation `sigma`.
    ///
    /// # Errors
    /// [`PriorError::InvalidParam`] if `mu` is non-finite or `sigma` is not
    /// finite and strictly positive.
    pub fn normal(mu: f64, sigma: f64) -> PriorResult<Self> {
        if !mu.is_finite() {
            return Err(PriorError::InvalidParam {
                family: "normal",
                param: "mu",
                value: mu,
                reason: "mean must be finite",
            });
        }
        validate_scale("normal", "sigma", sigma)?;
        Ok(Prior::Normal { mu, sigma })
    }

    /// Lognormal prior with log-scale location `mu` and scale `sigma`.
    ///
    /// # Errors
    /// [`PriorError::InvalidParam`] if `mu` is non-finite or `sigma` is not
    /// finite and strictly positive.
    pub fn lognormal(mu: f64, sigma: f64) -> PriorResult<Self> {
        if !mu.is_finite() {
            return Err(PriorError::InvalidParam {
                family: "lognormal",
                param: "mu",
                value: mu,
                reason: "location must be finite",
            });
        }
        validate_scale("lognormal", "sigma", sigma)?;
        Ok(Prior::LogNormal { mu, sigma })
    }

    /// Gamma prior with shape `k` and scale `theta`.
    ///
    /// # Errors
    /// [`PriorError::InvalidParam`] if either parameter is not finite and
    /// strictly positive.
    pub fn gamma(shape: f64, scale: f64) -> PriorResult<Self> {
        validate_scale("gamma", "shape", shape)?;
        validate_scale("gamma", "scale", scale)?;
        Ok(Prior::Gamma { shape, scale })
    }

    /// Draw one value from the prior.
    pub fn sample(&self, rng: &mut StdRng) -> PriorResult<f64> {
        match *self {
            Prior::Uniform { a, b } => Ok(uniform(a, b)?.sample(rng)),
            Prior::Normal { mu, sigma } => Ok(normal(mu, sigma)?.sample(rng)),
            Prior::LogNormal { mu, sigma } => Ok(lognormal(mu, sigma)?.sample(rng)),
            Prior::Gamma { shape, scale } => Ok(gamma(shape, scale)?.sample(rng)),
        }
    }

    /// Density at `x`; `0` outside the support.
    pub fn pdf(&self, x: f64) -> PriorResult<f64> {
        if !self.support_contains(x) {
            return Ok(0.0);
        }
        match *self {
            Prior::Uniform { a, b } => Ok(uniform(a, b)?.pdf(x)),
            Prior::Normal { mu, sigma } => Ok(normal(mu, sigma)?.pdf(x)),
            Prior::LogNormal { mu, sigma } => Ok(lognormal(mu, sigma)?.pdf(x)),
            Prior::Gamma { shape, scale } => Ok(gamma(shape, scale)?.pdf(x)),
        }
    }

    /// Log-density at `x`; `-inf` outside the support.
    pub fn log_pdf(&self, x: f64) -> PriorResult<f64> {
        if !self.support_contains(x) {
            return Ok(f64::NEG_INFINITY);
        }
        match *self {
            Prior::Uniform { a, b } => Ok(uniform(a, b)?.ln_pdf(x)),
            Prior::Normal { mu, sigma } => Ok(normal(mu, sigma)?.ln_pdf(x)),
            Prior::LogNormal { mu, sigma } => Ok(lognormal(mu, sigma)?.ln_pdf(x)),
            Prior::Gamma { shape, scale } => Ok(gamma(shape, scale)?.ln_pdf(x)),
        }
    }

    /// Whether `x` lies in the support of the prior.
    pub fn support_contains(&self, x: f64) -> bool {
        if !x.is_finite() {
            return false;
        }
        match *self {
            Prior::Uniform { a, b } => (a..=b).contains(&x),
            Prior::Normal { .. } => true,
            Prior::LogNormal { .. } | Prior::Gamma { .. } => x > 0.0,
        }
    }

    /// Inverse CDF; only defined for the uniform family.
    ///
    /// Returns `None` for the other families, whose quantile functions are
    /// not needed by the engine.
    pub fn inverse_cdf(&self, p: f64) -> PriorResult<Option<f64>> {
        match *self {
            Prior::Uniform { a, b } => Ok(Some(uniform(a, b)?.inverse_cdf(p))),
            _ => Ok(None),
        }
    }
}

fn validate_scale(family: &'static str, param: &'static str, value: f64) -> PriorResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PriorError::InvalidParam {
            family,
            param,
            value,
            reason: "must be finite and strictly positive",
        });
    }
    Ok(())
}

fn uniform(a: f64, b: f64) -> PriorResult<Uniform> {
    Uniform::new(a, b).map_err(|e| PriorError::Statrs { message: e.to_string() })
}

fn normal(mu: f64, sigma: f64) -> PriorResult<Normal> {
    Normal::new(mu, sigma).map_err(|e| PriorError::Statrs { message: e.to_string() })
}

fn lognormal(mu: f64, sigma: f64) -> PriorResult<LogNormal> {
    LogNormal::new(mu, sigma).map_err(|e| PriorError::Statrs { message: e.to_string() })
}

fn gamma(shape: f64, scale: f64) -> PriorResult<Gamma> {
    Gamma::new(shape, 1.0 / scale).map_err(|e| PriorError::Statrs { message: e.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Constructor validation for each family.
    // - Density and log-density values against closed forms, including the
    //   explicit support guard.
    // - Seeded sampling staying inside the support.
    //
    // They intentionally DO NOT cover:
    // - The statistical accuracy of statrs itself.
    // - Joint densities over parameter vectors (covered in `priors::set`).
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Constructors reject non-finite and out-of-order parameters.
    //
    // Given
    // -----
    // - Degenerate and inverted uniform endpoints, non-positive scales.
    //
    // Expect
    // ------
    // - `InvalidParam` in every case; valid parameters construct.
    fn constructors_validate_parameters() {
        // Act / Assert
        assert!(matches!(Prior::uniform(1.0, 1.0), Err(PriorError::InvalidParam { .. })));
        assert!(matches!(Prior::uniform(2.0, 1.0), Err(PriorError::InvalidParam { .. })));
        assert!(matches!(Prior::normal(0.0, 0.0), Err(PriorError::InvalidParam { .. })));
        assert!(matches!(Prior::lognormal(0.0, -1.0), Err(PriorError::InvalidParam { .. })));
        assert!(matches!(Prior::gamma(0.0, 1.0), Err(PriorError::InvalidParam { .. })));
        assert!(matches!(
            Prior::gamma(1.0, f64::INFINITY),
            Err(PriorError::InvalidParam { .. })
        ));
        assert!(Prior::uniform(0.0, 1.0).is_ok());
        assert!(Prior::normal(0.0, 1.0).is_ok());
        assert!(Prior::lognormal(0.0, 1.0).is_ok());
        assert!(Prior::gamma(2.0, 0.5).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Densities match closed forms inside the support and vanish outside.
    //
    // Given
    // -----
    // - Uniform(0, 2), Normal(0, 1), Gamma(shape 2, scale 0.5).
    //
    // Expect
    // ------
    // - Uniform density 1/2 inside, 0 outside; standard normal density at 0;
    //   gamma density at 1 equal to (1/theta^k) x e^{-x/theta} for k = 2.
    fn pdf_matches_closed_forms_and_guards_support() {
        // Arrange
        let uniform = Prior::uniform(0.0, 2.0).unwrap();
        let normal = Prior::normal(0.0, 1.0).unwrap();
        let gamma = Prior::gamma(2.0, 0.5).unwrap();

        // Act / Assert
        assert_relative_eq!(uniform.pdf(1.0).unwrap(), 0.5, epsilon = 1e-12);
        assert_eq!(uniform.pdf(2.5).unwrap(), 0.0);
        assert_eq!(uniform.log_pdf(-0.1).unwrap(), f64::NEG_INFINITY);

        let std_normal_at_zero = 1.0 / (2.0 * std::f64::consts::PI).sqrt();
        assert_relative_eq!(normal.pdf(0.0).unwrap(), std_normal_at_zero, epsilon = 1e-12);

        // Gamma(k=2, theta=0.5): f(x) = x e^{-x/theta} / theta^2.
        let expected = 1.0 * (-2.0f64).exp() / 0.25;
        assert_relative_eq!(gamma.pdf(1.0).unwrap(), expected, epsilon = 1e-10);
        assert_eq!(gamma.pdf(-1.0).unwrap(), 0.0);
    }

    #[test]
    // Purpose
    // -------
    // Seeded draws stay inside the support for every family and the uniform
    // inverse CDF reproduces the endpoints.
    //
    // Given
    // -----
    // - 500 draws per family with a fixed seed.
    //
    // Expect
    // ------
    // - Uniform draws within (0, 1); lognormal and gamma draws positive;
    //   `inverse_cdf(0)` and `inverse_cdf(1)` hit the uniform endpoints;
    //   non-uniform families report `None`.
    fn sampling_respects_support_and_uniform_inverse_cdf() {
        // Arrange
        let mut rng = StdRng::seed_from_u64(7);
        let uniform = Prior::uniform(0.0, 1.0).unwrap();
        let lognormal = Prior::lognormal(0.0, 0.5).unwrap();
        let gamma = Prior::gamma(3.0, 1.0).unwrap();

        // Act / Assert
        for _ in 0..500 {
            let u = uniform.sample(&mut rng).unwrap();
            assert!((0.0..=1.0).contains(&u));
            assert!(lognormal.sample(&mut rng).unwrap() > 0.0);
            assert!(gamma.sample(&mut rng).unwrap() > 0.0);
        }
        assert_relative_eq!(uniform.inverse_cdf(0.0).unwrap().unwrap(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(uniform.inverse_cdf(1.0).unwrap().unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(gamma.inverse_cdf(0.5).unwrap(), None);
    }
}
