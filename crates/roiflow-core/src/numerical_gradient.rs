//! Numerical Gradient Validation Utilities
//!
//! Validates hand-written backward passes against finite differences. An
//! operator `F` with backward `B` is checked through the scalar loss
//! `L(x) = <cotangent, F(x)>`, whose gradient is exactly `B(x, cotangent)`:
//!
//! ```text
//! dL/dx_i ≈ [L(x + ε e_i) - L(x - ε e_i)] / (2ε)
//! ```
//!
//! For large inputs [`check_adjoint`] compares a single directional derivative
//! instead of the full gradient:
//!
//! ```text
//! <cotangent, [F(x + ε d) - F(x - ε d)] / (2ε)>  ≈  <B(x, cotangent), d>
//! ```
//!
//! # Example
//!
//! ```rust
//! use roiflow_core::numerical_gradient::{check_gradients, GradientCheckConfig};
//! use roiflow_core::Tensor;
//!
//! // F(x) = 3x, so B(x, g) = 3g
//! let triple = |x: &Tensor<f64>| {
//!     Tensor::from_vec(x.to_contiguous_vec().iter().map(|v| v * 3.0).collect(), x.shape().dims())
//! };
//! let triple_grad = |_x: &Tensor<f64>, g: &Tensor<f64>| {
//!     Tensor::from_vec(g.to_contiguous_vec().iter().map(|v| v * 3.0).collect(), g.shape().dims())
//! };
//!
//! let x = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
//! let g = Tensor::from_vec(vec![0.5, -1.0, 2.0], &[3]).unwrap();
//! let config = GradientCheckConfig::default();
//! let result = check_gradients(&x, &g, triple, triple_grad, &config).unwrap();
//! assert!(result.is_ok());
//! ```

use crate::{Result, Tensor, TensorError};
use num_traits::{Float, FromPrimitive};
use std::marker::PhantomData;

/// Configuration for numerical gradient checking
#[derive(Debug, Clone)]
pub struct GradientCheckConfig {
    /// Epsilon for finite difference computation
    pub epsilon: f64,
    /// Relative tolerance for gradient comparison
    pub rtol: f64,
    /// Absolute tolerance for gradient comparison
    pub atol: f64,
    /// Record the indices of failing elements
    pub check_elementwise: bool,
    /// Use central differences (more accurate but 2x slower)
    pub use_central_difference: bool,
}

impl Default for GradientCheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            rtol: 1e-3,
            atol: 1e-5,
            check_elementwise: false,
            use_central_difference: true,
        }
    }
}

impl GradientCheckConfig {
    /// Create a configuration for strict checking (tighter tolerances)
    pub fn strict() -> Self {
        Self {
            epsilon: 1e-6,
            rtol: 1e-4,
            atol: 1e-6,
            check_elementwise: true,
            use_central_difference: true,
        }
    }

    /// Create a configuration for relaxed checking (looser tolerances, forward differences)
    pub fn relaxed() -> Self {
        Self {
            epsilon: 1e-3,
            rtol: 1e-2,
            atol: 1e-3,
            check_elementwise: false,
            use_central_difference: false,
        }
    }
}

/// Result of gradient checking
#[derive(Debug, Clone)]
pub struct GradientCheckResult {
    /// Whether the gradient check passed
    pub passed: bool,
    /// Maximum relative error found
    pub max_relative_error: f64,
    /// Maximum absolute error found
    pub max_absolute_error: f64,
    /// Number of elements checked
    pub num_elements_checked: usize,
    /// Number of elements that failed tolerance check
    pub num_failures: usize,
    /// Indices of failed elements (if check_elementwise is true)
    pub failed_indices: Vec<usize>,
    /// Detailed error message if check failed
    pub error_message: Option<String>,
}

impl GradientCheckResult {
    /// Check if the gradient validation passed
    pub fn is_ok(&self) -> bool {
        self.passed
    }

    /// Get failure rate (percentage of elements that failed)
    pub fn failure_rate(&self) -> f64 {
        if self.num_elements_checked == 0 {
            0.0
        } else {
            (self.num_failures as f64 / self.num_elements_checked as f64) * 100.0
        }
    }

    /// Generate a summary report
    pub fn summary(&self) -> String {
        if self.passed {
            format!(
                "Gradient check passed\n\
                 Elements checked: {}\n\
                 Max relative error: {:.2e}\n\
                 Max absolute error: {:.2e}",
                self.num_elements_checked, self.max_relative_error, self.max_absolute_error
            )
        } else {
            format!(
                "Gradient check FAILED\n\
                 Elements checked: {}\n\
                 Failures: {} ({:.2}%)\n\
                 Max relative error: {:.2e}\n\
                 Max absolute error: {:.2e}\n\
                 {}",
                self.num_elements_checked,
                self.num_failures,
                self.failure_rate(),
                self.max_relative_error,
                self.max_absolute_error,
                self.error_message.as_deref().unwrap_or("")
            )
        }
    }
}

/// Numerical gradient checker
pub struct NumericalGradientChecker<T> {
    config: GradientCheckConfig,
    _phantom: PhantomData<T>,
}

impl<T> NumericalGradientChecker<T>
where
    T: Float + FromPrimitive + 'static,
{
    /// Create a new gradient checker with the given configuration
    pub fn new(config: GradientCheckConfig) -> Self {
        Self {
            config,
            _phantom: PhantomData,
        }
    }

    fn epsilon(&self) -> Result<T> {
        T::from_f64(self.config.epsilon).ok_or_else(|| {
            TensorError::invalid_argument_op(
                "numerical_gradient",
                &format!("epsilon {} is not representable", self.config.epsilon),
            )
        })
    }

    /// Derivative of `<cotangent, forward(x)>` along `direction`, by finite differences
    pub fn directional_derivative<F>(
        &self,
        input: &Tensor<T>,
        cotangent: &Tensor<T>,
        direction: &[T],
        forward: &F,
    ) -> Result<f64>
    where
        F: Fn(&Tensor<T>) -> Result<Tensor<T>>,
    {
        let epsilon = self.epsilon()?;
        let base = input.to_contiguous_vec();
        if direction.len() != base.len() {
            return Err(TensorError::shape_mismatch(
                "numerical_gradient",
                &format!("direction of {} elements", base.len()),
                &direction.len().to_string(),
            ));
        }
        let dims = input.shape().dims();
        let shifted = |sign: T| -> Result<f64> {
            let data = base
                .iter()
                .zip(direction)
                .map(|(&x, &d)| x + sign * epsilon * d)
                .collect();
            let output = forward(&Tensor::from_vec(data, dims)?)?;
            inner_product(cotangent, &output)
        };

        let eps = epsilon.to_f64().unwrap_or(self.config.epsilon);
        if self.config.use_central_difference {
            Ok((shifted(T::one())? - shifted(-T::one())?) / (2.0 * eps))
        } else {
            Ok((shifted(T::one())? - inner_product(cotangent, &forward(input)?)?) / eps)
        }
    }

    /// Full gradient of `<cotangent, forward(x)>` with respect to `x`, one element at a time
    pub fn compute_numerical_gradient<F>(
        &self,
        input: &Tensor<T>,
        cotangent: &Tensor<T>,
        forward: F,
    ) -> Result<Tensor<T>>
    where
        F: Fn(&Tensor<T>) -> Result<Tensor<T>>,
    {
        let numel = input.numel();
        let mut unit = vec![T::zero(); numel];
        let mut gradient = Vec::with_capacity(numel);

        for i in 0..numel {
            unit[i] = T::one();
            let derivative = self.directional_derivative(input, cotangent, &unit, &forward)?;
            unit[i] = T::zero();
            gradient.push(T::from_f64(derivative).unwrap_or_else(T::nan));
        }

        Tensor::from_vec(gradient, input.shape().dims())
    }

    /// Compare analytical and numerical gradients
    pub fn compare_gradients(
        &self,
        numerical: &Tensor<T>,
        analytical: &Tensor<T>,
    ) -> Result<GradientCheckResult> {
        if numerical.shape() != analytical.shape() {
            return Err(TensorError::shape_mismatch(
                "compare_gradients",
                &numerical.shape().to_string(),
                &analytical.shape().to_string(),
            ));
        }

        let pairs: Vec<(f64, f64)> = numerical
            .to_contiguous_vec()
            .into_iter()
            .zip(analytical.to_contiguous_vec())
            .map(|(n, a)| (n.to_f64().unwrap_or(f64::NAN), a.to_f64().unwrap_or(f64::NAN)))
            .collect();

        Ok(self.compare_values(&pairs))
    }

    fn compare_values(&self, pairs: &[(f64, f64)]) -> GradientCheckResult {
        let rtol = self.config.rtol;
        let atol = self.config.atol;

        let mut max_rel_error = 0.0f64;
        let mut max_abs_error = 0.0f64;
        let mut num_failures = 0;
        let mut failed_indices = Vec::new();

        for (i, &(num_val, ana_val)) in pairs.iter().enumerate() {
            let abs_error = (num_val - ana_val).abs();
            let rel_error = if ana_val.abs() > 1e-10 {
                abs_error / ana_val.abs()
            } else {
                abs_error
            };

            max_rel_error = max_rel_error.max(rel_error);
            max_abs_error = max_abs_error.max(abs_error);

            // NaN errors never compare below tolerance
            if !(rel_error <= rtol || abs_error <= atol) {
                num_failures += 1;
                if self.config.check_elementwise {
                    failed_indices.push(i);
                }
            }
        }

        let passed = num_failures == 0;
        let error_message = (!passed).then(|| {
            format!(
                "Gradient mismatch: {} of {} elements exceed tolerance (rtol={}, atol={})",
                num_failures,
                pairs.len(),
                rtol,
                atol
            )
        });

        GradientCheckResult {
            passed,
            max_relative_error: max_rel_error,
            max_absolute_error: max_abs_error,
            num_elements_checked: pairs.len(),
            num_failures,
            failed_indices,
            error_message,
        }
    }

    /// Full gradient check: compute numerical gradient and compare
    pub fn check<F, G>(
        &self,
        input: &Tensor<T>,
        cotangent: &Tensor<T>,
        forward: F,
        backward: G,
    ) -> Result<GradientCheckResult>
    where
        F: Fn(&Tensor<T>) -> Result<Tensor<T>>,
        G: Fn(&Tensor<T>, &Tensor<T>) -> Result<Tensor<T>>,
    {
        let numerical_grad = self.compute_numerical_gradient(input, cotangent, forward)?;
        let analytical_grad = backward(input, cotangent)?;

        self.compare_gradients(&numerical_grad, &analytical_grad)
    }

    /// Adjoint check along one direction
    pub fn check_adjoint<F, G>(
        &self,
        input: &Tensor<T>,
        cotangent: &Tensor<T>,
        direction: &Tensor<T>,
        forward: F,
        backward: G,
    ) -> Result<GradientCheckResult>
    where
        F: Fn(&Tensor<T>) -> Result<Tensor<T>>,
        G: Fn(&Tensor<T>, &Tensor<T>) -> Result<Tensor<T>>,
    {
        let numerical = self.directional_derivative(
            input,
            cotangent,
            &direction.to_contiguous_vec(),
            &forward,
        )?;
        let analytical = inner_product(&backward(input, cotangent)?, direction)?;
        log::debug!(
            "adjoint check: numerical {:.6e}, analytical {:.6e}",
            numerical,
            analytical
        );

        Ok(self.compare_values(&[(numerical, analytical)]))
    }
}

/// `sum(a * b)` accumulated in f64
fn inner_product<T: Float>(a: &Tensor<T>, b: &Tensor<T>) -> Result<f64> {
    if a.shape() != b.shape() {
        return Err(TensorError::shape_mismatch(
            "inner_product",
            &a.shape().to_string(),
            &b.shape().to_string(),
        ));
    }
    Ok(a
        .to_contiguous_vec()
        .into_iter()
        .zip(b.to_contiguous_vec())
        .map(|(x, y)| x.to_f64().unwrap_or(f64::NAN) * y.to_f64().unwrap_or(f64::NAN))
        .sum())
}

/// Convenience function for a full element-wise gradient check
pub fn check_gradients<T, F, G>(
    input: &Tensor<T>,
    cotangent: &Tensor<T>,
    forward: F,
    backward: G,
    config: &GradientCheckConfig,
) -> Result<GradientCheckResult>
where
    T: Float + FromPrimitive + 'static,
    F: Fn(&Tensor<T>) -> Result<Tensor<T>>,
    G: Fn(&Tensor<T>, &Tensor<T>) -> Result<Tensor<T>>,
{
    NumericalGradientChecker::new(config.clone()).check(input, cotangent, forward, backward)
}

/// Convenience function for a single-direction adjoint check
pub fn check_adjoint<T, F, G>(
    input: &Tensor<T>,
    cotangent: &Tensor<T>,
    direction: &Tensor<T>,
    forward: F,
    backward: G,
    config: &GradientCheckConfig,
) -> Result<GradientCheckResult>
where
    T: Float + FromPrimitive + 'static,
    F: Fn(&Tensor<T>) -> Result<Tensor<T>>,
    G: Fn(&Tensor<T>, &Tensor<T>) -> Result<Tensor<T>>,
{
    NumericalGradientChecker::new(config.clone()).check_adjoint(
        input, cotangent, direction, forward, backward,
    )
}
