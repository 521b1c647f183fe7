use super::neural_network::VaeOutput;
use crate::result::Result;
use candle_core::Tensor;
use derive_more::Display;
use serde::Serialize;

/// Probabilities are clamped to \[EPSILON, 1 - EPSILON\] before taking logs.
const EPSILON: f64 = 1e-7;

/// Criterion.
pub trait Criterion<X, T> {
    /// The output.
    type Output;
    /// Evaluates the criterion.
    fn eval(&self, input: X, target: T) -> Result<Self::Output>;
}

/// The reconstruction term of the loss.
///
/// Both variants add the [KL divergence](kl_divergence) of the latent distribution, with equal weight.
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LossKind {
    /// [Binary cross entropy](binary_cross_entropy).
    #[default]
    #[display(fmt = "BCE")]
    Bce,
    /// [Squared error](squared_error).
    #[display(fmt = "MSE")]
    Mse,
}

impl Criterion<&VaeOutput, &Tensor> for LossKind {
    type Output = Tensor;
    /// Computes the reconstruction loss plus the KL divergence, summed over the batch.
    fn eval(&self, output: &VaeOutput, target: &Tensor) -> Result<Tensor> {
        let reconstruction = match self {
            Self::Bce => binary_cross_entropy(&output.reconstruction, target)?,
            Self::Mse => squared_error(&output.reconstruction, target)?,
        };
        let kld = kl_divergence(&output.mean, &output.log_var)?;
        Ok(reconstruction.add(&kld)?)
    }
}

/// Binary cross entropy between probabilities `input` and `target`, summed.
pub fn binary_cross_entropy(input: &Tensor, target: &Tensor) -> Result<Tensor> {
    let input = input.clamp(EPSILON, 1. - EPSILON)?;
    let log_p = input.log()?;
    let log_q = input.affine(-1., 1.)?.log()?;
    let likelihood = target
        .mul(&log_p)?
        .add(&target.affine(-1., 1.)?.mul(&log_q)?)?;
    Ok(likelihood.sum_all()?.neg()?)
}

/// Squared error between `input` and `target`, summed.
pub fn squared_error(input: &Tensor, target: &Tensor) -> Result<Tensor> {
    Ok(input.sub(target)?.sqr()?.sum_all()?)
}

/// KL divergence between N(mean, exp(log_var)) and N(0, 1), summed.
///
/// -0.5 * sum(1 + log_var - mean^2 - exp(log_var))
pub fn kl_divergence(mean: &Tensor, log_var: &Tensor) -> Result<Tensor> {
    let terms = log_var
        .affine(1., 1.)?
        .sub(&mean.sqr()?)?
        .sub(&log_var.exp()?)?;
    Ok(terms.sum_all()?.affine(-0.5, 0.)?)
}
