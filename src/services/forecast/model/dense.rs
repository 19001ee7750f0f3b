//! Fully connected projection layer.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Activation applied after the affine map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    Relu,
    Linear,
}

impl Activation {
    fn apply(&self, v: f64) -> f64 {
        match self {
            Activation::Relu => v.max(0.0),
            Activation::Linear => v,
        }
    }

    fn derivative(&self, pre: f64) -> f64 {
        match self {
            Activation::Relu => {
                if pre > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Linear => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    /// `(out, in)`.
    pub(crate) weights: Array2<f64>,
    pub(crate) biases: Array1<f64>,
    pub activation: Activation,
}

#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub weights: Array2<f64>,
    pub biases: Array1<f64>,
}

impl DenseGrads {
    pub fn zeros_like(layer: &Dense) -> Self {
        Self {
            weights: Array2::zeros(layer.weights.raw_dim()),
            biases: Array1::zeros(layer.biases.raw_dim()),
        }
    }

    pub fn fill(&mut self, value: f64) {
        self.weights.fill(value);
        self.biases.fill(value);
    }

    pub fn scale(&mut self, factor: f64) {
        self.weights *= factor;
        self.biases *= factor;
    }
}

impl Dense {
    pub fn new<R: Rng>(input_size: usize, output_size: usize, activation: Activation, rng: &mut R) -> Self {
        let limit = match activation {
            Activation::Relu => (6.0 / input_size as f64).sqrt(),
            Activation::Linear => (6.0 / (input_size + output_size) as f64).sqrt(),
        };

        Self {
            weights: Array2::from_shape_fn((output_size, input_size), |_| {
                rng.gen_range(-limit..limit)
            }),
            biases: Array1::zeros(output_size),
            activation,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.weights.nrows()
    }

    /// Returns `(pre_activation, output)`.
    pub fn forward(&self, x: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        let pre = self.weights.dot(x) + &self.biases;
        let activation = self.activation;
        let out = pre.mapv(|v| activation.apply(v));
        (pre, out)
    }

    /// Accumulate gradients for one sample and return the input gradient.
    pub fn backward(
        &self,
        x: &Array1<f64>,
        pre: &Array1<f64>,
        d_out: &Array1<f64>,
        grads: &mut DenseGrads,
    ) -> Array1<f64> {
        let activation = self.activation;
        let d_pre = d_out * &pre.mapv(|v| activation.derivative(v));

        grads.weights += &d_pre
            .view()
            .insert_axis(Axis(1))
            .dot(&x.view().insert_axis(Axis(0)));
        grads.biases += &d_pre;

        self.weights.t().dot(&d_pre)
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_forward_linear() {
        let layer = Dense {
            weights: array![[1.0, 2.0], [-1.0, 0.5]],
            biases: array![0.5, 0.0],
            activation: Activation::Linear,
        };
        let (_, out) = layer.forward(&array![1.0, 2.0]);
        assert_eq!(out, array![5.5, 0.0]);
    }

    #[test]
    fn test_forward_relu_clips_negative() {
        let layer = Dense {
            weights: array![[1.0], [-1.0]],
            biases: array![0.0, 0.0],
            activation: Activation::Relu,
        };
        let (pre, out) = layer.forward(&array![2.0]);
        assert_eq!(pre, array![2.0, -2.0]);
        assert_eq!(out, array![2.0, 0.0]);
    }

    #[test]
    fn test_backward_gradients() {
        let layer = Dense {
            weights: array![[1.0, 2.0], [3.0, 4.0]],
            biases: array![0.0, 0.0],
            activation: Activation::Linear,
        };
        let x = array![1.0, -1.0];
        let (pre, _) = layer.forward(&x);
        let mut grads = DenseGrads::zeros_like(&layer);
        let dx = layer.backward(&x, &pre, &array![1.0, 0.5], &mut grads);

        assert_eq!(grads.weights, array![[1.0, -1.0], [0.5, -0.5]]);
        assert_eq!(grads.biases, array![1.0, 0.5]);
        assert_eq!(dx, array![2.5, 4.0]);
    }

    #[test]
    fn test_new_shapes() {
        let mut rng = StdRng::seed_from_u64(5);
        let layer = Dense::new(50, 25, Activation::Relu, &mut rng);
        assert_eq!(layer.input_size(), 50);
        assert_eq!(layer.output_size(), 25);
        assert_eq!(layer.parameter_count(), 50 * 25 + 25);
    }
}
