//! Adam optimiser over the forecast model parameters.

use super::{ForecastModel, Gradients};
use ndarray::{Array, Dimension, Zip};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const EPSILON: f64 = 1e-7;

struct StepSize {
    lr: f64,
    bias1: f64,
    bias2: f64,
}

pub struct Adam {
    learning_rate: f64,
    t: i32,
    m: Gradients,
    v: Gradients,
}

impl Adam {
    pub fn new(model: &ForecastModel, learning_rate: f64) -> Self {
        Self {
            learning_rate,
            t: 0,
            m: Gradients::zeros_like(model),
            v: Gradients::zeros_like(model),
        }
    }

    /// Apply one update with already batch-averaged gradients.
    pub fn step(&mut self, model: &mut ForecastModel, grads: &Gradients) {
        self.t += 1;
        let hp = StepSize {
            lr: self.learning_rate,
            bias1: 1.0 - BETA1.powi(self.t),
            bias2: 1.0 - BETA2.powi(self.t),
        };

        for (k, layer) in model.lstm.iter_mut().enumerate() {
            let g = &grads.lstm[k];
            let m = &mut self.m.lstm[k];
            let v = &mut self.v.lstm[k];
            update(&mut layer.w, &g.w, &mut m.w, &mut v.w, &hp);
            update(&mut layer.u, &g.u, &mut m.u, &mut v.u, &hp);
            update(&mut layer.b, &g.b, &mut m.b, &mut v.b, &hp);
        }

        for (k, layer) in model.dense.iter_mut().enumerate() {
            let g = &grads.dense[k];
            let m = &mut self.m.dense[k];
            let v = &mut self.v.dense[k];
            update(&mut layer.weights, &g.weights, &mut m.weights, &mut v.weights, &hp);
            update(&mut layer.biases, &g.biases, &mut m.biases, &mut v.biases, &hp);
        }
    }
}

fn update<D: Dimension>(
    param: &mut Array<f64, D>,
    grad: &Array<f64, D>,
    m: &mut Array<f64, D>,
    v: &mut Array<f64, D>,
    hp: &StepSize,
) {
    Zip::from(param)
        .and(grad)
        .and(m)
        .and(v)
        .for_each(|p, &g, mi, vi| {
            *mi = BETA1 * *mi + (1.0 - BETA1) * g;
            *vi = BETA2 * *vi + (1.0 - BETA2) * g * g;
            let m_hat = *mi / hp.bias1;
            let v_hat = *vi / hp.bias2;
            *p -= hp.lr * m_hat / (v_hat.sqrt() + EPSILON);
        });
}
