//! LSTM layer with backpropagation through time.

use ndarray::{s, Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One recurrent layer returning its full output sequence.
///
/// Gate rows are stacked as `[input, forget, cell, output]`, each
/// `hidden_size` rows tall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmLayer {
    pub input_size: usize,
    pub hidden_size: usize,
    /// Input weights, `(4H, D)`.
    pub(crate) w: Array2<f64>,
    /// Recurrent weights, `(4H, H)`.
    pub(crate) u: Array2<f64>,
    pub(crate) b: Array1<f64>,
}

/// Gradient accumulators shaped like an [`LstmLayer`].
#[derive(Debug, Clone)]
pub struct LstmGrads {
    pub w: Array2<f64>,
    pub u: Array2<f64>,
    pub b: Array1<f64>,
}

impl LstmGrads {
    pub fn zeros_like(layer: &LstmLayer) -> Self {
        Self {
            w: Array2::zeros(layer.w.raw_dim()),
            u: Array2::zeros(layer.u.raw_dim()),
            b: Array1::zeros(layer.b.raw_dim()),
        }
    }

    pub fn fill(&mut self, value: f64) {
        self.w.fill(value);
        self.u.fill(value);
        self.b.fill(value);
    }

    pub fn scale(&mut self, factor: f64) {
        self.w *= factor;
        self.u *= factor;
        self.b *= factor;
    }
}

/// Activations of one time step, kept for the backward pass.
#[derive(Debug, Clone)]
struct StepCache {
    x: Array1<f64>,
    h_prev: Array1<f64>,
    c_prev: Array1<f64>,
    i: Array1<f64>,
    f: Array1<f64>,
    g: Array1<f64>,
    o: Array1<f64>,
    c: Array1<f64>,
}

/// Forward-pass record of a whole sequence.
#[derive(Debug, Clone, Default)]
pub struct LstmTrace {
    steps: Vec<StepCache>,
}

impl LstmLayer {
    pub fn new<R: Rng>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let gates = 4 * hidden_size;
        let w_limit = (6.0 / (input_size + hidden_size) as f64).sqrt();
        let u_limit = (1.0 / hidden_size as f64).sqrt();

        let w = Array2::from_shape_fn((gates, input_size), |_| rng.gen_range(-w_limit..w_limit));
        let u = Array2::from_shape_fn((gates, hidden_size), |_| rng.gen_range(-u_limit..u_limit));

        // Forget gate starts open
        let mut b = Array1::zeros(gates);
        b.slice_mut(s![hidden_size..2 * hidden_size]).fill(1.0);

        Self {
            input_size,
            hidden_size,
            w,
            u,
            b,
        }
    }

    fn step(&self, x: &Array1<f64>, h_prev: &Array1<f64>, c_prev: &Array1<f64>) -> StepCache {
        let h = self.hidden_size;
        let z = self.w.dot(x) + self.u.dot(h_prev) + &self.b;

        let i = z.slice(s![0..h]).mapv(sigmoid);
        let f = z.slice(s![h..2 * h]).mapv(sigmoid);
        let g = z.slice(s![2 * h..3 * h]).mapv(f64::tanh);
        let o = z.slice(s![3 * h..4 * h]).mapv(sigmoid);

        let c = &f * c_prev + &i * &g;

        StepCache {
            x: x.clone(),
            h_prev: h_prev.clone(),
            c_prev: c_prev.clone(),
            i,
            f,
            g,
            o,
            c,
        }
    }

    /// Run the layer over a sequence from a zero state.
    ///
    /// Returns the hidden state after every step and the trace needed by
    /// [`LstmLayer::backward`].
    pub fn forward(&self, inputs: &[Array1<f64>]) -> (Vec<Array1<f64>>, LstmTrace) {
        let mut h = Array1::zeros(self.hidden_size);
        let mut c = Array1::zeros(self.hidden_size);
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut trace = LstmTrace {
            steps: Vec::with_capacity(inputs.len()),
        };

        for x in inputs {
            let cache = self.step(x, &h, &c);
            h = &cache.o * &cache.c.mapv(f64::tanh);
            c = cache.c.clone();
            outputs.push(h.clone());
            trace.steps.push(cache);
        }

        (outputs, trace)
    }

    /// Backpropagate `d_outputs` (one gradient per output step) through
    /// time, accumulate parameter gradients into `grads`, and return the
    /// gradient for every input step.
    pub fn backward(
        &self,
        trace: &LstmTrace,
        d_outputs: &[Array1<f64>],
        grads: &mut LstmGrads,
    ) -> Vec<Array1<f64>> {
        let h = self.hidden_size;
        let mut dh_next = Array1::<f64>::zeros(h);
        let mut dc_next = Array1::<f64>::zeros(h);
        let mut d_inputs = vec![Array1::<f64>::zeros(self.input_size); trace.steps.len()];

        for t in (0..trace.steps.len()).rev() {
            let st = &trace.steps[t];
            let dh = &d_outputs[t] + &dh_next;

            let tanh_c = st.c.mapv(f64::tanh);
            let d_tanh_c = tanh_c.mapv(|v| 1.0 - v * v);

            let d_o = &dh * &tanh_c;
            let dc = (&dh * &st.o) * &d_tanh_c + &dc_next;

            let d_i = &dc * &st.g;
            let d_g = &dc * &st.i;
            let d_f = &dc * &st.c_prev;
            dc_next = &dc * &st.f;

            let mut dz = Array1::<f64>::zeros(4 * h);
            dz.slice_mut(s![0..h])
                .assign(&(d_i * &st.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![h..2 * h])
                .assign(&(d_f * &st.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![2 * h..3 * h])
                .assign(&(d_g * &st.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![3 * h..4 * h])
                .assign(&(d_o * &st.o.mapv(|v| v * (1.0 - v))));

            let dz_col = dz.view().insert_axis(Axis(1));
            grads.w += &dz_col.dot(&st.x.view().insert_axis(Axis(0)));
            grads.u += &dz_col.dot(&st.h_prev.view().insert_axis(Axis(0)));
            grads.b += &dz;

            d_inputs[t] = self.w.t().dot(&dz);
            dh_next = self.u.t().dot(&dz);
        }

        d_inputs
    }

    pub fn parameter_count(&self) -> usize {
        self.w.len() + self.u.len() + self.b.len()
    }
}

pub(crate) fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}
