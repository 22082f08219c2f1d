//! Multilayer perceptron for the two-state classification task.
//!
//! Mirrors the reference model: ReLU hidden layers, a single sigmoid output,
//! binary cross-entropy with L2 penalty, Adam updates over shuffled
//! mini-batches, and optional early stopping on a held-back validation split
//! of the training rows. All randomness (weight init, shuffles, the split)
//! comes from one seeded generator so identical inputs give identical models.

use log::debug;
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::MlpConfig;

const ADAM_BETA1: f64 = 0.9;
const ADAM_BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-8;

struct Layer {
    weights: Array2<f64>, // inputs x outputs
    bias: Array1<f64>,
    m_weights: Array2<f64>,
    v_weights: Array2<f64>,
    m_bias: Array1<f64>,
    v_bias: Array1<f64>,
}

impl Layer {
    fn new(inputs: usize, outputs: usize, rng: &mut StdRng) -> Self {
        // Glorot uniform init.
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights =
            Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..limit));
        Self {
            weights,
            bias: Array1::zeros(outputs),
            m_weights: Array2::zeros((inputs, outputs)),
            v_weights: Array2::zeros((inputs, outputs)),
            m_bias: Array1::zeros(outputs),
            v_bias: Array1::zeros(outputs),
        }
    }

    fn adam_step(
        &mut self,
        grad_weights: &Array2<f64>,
        grad_bias: &Array1<f64>,
        learning_rate: f64,
        step: usize,
    ) {
        let t = step as f64;
        let correct1 = 1.0 - ADAM_BETA1.powf(t);
        let correct2 = 1.0 - ADAM_BETA2.powf(t);

        self.m_weights = ADAM_BETA1 * &self.m_weights + (1.0 - ADAM_BETA1) * grad_weights;
        self.v_weights =
            ADAM_BETA2 * &self.v_weights + (1.0 - ADAM_BETA2) * grad_weights.mapv(|g| g * g);
        let m_hat = &self.m_weights / correct1;
        let v_hat = &self.v_weights / correct2;
        self.weights = &self.weights
            - learning_rate * &m_hat / (v_hat.mapv(f64::sqrt) + ADAM_EPSILON);

        self.m_bias = ADAM_BETA1 * &self.m_bias + (1.0 - ADAM_BETA1) * grad_bias;
        self.v_bias =
            ADAM_BETA2 * &self.v_bias + (1.0 - ADAM_BETA2) * grad_bias.mapv(|g| g * g);
        let mb_hat = &self.m_bias / correct1;
        let vb_hat = &self.v_bias / correct2;
        self.bias =
            &self.bias - learning_rate * &mb_hat / (vb_hat.mapv(f64::sqrt) + ADAM_EPSILON);
    }
}

pub struct MlpClassifier {
    config: MlpConfig,
    seed: u64,
    layers: Vec<Layer>,
    loss_curve: Vec<f64>,
}

impl MlpClassifier {
    pub fn new(config: MlpConfig, seed: u64) -> Self {
        Self {
            config,
            seed,
            layers: Vec::new(),
            loss_curve: Vec::new(),
        }
    }

    /// Train on the given rows. Refittable: state is rebuilt from the seed.
    pub fn fit(&mut self, x: &Array2<f64>, y: &[u8]) {
        assert_eq!(x.nrows(), y.len());
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.loss_curve.clear();
        self.init_layers(x.ncols(), &mut rng);

        // Hold back a validation slice of the training rows for early stopping.
        let mut indices: Vec<usize> = (0..x.nrows()).collect();
        indices.shuffle(&mut rng);
        let n_val = if self.config.early_stopping {
            ((x.nrows() as f64 * self.config.validation_fraction) as usize).min(x.nrows() - 1)
        } else {
            0
        };
        let (val_idx, train_idx) = indices.split_at(n_val);
        let val_idx = val_idx.to_vec();
        let mut train_idx = train_idx.to_vec();

        let mut best_val_score = f64::NEG_INFINITY;
        let mut epochs_without_improvement = 0;
        let mut step = 0usize;

        for epoch in 0..self.config.max_epochs {
            train_idx.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            let mut n_batches = 0usize;

            for batch in train_idx.chunks(self.config.batch_size.max(1)) {
                let batch_x = x.select(Axis(0), batch);
                let batch_y: Array1<f64> =
                    batch.iter().map(|&i| f64::from(y[i])).collect();
                step += 1;
                epoch_loss += self.train_batch(&batch_x, &batch_y, step);
                n_batches += 1;
            }
            if n_batches == 0 {
                break;
            }
            self.loss_curve.push(epoch_loss / n_batches as f64);

            if !val_idx.is_empty() {
                let val_x = x.select(Axis(0), &val_idx);
                let predictions = self.predict(&val_x);
                let correct = predictions
                    .iter()
                    .zip(val_idx.iter().map(|&i| y[i]))
                    .filter(|(&p, t)| p == *t)
                    .count();
                let score = correct as f64 / val_idx.len() as f64;
                if score > best_val_score + 1e-4 {
                    best_val_score = score;
                    epochs_without_improvement = 0;
                } else {
                    epochs_without_improvement += 1;
                    if epochs_without_improvement >= self.config.patience {
                        debug!("early stop at epoch {epoch}, val accuracy {best_val_score:.3}");
                        break;
                    }
                }
            }
        }
    }

    /// Predicted labels (0/1) at a 0.5 probability threshold.
    pub fn predict(&self, x: &Array2<f64>) -> Vec<u8> {
        self.predict_proba(x)
            .iter()
            .map(|&p| u8::from(p >= 0.5))
            .collect()
    }

    /// Probability of the focus class per row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Array1<f64> {
        let (activations, _) = self.forward(x);
        activations
            .last()
            .expect("model is fitted")
            .column(0)
            .to_owned()
    }

    /// Mean training loss per epoch, recorded during the last `fit`.
    pub fn loss_curve(&self) -> &[f64] {
        &self.loss_curve
    }

    fn init_layers(&mut self, n_features: usize, rng: &mut StdRng) {
        let mut sizes = vec![n_features];
        sizes.extend(&self.config.hidden_layers);
        sizes.push(1);
        self.layers = sizes
            .windows(2)
            .map(|pair| Layer::new(pair[0], pair[1], rng))
            .collect();
    }

    /// Forward pass; returns activations per layer (input first) and the
    /// pre-activation of each layer for backprop.
    fn forward(&self, x: &Array2<f64>) -> (Vec<Array2<f64>>, Vec<Array2<f64>>) {
        let n_layers = self.layers.len();
        let mut activations = vec![x.to_owned()];
        let mut pre_activations = Vec::with_capacity(n_layers);
        for (idx, layer) in self.layers.iter().enumerate() {
            let z = activations.last().unwrap().dot(&layer.weights) + &layer.bias;
            let a = if idx + 1 == n_layers {
                z.mapv(sigmoid)
            } else {
                z.mapv(|v| v.max(0.0))
            };
            pre_activations.push(z);
            activations.push(a);
        }
        (activations, pre_activations)
    }

    /// One Adam step over a mini-batch; returns the batch loss.
    fn train_batch(&mut self, x: &Array2<f64>, y: &Array1<f64>, step: usize) -> f64 {
        let batch_len = x.nrows() as f64;
        let (activations, pre_activations) = self.forward(x);
        let probabilities = activations.last().unwrap().column(0).to_owned();

        let mut loss = 0.0;
        for (&p, &t) in probabilities.iter().zip(y.iter()) {
            let p = p.clamp(1e-12, 1.0 - 1e-12);
            loss -= t * p.ln() + (1.0 - t) * (1.0 - p).ln();
        }
        loss /= batch_len;
        let l2: f64 = self
            .layers
            .iter()
            .map(|l| l.weights.iter().map(|w| w * w).sum::<f64>())
            .sum();
        loss += 0.5 * self.config.alpha * l2 / batch_len;

        // Output delta for sigmoid + cross-entropy.
        let mut delta = Array2::from_shape_fn((x.nrows(), 1), |(i, _)| {
            (probabilities[i] - y[i]) / batch_len
        });

        for idx in (0..self.layers.len()).rev() {
            let grad_weights = activations[idx].t().dot(&delta)
                + self.config.alpha / batch_len * &self.layers[idx].weights;
            let grad_bias = delta.sum_axis(Axis(0));

            if idx > 0 {
                let upstream = delta.dot(&self.layers[idx].weights.t());
                let relu_mask = pre_activations[idx - 1].mapv(|z| f64::from(z > 0.0));
                delta = upstream * relu_mask;
            }
            self.layers[idx].adam_step(
                &grad_weights,
                &grad_bias,
                self.config.learning_rate,
                step,
            );
        }
        loss
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
