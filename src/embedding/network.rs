//! Three-layer feed-forward embedding network.
//!
//! Architecture: `input → Dense(h1) → ReLU → Dense(h2) → ReLU → Dense(emb) → L2 norm`.
//! Forward and backward passes are written out by hand over `ndarray`
//! row-matrices; a single example is a `1 × n` batch.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::encoder::FeatureEncoder;
use super::vocab::CharVocabulary;
use crate::error::{Error, Result};

/// Floor applied to norms before division.
pub const NORM_EPSILON: f32 = 1e-8;

/// Standard deviation of the weights assigned by [`EmbeddingNetwork::pretrained`].
pub const PRETRAINED_WEIGHT_STD: f32 = 0.1;

/// Layer dimensions. Fixed for the lifetime of a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub input_dim: usize,
    pub hidden1_dim: usize,
    pub hidden2_dim: usize,
    pub embedding_dim: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_dim: 100,
            hidden1_dim: 128,
            hidden2_dim: 64,
            embedding_dim: 32,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        let dims = [
            ("input_dim", self.input_dim),
            ("hidden1_dim", self.hidden1_dim),
            ("hidden2_dim", self.hidden2_dim),
            ("embedding_dim", self.embedding_dim),
        ];
        for (name, dim) in dims {
            if dim == 0 {
                return Err(Error::invalid_config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }

    /// `(fan_in, fan_out)` of each dense layer, input to output.
    pub fn layer_shapes(&self) -> [(usize, usize); 3] {
        [
            (self.input_dim, self.hidden1_dim),
            (self.hidden1_dim, self.hidden2_dim),
            (self.hidden2_dim, self.embedding_dim),
        ]
    }
}

/// Weight matrices and bias vectors of the three dense layers.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkWeights {
    pub w1: Array2<f32>,
    pub b1: Array1<f32>,
    pub w2: Array2<f32>,
    pub b2: Array1<f32>,
    pub w3: Array2<f32>,
    pub b3: Array1<f32>,
}

impl NetworkWeights {
    /// He initialisation: `N(0, 1) * sqrt(2 / fan_in)` per layer, zero biases.
    pub fn he_normal(config: &NetworkConfig, rng: &mut StdRng) -> Result<Self> {
        let [l1, l2, l3] = config.layer_shapes();
        Ok(Self {
            w1: normal_matrix(l1, (2.0 / l1.0 as f32).sqrt(), rng)?,
            b1: Array1::zeros(l1.1),
            w2: normal_matrix(l2, (2.0 / l2.0 as f32).sqrt(), rng)?,
            b2: Array1::zeros(l2.1),
            w3: normal_matrix(l3, (2.0 / l3.0 as f32).sqrt(), rng)?,
            b3: Array1::zeros(l3.1),
        })
    }

    /// Every weight drawn from `N(0, std)`, zero biases.
    pub fn scaled_normal(config: &NetworkConfig, std: f32, rng: &mut StdRng) -> Result<Self> {
        let [l1, l2, l3] = config.layer_shapes();
        Ok(Self {
            w1: normal_matrix(l1, std, rng)?,
            b1: Array1::zeros(l1.1),
            w2: normal_matrix(l2, std, rng)?,
            b2: Array1::zeros(l2.1),
            w3: normal_matrix(l3, std, rng)?,
            b3: Array1::zeros(l3.1),
        })
    }

    /// Check every matrix and bias against the shapes `config` declares.
    pub fn validate(&self, config: &NetworkConfig) -> Result<()> {
        let [l1, l2, l3] = config.layer_shapes();
        check_matrix("W1", &self.w1, l1)?;
        check_bias("b1", &self.b1, l1.1)?;
        check_matrix("W2", &self.w2, l2)?;
        check_bias("b2", &self.b2, l2.1)?;
        check_matrix("W3", &self.w3, l3)?;
        check_bias("b3", &self.b3, l3.1)?;
        Ok(())
    }

    pub fn parameter_count(&self) -> usize {
        self.w1.len()
            + self.b1.len()
            + self.w2.len()
            + self.b2.len()
            + self.w3.len()
            + self.b3.len()
    }
}

fn normal_matrix(shape: (usize, usize), std: f32, rng: &mut StdRng) -> Result<Array2<f32>> {
    let normal = Normal::new(0.0f32, std)
        .map_err(|e| Error::invalid_config(format!("invalid weight scale {std}: {e}")))?;
    Ok(Array2::from_shape_fn(shape, |_| normal.sample(&mut *rng)))
}

fn check_matrix(name: &str, m: &Array2<f32>, expected: (usize, usize)) -> Result<()> {
    if m.dim() != expected {
        return Err(Error::format(format!(
            "{name} has shape {}x{}, expected {}x{}",
            m.nrows(),
            m.ncols(),
            expected.0,
            expected.1
        )));
    }
    Ok(())
}

fn check_bias(name: &str, b: &Array1<f32>, expected: usize) -> Result<()> {
    if b.len() != expected {
        return Err(Error::format(format!(
            "{name} has length {}, expected {expected}",
            b.len()
        )));
    }
    Ok(())
}

/// Intermediate activations retained by [`EmbeddingNetwork::forward`] for the
/// matching backward call. Only valid against the weights that produced it.
#[derive(Debug, Clone)]
pub struct ForwardCache {
    x: Array2<f32>,
    z1: Array2<f32>,
    a1: Array2<f32>,
    z2: Array2<f32>,
    a2: Array2<f32>,
    z3: Array2<f32>,
}

impl ForwardCache {
    /// Number of examples (rows) in the cached batch.
    pub fn batch_size(&self) -> usize {
        self.x.nrows()
    }

    /// Pre-normalisation output of the last layer.
    pub fn z3(&self) -> &Array2<f32> {
        &self.z3
    }
}

/// Per-parameter gradients, shaped like [`NetworkWeights`].
#[derive(Debug, Clone, PartialEq)]
pub struct Gradients {
    pub w1: Array2<f32>,
    pub b1: Array1<f32>,
    pub w2: Array2<f32>,
    pub b2: Array1<f32>,
    pub w3: Array2<f32>,
    pub b3: Array1<f32>,
}

impl Gradients {
    pub fn zeros(config: &NetworkConfig) -> Self {
        let [l1, l2, l3] = config.layer_shapes();
        Self {
            w1: Array2::zeros(l1),
            b1: Array1::zeros(l1.1),
            w2: Array2::zeros(l2),
            b2: Array1::zeros(l2.1),
            w3: Array2::zeros(l3),
            b3: Array1::zeros(l3.1),
        }
    }

    pub fn accumulate(&mut self, other: &Gradients) {
        self.w1 += &other.w1;
        self.b1 += &other.b1;
        self.w2 += &other.w2;
        self.b2 += &other.b2;
        self.w3 += &other.w3;
        self.b3 += &other.b3;
    }

    pub fn scale(&mut self, factor: f32) {
        self.w1 *= factor;
        self.b1 *= factor;
        self.w2 *= factor;
        self.b2 *= factor;
        self.w3 *= factor;
        self.b3 *= factor;
    }
}

#[inline]
fn relu(z: f32) -> f32 {
    z.max(0.0)
}

#[inline]
fn relu_grad(z: f32) -> f32 {
    if z > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Backward through `e = z / ‖z‖`, row by row: the radial component of the
/// gradient is removed and the rest scaled by `1 / ‖z‖`. Rows at or below
/// the norm floor pass the gradient through unchanged.
fn normalize_backward(z: &Array2<f32>, grad: ArrayView2<f32>) -> Array2<f32> {
    let mut dz = grad.to_owned();
    for (mut dz_row, z_row) in dz.rows_mut().into_iter().zip(z.rows()) {
        let norm = z_row.dot(&z_row).sqrt();
        if norm <= NORM_EPSILON {
            continue;
        }
        let unit = &z_row / norm;
        let radial = unit.dot(&dz_row);
        dz_row.scaled_add(-radial, &unit);
        dz_row /= norm;
    }
    dz
}

/// The embedding network: encoder, layer configuration, weights, and the
/// informational `trained` flag.
#[derive(Debug, Clone)]
pub struct EmbeddingNetwork {
    config: NetworkConfig,
    encoder: FeatureEncoder,
    weights: NetworkWeights,
    trained: bool,
}

impl EmbeddingNetwork {
    /// Fresh, untrained network with He-initialised weights drawn from a
    /// `StdRng` seeded with `seed`.
    pub fn new(config: NetworkConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let weights = NetworkWeights::he_normal(&config, &mut rng)?;
        Self::from_parts(config, CharVocabulary::default(), weights, false)
    }

    /// Network with small-scale normal weights assigned directly, marked as
    /// trained without running any training.
    pub fn pretrained(config: NetworkConfig, seed: u64) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let weights = NetworkWeights::scaled_normal(&config, PRETRAINED_WEIGHT_STD, &mut rng)?;
        Self::from_parts(config, CharVocabulary::default(), weights, true)
    }

    /// Assemble a network from existing parameters, validating every shape.
    pub fn from_parts(
        config: NetworkConfig,
        vocabulary: CharVocabulary,
        weights: NetworkWeights,
        trained: bool,
    ) -> Result<Self> {
        config.validate().map_err(|e| Error::format(e.to_string()))?;
        weights.validate(&config)?;
        Ok(Self {
            encoder: FeatureEncoder::new(vocabulary, config.input_dim),
            config,
            weights,
            trained,
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn vocabulary(&self) -> &CharVocabulary {
        self.encoder.vocabulary()
    }

    pub fn weights(&self) -> &NetworkWeights {
        &self.weights
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub(crate) fn set_trained(&mut self, trained: bool) {
        self.trained = trained;
    }

    /// Consume the network, returning its parts.
    pub fn into_parts(self) -> (NetworkConfig, CharVocabulary, NetworkWeights, bool) {
        let vocabulary = self.encoder.vocabulary().clone();
        (self.config, vocabulary, self.weights, self.trained)
    }

    pub fn encode(&self, field_name: &str) -> Vec<f32> {
        self.encoder.encode(field_name)
    }

    /// Unit-length embedding of a field name.
    pub fn embed(&self, field_name: &str) -> Vec<f32> {
        let x = Array1::from(self.encode(field_name)).insert_axis(Axis(0));
        let (embedding, _) = self.forward_pass(x.view());
        embedding.row(0).to_vec()
    }

    /// Forward a single feature vector of length `input_dim`.
    pub fn forward(&self, x: &[f32]) -> Result<(Vec<f32>, ForwardCache)> {
        let (embedding, cache) = self.forward_batch(ArrayView1::from(x).insert_axis(Axis(0)))?;
        Ok((embedding.row(0).to_vec(), cache))
    }

    /// Forward a batch of feature vectors, one per row.
    pub fn forward_batch(&self, x: ArrayView2<f32>) -> Result<(Array2<f32>, ForwardCache)> {
        if x.ncols() != self.config.input_dim {
            return Err(Error::invalid_config(format!(
                "feature vector has {} values, network expects {}",
                x.ncols(),
                self.config.input_dim
            )));
        }
        Ok(self.forward_pass(x))
    }

    fn forward_pass(&self, x: ArrayView2<f32>) -> (Array2<f32>, ForwardCache) {
        let w = &self.weights;

        let z1 = x.dot(&w.w1) + &w.b1;
        let a1 = z1.mapv(relu);
        let z2 = a1.dot(&w.w2) + &w.b2;
        let a2 = z2.mapv(relu);
        let z3 = a2.dot(&w.w3) + &w.b3;

        let mut embedding = z3.clone();
        for mut row in embedding.rows_mut() {
            let norm = row.iter().map(|v| v * v).sum::<f32>().sqrt().max(NORM_EPSILON);
            row.mapv_inplace(|v| v / norm);
        }

        let cache = ForwardCache {
            x: x.to_owned(),
            z1,
            a1,
            z2,
            a2,
            z3,
        };
        (embedding, cache)
    }

    /// Reverse-mode gradients for every parameter given the gradient of the
    /// loss with respect to the normalised embedding. The chain rule runs
    /// back through the L2 normalisation, then the three dense layers.
    /// Divided by the cached batch size; computed against the current weights.
    pub fn gradients(&self, cache: &ForwardCache, grad_embedding: &[f32]) -> Result<Gradients> {
        let m = cache.batch_size();
        let grad = ArrayView2::from_shape((m, self.config.embedding_dim), grad_embedding)
            .map_err(|_| {
                Error::invalid_config(format!(
                    "embedding gradient has {} values, expected {}",
                    grad_embedding.len(),
                    m * self.config.embedding_dim
                ))
            })?;
        let dz3 = normalize_backward(&cache.z3, grad);
        let w = &self.weights;
        let m = m as f32;

        let dw3 = cache.a2.t().dot(&dz3) / m;
        let db3 = dz3.sum_axis(Axis(0)) / m;

        let da2 = dz3.dot(&w.w3.t());
        let dz2 = da2 * &cache.z2.mapv(relu_grad);
        let dw2 = cache.a1.t().dot(&dz2) / m;
        let db2 = dz2.sum_axis(Axis(0)) / m;

        let da1 = dz2.dot(&w.w2.t());
        let dz1 = da1 * &cache.z1.mapv(relu_grad);
        let dw1 = cache.x.t().dot(&dz1) / m;
        let db1 = dz1.sum_axis(Axis(0)) / m;

        Ok(Gradients {
            w1: dw1,
            b1: db1,
            w2: dw2,
            b2: db2,
            w3: dw3,
            b3: db3,
        })
    }

    /// Plain SGD step: `param -= learning_rate * grad`.
    pub fn apply_gradients(&mut self, grads: &Gradients, learning_rate: f32) {
        let w = &mut self.weights;
        w.w1.scaled_add(-learning_rate, &grads.w1);
        w.b1.scaled_add(-learning_rate, &grads.b1);
        w.w2.scaled_add(-learning_rate, &grads.w2);
        w.b2.scaled_add(-learning_rate, &grads.b2);
        w.w3.scaled_add(-learning_rate, &grads.w3);
        w.b3.scaled_add(-learning_rate, &grads.b3);
    }

    /// Compute gradients from `cache` and apply them in place.
    pub fn backward(
        &mut self,
        cache: &ForwardCache,
        grad_embedding: &[f32],
        learning_rate: f32,
    ) -> Result<()> {
        let grads = self.gradients(cache, grad_embedding)?;
        self.apply_gradients(&grads, learning_rate);
        Ok(())
    }
}
