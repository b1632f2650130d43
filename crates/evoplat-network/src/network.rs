use std::fmt;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis, s};
use rand::Rng;

use crate::{Activation, NetworkError, weights};

/// Mutation probability of the randomizing pass applied at construction.
pub const INITIAL_MUTATION_RATE: f64 = 0.5;
/// Mutation deviation of the randomizing pass applied at construction.
pub const INITIAL_MUTATION_DEVIATION: f64 = 0.5;

/// A fixed-topology feedforward network whose weight matrices form the genome.
///
/// Matrix `i` has shape `(shape[i] + 1, shape[i + 1])`. Row 0 holds the bias
/// weights; it multiplies a constant `1` column prepended to the layer input.
///
/// `Clone` is a deep copy: the clone owns independent matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    shape: Vec<usize>,
    weights: Vec<Array2<f64>>,
    activation: Activation,
}

impl Network {
    /// Creates a sigmoid network with randomized weights.
    ///
    /// Weights start at zero and receive one mutation pass with
    /// [`INITIAL_MUTATION_RATE`] and [`INITIAL_MUTATION_DEVIATION`].
    pub fn new<R>(topology: &[usize], rng: &mut R) -> Result<Self, NetworkError>
    where
        R: Rng + ?Sized,
    {
        Self::with_activation(topology, Activation::default(), rng)
    }

    /// Creates a randomized network using the given activation kind.
    pub fn with_activation<R>(
        topology: &[usize],
        activation: Activation,
        rng: &mut R,
    ) -> Result<Self, NetworkError>
    where
        R: Rng + ?Sized,
    {
        let mut network = Self::zeroed(topology, activation)?;
        network.mutate(INITIAL_MUTATION_RATE, INITIAL_MUTATION_DEVIATION, rng);
        Ok(network)
    }

    /// Creates a network with every weight set to zero.
    pub fn zeroed(topology: &[usize], activation: Activation) -> Result<Self, NetworkError> {
        validate_topology(topology)?;
        let weights = topology
            .windows(2)
            .map(|pair| Array2::zeros((pair[0] + 1, pair[1])))
            .collect();
        Ok(Self {
            shape: topology.to_vec(),
            weights,
            activation,
        })
    }

    /// Rebuilds a network from existing weight matrices.
    ///
    /// Every matrix must match the shape rule and every weight must satisfy the
    /// magnitude bounds of [`weights`].
    pub fn from_weights(
        activation: Activation,
        shape: Vec<usize>,
        matrices: Vec<Array2<f64>>,
    ) -> Result<Self, NetworkError> {
        validate_topology(&shape)?;
        if matrices.len() != shape.len() - 1 {
            return Err(NetworkError::MatrixCount {
                expected: shape.len() - 1,
                actual: matrices.len(),
            });
        }
        for (index, (pair, w)) in shape.windows(2).zip(&matrices).enumerate() {
            let expected = (pair[0] + 1, pair[1]);
            if w.dim() != expected {
                return Err(NetworkError::MatrixShape {
                    index,
                    expected,
                    actual: w.dim(),
                });
            }
            if let Some(&value) = w.iter().find(|v| !weights::is_within_bounds(**v)) {
                return Err(NetworkError::WeightOutOfBounds { index, value });
            }
        }
        Ok(Self {
            shape,
            weights: matrices,
            activation,
        })
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    #[must_use]
    pub fn weights(&self) -> &[Array2<f64>] {
        &self.weights
    }

    #[must_use]
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Width of the input layer.
    #[must_use]
    pub fn input_width(&self) -> usize {
        self.shape[0]
    }

    /// Total number of weights, bias rows included.
    #[must_use]
    pub fn weight_count(&self) -> usize {
        self.weights.iter().map(|w| w.len()).sum()
    }

    /// Feeds a batch of input rows forward through every layer.
    ///
    /// Returns one output row per input row.
    pub fn predict(&self, input: ArrayView2<'_, f64>) -> Result<Array2<f64>, NetworkError> {
        if input.ncols() != self.input_width() {
            return Err(NetworkError::InputWidth {
                expected: self.input_width(),
                actual: input.ncols(),
            });
        }

        let activation = self.activation;
        let mut current = input.to_owned();
        for w in &self.weights {
            let mut with_bias = Array2::ones((current.nrows(), current.ncols() + 1));
            with_bias.slice_mut(s![.., 1..]).assign(&current);
            current = with_bias.dot(w);
            current.mapv_inplace(|z| activation.apply(z));
        }
        Ok(current)
    }

    /// Feeds a single input row forward.
    pub fn predict_one(&self, input: &[f64]) -> Result<Array1<f64>, NetworkError> {
        let batch = ArrayView1::from(input).insert_axis(Axis(0));
        let output = self.predict(batch)?;
        Ok(output.row(0).to_owned())
    }

    /// Returns the index of the strongest output for a single input row.
    ///
    /// Ties resolve to the lowest index.
    pub fn decide(&self, input: &[f64]) -> Result<usize, NetworkError> {
        let output = self.predict_one(input)?;
        let mut best = 0;
        for (i, &value) in output.iter().enumerate() {
            if value > output[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// Perturbs each weight independently; see [`weights::mutate`].
    pub fn mutate<R>(&mut self, probability: f64, deviation: f64, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        for w in &mut self.weights {
            weights::mutate(w.iter_mut(), probability, deviation, rng);
        }
    }

    /// Creates a child by single-point column crossover, one point per matrix.
    ///
    /// The child starts as a copy of `a`. For each matrix a partition
    /// `k` is drawn from `1..=columns` and columns `k..` are taken from `b`.
    pub fn crossover<R>(a: &Self, b: &Self, rng: &mut R) -> Result<Self, NetworkError>
    where
        R: Rng + ?Sized,
    {
        ensure_same_layout(a, b)?;
        let partitions = a
            .weights
            .iter()
            .map(|w| rng.random_range(1..=w.ncols()))
            .collect::<Vec<_>>();
        Self::crossover_at(a, b, &partitions)
    }

    /// Column crossover with explicit partition indices, one per matrix.
    pub fn crossover_at(a: &Self, b: &Self, partitions: &[usize]) -> Result<Self, NetworkError> {
        ensure_same_layout(a, b)?;
        if partitions.len() != a.weights.len() {
            return Err(NetworkError::PartitionCount {
                expected: a.weights.len(),
                actual: partitions.len(),
            });
        }

        let mut child = a.clone();
        for (index, ((w, b_w), &k)) in child
            .weights
            .iter_mut()
            .zip(&b.weights)
            .zip(partitions)
            .enumerate()
        {
            if k > w.ncols() {
                return Err(NetworkError::PartitionOutOfRange {
                    index,
                    partition: k,
                    columns: w.ncols(),
                });
            }
            w.slice_mut(s![.., k..]).assign(&b_w.slice(s![.., k..]));
        }
        Ok(child)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, w) in self.weights.iter().enumerate() {
            writeln!(f, "W_{i}:")?;
            for row in w.rows() {
                let cells = row
                    .iter()
                    .map(|v| format!("{v:>7.4}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(f, "[{cells}]")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Checks that `topology` has at least two layers and no empty layer.
pub fn validate_topology(topology: &[usize]) -> Result<(), NetworkError> {
    if topology.len() < 2 {
        return Err(NetworkError::TooFewLayers {
            len: topology.len(),
        });
    }
    if let Some(index) = topology.iter().position(|&width| width == 0) {
        return Err(NetworkError::EmptyLayer { index });
    }
    Ok(())
}

fn ensure_same_layout(a: &Network, b: &Network) -> Result<(), NetworkError> {
    if a.shape != b.shape {
        return Err(NetworkError::TopologyMismatch {
            left: a.shape.clone(),
            right: b.shape.clone(),
        });
    }
    Ok(())
}
