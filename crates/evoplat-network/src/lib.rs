//! Evolvable feedforward networks.
//!
//! A [`Network`] is a fixed-topology multilayer perceptron whose weight
//! matrices are the genome evolved by the training crate. The network is never
//! trained by gradients: it changes only through [`Network::mutate`] and
//! [`Network::crossover`].
//!
//! # Layout
//!
//! For a topology `[n0, n1, ..., nk]` there are `k` weight matrices. Matrix
//! `i` has `n_i + 1` rows and `n_{i+1}` columns; the extra first row holds bias
//! weights. Prediction prepends a column of ones to each layer input,
//! multiplies by the matrix and applies the [`Activation`] elementwise.
//!
//! # Example
//!
//! ```
//! use evoplat_network::Network;
//! use ndarray::Array2;
//!
//! let mut rng = rand::rng();
//! let network = Network::new(&[5, 3, 2], &mut rng).unwrap();
//! let output = network.predict(Array2::zeros((4, 5)).view()).unwrap();
//! assert_eq!(output.dim(), (4, 2));
//! ```

pub use self::{activation::Activation, network::Network};

pub mod activation;
pub mod network;
pub mod weights;

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum NetworkError {
    #[display("topology needs at least two layers, got {len}")]
    TooFewLayers { len: usize },
    #[display("layer {index} has zero width")]
    EmptyLayer { index: usize },
    #[display("expected {expected} weight matrices, got {actual}")]
    MatrixCount { expected: usize, actual: usize },
    #[display("weight matrix {index} has shape {actual:?}, expected {expected:?}")]
    MatrixShape {
        index: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },
    #[display("weight matrix {index} holds out-of-range value {value}")]
    WeightOutOfBounds { index: usize, value: f64 },
    #[display("input has {actual} columns, network expects {expected}")]
    InputWidth { expected: usize, actual: usize },
    #[display("parent topologies differ: {left:?} vs {right:?}")]
    TopologyMismatch { left: Vec<usize>, right: Vec<usize> },
    #[display("expected {expected} partition indices, got {actual}")]
    PartitionCount { expected: usize, actual: usize },
    #[display("partition {partition} of matrix {index} exceeds {columns} columns")]
    PartitionOutOfRange {
        index: usize,
        partition: usize,
        columns: usize,
    },
}
