use serde::{Deserialize, Serialize};

/// Activation function applied elementwise after every layer.
///
/// Each kind carries its forward function and its derivative. Inference only
/// uses [`Activation::apply`].
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Logistic sigmoid, output in `(0, 1)`.
    #[default]
    Sigmoid,
    /// Hyperbolic tangent, output in `(-1, 1)`.
    Tanh,
}

impl Activation {
    /// All supported kinds, in persisted-code order.
    pub const ALL: [Self; 2] = [Self::Sigmoid, Self::Tanh];

    #[must_use]
    pub fn apply(self, z: f64) -> f64 {
        match self {
            Self::Sigmoid => 1.0 / (1.0 + (-z).exp()),
            Self::Tanh => z.tanh(),
        }
    }

    #[must_use]
    pub fn derivative(self, z: f64) -> f64 {
        match self {
            Self::Sigmoid => {
                let s = self.apply(z);
                s * (1.0 - s)
            }
            Self::Tanh => 1.0 - z.tanh().powi(2),
        }
    }
}
