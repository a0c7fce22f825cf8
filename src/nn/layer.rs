use rand::rngs::StdRng;

use super::{
    Dense, Dropout, Flatten, Input, Lambda, Layer, OptimizerFactory, ReLU, ShapeBinding, Sigmoid,
    Softmax,
};
use crate::error::Result;
use crate::tensor::{Shape, Tensor};

/// Any layer a [`Sequential`](super::Sequential) model can hold
#[derive(Debug, Clone)]
pub enum AnyLayer {
    Input(Input),
    Dense(Dense),
    Flatten(Flatten),
    Dropout(Dropout),
    ReLU(ReLU),
    Sigmoid(Sigmoid),
    Softmax(Softmax),
    Lambda(Lambda),
}

macro_rules! dispatch {
    ($self:ident, $layer:ident => $body:expr) => {
        match $self {
            AnyLayer::Input($layer) => $body,
            AnyLayer::Dense($layer) => $body,
            AnyLayer::Flatten($layer) => $body,
            AnyLayer::Dropout($layer) => $body,
            AnyLayer::ReLU($layer) => $body,
            AnyLayer::Sigmoid($layer) => $body,
            AnyLayer::Softmax($layer) => $body,
            AnyLayer::Lambda($layer) => $body,
        }
    };
}

macro_rules! impl_from {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for AnyLayer {
                fn from(layer: $variant) -> Self {
                    AnyLayer::$variant(layer)
                }
            }
        )*
    };
}

impl_from!(Input, Dense, Flatten, Dropout, ReLU, Sigmoid, Softmax, Lambda);

impl AnyLayer {
    /// Number of trainable scalars
    pub fn param_count(&self) -> usize {
        self.params().iter().map(|p| p.numel()).sum()
    }
}

impl Layer for AnyLayer {
    fn name(&self) -> &'static str {
        dispatch!(self, l => l.name())
    }

    fn binding(&self) -> Option<&ShapeBinding> {
        dispatch!(self, l => l.binding())
    }

    fn init(&mut self, input_shape: &Shape, factory: &OptimizerFactory, rng: &mut StdRng) -> Result<Shape> {
        dispatch!(self, l => l.init(input_shape, factory, rng))
    }

    fn call(&self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        dispatch!(self, l => l.call(inputs))
    }

    fn forward(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        dispatch!(self, l => l.forward(inputs))
    }

    fn backward(&mut self, douts: &[Tensor]) -> Result<Vec<Tensor>> {
        dispatch!(self, l => l.backward(douts))
    }

    fn update(&mut self) -> Result<()> {
        dispatch!(self, l => l.update())
    }

    fn params(&self) -> Vec<&Tensor> {
        dispatch!(self, l => l.params())
    }
}
