// ============================================================
// Layer 5 — Bottleneck Adapter
// ============================================================
// A small residual MLP inserted after each encoder block:
//
//   adapter(h) = h + up(relu(down(h)))
//
//   down: d_model → d_model / reduction_factor
//   up:   d_model / reduction_factor → d_model
//
// `up` starts at zero, so a freshly added adapter is the identity
// and the frozen encoder's behaviour is unchanged until training
// moves it.

use burn::{
    nn::{Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};

#[derive(Config, Debug)]
pub struct AdapterConfig {
    pub d_model: usize,
    #[config(default = 16)]
    pub reduction_factor: usize,
}

impl AdapterConfig {
    pub fn bottleneck(&self) -> usize {
        (self.d_model / self.reduction_factor.max(1)).max(1)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> BottleneckAdapter<B> {
        let bottleneck = self.bottleneck();
        let down = LinearConfig::new(self.d_model, bottleneck).init(device);
        let up = LinearConfig::new(bottleneck, self.d_model)
            .with_initializer(Initializer::Zeros)
            .init(device);
        BottleneckAdapter { down, up }
    }
}

#[derive(Module, Debug)]
pub struct BottleneckAdapter<B: Backend> {
    pub down: Linear<B>,
    pub up:   Linear<B>,
}

impl<B: Backend> BottleneckAdapter<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let delta = self.up.forward(relu(self.down.forward(x.clone())));
        x + delta
    }
}
