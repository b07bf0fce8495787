use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};

use crate::ml::adapter::{AdapterConfig, BottleneckAdapter};

/// Architecture of a (pretrained) transformer encoder.
///
/// Serialised with Burn's `Config` JSON format, which is also the
/// format of `config.json` for models registered on disk.
#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub vocab_size:              usize,
    pub max_position_embeddings: usize,
    pub d_model:                 usize,
    pub num_heads:               usize,
    pub num_layers:              usize,
    pub d_ff:                    usize,
    #[config(default = 0.1)]
    pub dropout:                 f64,
    #[config(default = 1e-12)]
    pub layer_norm_eps:          f64,
}

impl EncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TransformerEncoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_position_embeddings, self.d_model).init(device);
        let embedding_norm     = self.layer_norm(device);
        let layers = (0..self.num_layers)
            .map(|_| self.build_block(device))
            .collect();
        let dropout = DropoutConfig::new(self.dropout).init();
        TransformerEncoder {
            token_embedding, position_embedding, embedding_norm, layers, dropout,
            d_model: self.d_model,
        }
    }

    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.d_model)
            .with_epsilon(self.layer_norm_eps)
            .init(device)
    }

    fn build_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        EncoderBlock {
            self_attn,
            ffn_linear1: LinearConfig::new(self.d_model, self.d_ff).init(device),
            ffn_linear2: LinearConfig::new(self.d_ff, self.d_model).init(device),
            norm1:       self.layer_norm(device),
            norm2:       self.layer_norm(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
            adapter:     None,
        }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
    pub adapter:     Option<BottleneckAdapter<B>>,
}

impl<B: Backend> EncoderBlock<B> {
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let input = MhaInput::self_attn(x.clone()).mask_pad(mask_pad);
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        let x = self.norm2.forward(x + self.dropout.forward(ffn_out));
        match &self.adapter {
            Some(adapter) => adapter.forward(x),
            None => x,
        }
    }

    fn freeze_base(self) -> Self {
        Self {
            self_attn:   self.self_attn.no_grad(),
            ffn_linear1: self.ffn_linear1.no_grad(),
            ffn_linear2: self.ffn_linear2.no_grad(),
            norm1:       self.norm1.no_grad(),
            norm2:       self.norm2.no_grad(),
            dropout:     self.dropout,
            adapter:     self.adapter,
        }
    }
}

#[derive(Module, Debug)]
pub struct TransformerEncoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub embedding_norm:     LayerNorm<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub dropout:            Dropout,
    pub d_model:            usize,
}

impl<B: Backend> TransformerEncoder<B> {
    /// Returns every hidden state: the embedding output followed by
    /// the output of each block, i.e. `num_layers + 1` tensors of
    /// shape [batch, seq_len, d_model].
    ///
    /// `attention_mask` is 1 for real tokens and 0 for padding.
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Vec<Tensor<B, 3>> {
        let mut x = self.embed(input_ids);
        let mask_pad = attention_mask.equal_elem(0);

        let mut hidden_states = Vec::with_capacity(self.layers.len() + 1);
        hidden_states.push(x.clone());
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
            hidden_states.push(x.clone());
        }
        hidden_states
    }

    /// [CLS] vector of the last block only, without keeping the
    /// intermediate hidden states around.
    pub fn pooled(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let mut x = self.embed(input_ids);
        let mask_pad = attention_mask.equal_elem(0);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        cls_token(x)
    }

    fn embed(&self, input_ids: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let embedded = self.token_embedding.forward(input_ids)
            + self.position_embedding.forward(positions);
        self.dropout.forward(self.embedding_norm.forward(embedded))
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Insert a fresh adapter after every block.
    pub fn with_new_adapters(mut self, reduction_factor: usize, device: &B::Device) -> Self {
        let config = AdapterConfig::new(self.d_model).with_reduction_factor(reduction_factor);
        for layer in self.layers.iter_mut() {
            layer.adapter = Some(config.init(device));
        }
        self
    }

    /// Replace the adapters with previously trained ones, one per block.
    pub fn with_adapters(mut self, adapters: Vec<BottleneckAdapter<B>>) -> Self {
        for (layer, adapter) in self.layers.iter_mut().zip(adapters) {
            layer.adapter = Some(adapter);
        }
        self
    }

    /// The adapters currently installed, in block order.
    pub fn adapters(&self) -> Vec<BottleneckAdapter<B>> {
        self.layers.iter().filter_map(|l| l.adapter.clone()).collect()
    }

    /// Stop gradients for every parameter except the adapters.
    pub fn freeze_base(self) -> Self {
        Self {
            token_embedding:    self.token_embedding.no_grad(),
            position_embedding: self.position_embedding.no_grad(),
            embedding_norm:     self.embedding_norm.no_grad(),
            layers:             self.layers.into_iter().map(EncoderBlock::freeze_base).collect(),
            dropout:            self.dropout,
            d_model:            self.d_model,
        }
    }
}

/// The [CLS] vector (position 0) of a hidden state: [batch, d_model].
pub fn cls_token<B: Backend>(hidden: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch_size, _, d_model] = hidden.dims();
    hidden
        .slice([0..batch_size, 0..1, 0..d_model])
        .reshape([batch_size, d_model])
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TB = NdArray;

    pub(crate) fn tiny_config() -> EncoderConfig {
        EncoderConfig::new(50, 16, 8, 2, 2, 16).with_dropout(0.0)
    }

    pub(crate) fn ids_and_mask<B: Backend>(device: &B::Device) -> (Tensor<B, 2, Int>, Tensor<B, 2, Int>) {
        let ids  = Tensor::<B, 2, Int>::from_ints([[2, 7, 9, 3, 0], [2, 11, 3, 0, 0]], device);
        let mask = Tensor::<B, 2, Int>::from_ints([[1, 1, 1, 1, 0], [1, 1, 1, 0, 0]], device);
        (ids, mask)
    }

    #[test]
    fn test_returns_one_hidden_state_per_layer_plus_embeddings() {
        let device = Default::default();
        let encoder = tiny_config().init::<TB>(&device);
        let (ids, mask) = ids_and_mask::<TB>(&device);

        let hidden = encoder.forward(ids, mask);
        assert_eq!(hidden.len(), 3);
        for h in &hidden {
            assert_eq!(h.dims(), [2, 5, 8]);
        }
        assert_eq!(cls_token(hidden[2].clone()).dims(), [2, 8]);
    }

    #[test]
    fn test_pooled_matches_last_hidden_state() {
        let device = Default::default();
        let encoder = tiny_config().init::<TB>(&device);
        let (ids, mask) = ids_and_mask::<TB>(&device);

        let last = cls_token(encoder.forward(ids.clone(), mask.clone()).pop().unwrap());
        let pooled = encoder.pooled(ids, mask);
        let diff: f32 = (last - pooled).abs().max().into_scalar().elem();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_new_adapters_do_not_change_outputs() {
        let device = Default::default();
        let encoder = tiny_config().init::<TB>(&device);
        let adapted = encoder.clone().with_new_adapters(4, &device);
        assert_eq!(adapted.adapters().len(), 2);

        let (ids, mask) = ids_and_mask::<TB>(&device);
        let before = encoder.forward(ids.clone(), mask.clone()).pop().unwrap();
        let after  = adapted.forward(ids, mask).pop().unwrap();
        let diff: f32 = (before - after).abs().max().into_scalar().elem();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_freeze_base_leaves_only_adapter_gradients() {
        type AB = Autodiff<NdArray>;
        let device = Default::default();
        let encoder = tiny_config()
            .init::<AB>(&device)
            .with_new_adapters(4, &device)
            .freeze_base();
        let (ids, mask) = ids_and_mask::<AB>(&device);

        let out = encoder.forward(ids, mask).pop().unwrap();
        let grads = out.powf_scalar(2.0).sum().backward();

        let embedding_grad = encoder.token_embedding.weight.val().grad(&grads);
        assert!(embedding_grad.is_none());

        let ffn_grad = encoder.layers[0].ffn_linear1.weight.val().grad(&grads);
        assert!(ffn_grad.is_none());

        let adapter = encoder.layers[1].adapter.as_ref().unwrap();
        assert!(adapter.up.weight.val().grad(&grads).is_some());
    }
}
