use std::path::Path;

use rten::{Model, NodeId};
use rten_tensor::prelude::*;
use rten_tensor::{NdTensor, Tensor};

use super::embedding::{Embedder, EmbeddingInput};
use crate::models::Embedding;

/// Embedder backed by an `rten` model
pub struct RtenEmbedder {
    model: Model,
    input: NodeId,
    output: NodeId,
}

impl RtenEmbedder {
    /// Load a model, preferring `layer` as the embedding output.
    ///
    /// When the model has no node called `layer` its default output is used
    /// instead and a warning is logged.
    pub fn load<P: AsRef<Path>>(path: P, layer: Option<&str>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let model = Model::load_file(path)?;

        let input = *model
            .input_ids()
            .first()
            .ok_or_else(|| anyhow::anyhow!("Model {} has no inputs", path.display()))?;
        let default_output = *model
            .output_ids()
            .first()
            .ok_or_else(|| anyhow::anyhow!("Model {} has no outputs", path.display()))?;

        let output = match layer {
            Some(name) => match model.find_node(name) {
                Some(node) => node,
                None => {
                    log::warn!(
                        "Layer {:?} not found in {}, using default output",
                        name,
                        path.display()
                    );
                    default_output
                }
            },
            None => default_output,
        };

        Ok(Self { model, input, output })
    }
}

impl Embedder for RtenEmbedder {
    fn embed(&self, input: &EmbeddingInput) -> anyhow::Result<Embedding> {
        let tensor = NdTensor::from_data(input.shape(), input.data.clone());
        let mut outputs = self
            .model
            .run(vec![(self.input, tensor.view().into())], &[self.output], None)?;
        let output = outputs
            .pop()
            .ok_or_else(|| anyhow::anyhow!("Model produced no output"))?;
        let values: Tensor<f32> = output
            .try_into()
            .map_err(|e| anyhow::anyhow!("Embedding output is not a float tensor: {:?}", e))?;
        Ok(Embedding(values.iter().copied().collect()))
    }
}
