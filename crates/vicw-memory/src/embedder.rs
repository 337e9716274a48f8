// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ONNX embedding adapter for local inference (all-MiniLM-L6-v2 class models).
//!
//! Produces fixed-dimension embeddings on CPU with zero external API calls.
//! The configured dimension is pinned at load time; a model producing any
//! other width is rejected at the first inference.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;

use vicw_core::{EmbeddingAdapter, VicwError};

/// ONNX-based embedder.
///
/// Loads the model and its HuggingFace tokenizer from disk. All inference
/// runs on CPU with a single intra-op thread so the cold path never
/// competes with request handling for more than one core.
pub struct OnnxEmbedder {
    /// ONNX Runtime session (not Sync, wrapped in Mutex for safety).
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
    dimension: usize,
}

// Safety: Session is accessed through Mutex which provides synchronization.
// The tokenizer is thread-safe for encoding operations.
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}

impl OnnxEmbedder {
    /// Creates an embedder from model files on disk.
    ///
    /// Expects `tokenizer.json` in the same directory as the model file.
    pub fn new(model_path: &Path, dimension: usize) -> Result<Self, VicwError> {
        let model_dir = model_path
            .parent()
            .ok_or_else(|| VicwError::Embedding("invalid model path".to_string()))?;

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            VicwError::Embedding(format!(
                "failed to load tokenizer from {}: {e}",
                tokenizer_path.display()
            ))
        })?;

        let session = Session::builder()
            .map_err(|e| VicwError::Embedding(format!("failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| VicwError::Embedding(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(1)
            .map_err(|e| VicwError::Embedding(format!("failed to set thread count: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| {
                VicwError::Embedding(format!(
                    "failed to load ONNX model from {}: {e}",
                    model_path.display()
                ))
            })?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimension,
        })
    }

    /// Embeds a single text string synchronously.
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, VicwError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| VicwError::Embedding(format!("tokenization failed: {e}")))?;

        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids: Vec<i64> = encoding
            .get_type_ids()
            .iter()
            .map(|&t| t as i64)
            .collect();

        let seq_len = input_ids.len();

        let input_ids_array = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| VicwError::Embedding(format!("failed to shape input_ids: {e}")))?;
        let attention_mask_array =
            Array2::from_shape_vec((1, seq_len), attention_mask.clone())
                .map_err(|e| VicwError::Embedding(format!("failed to shape attention_mask: {e}")))?;
        let token_type_ids_array = Array2::from_shape_vec((1, seq_len), token_type_ids)
            .map_err(|e| VicwError::Embedding(format!("failed to shape token_type_ids: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| VicwError::Embedding(format!("session lock poisoned: {e}")))?;

        let input_ids_tensor = TensorRef::from_array_view(&input_ids_array)
            .map_err(|e| VicwError::Embedding(format!("input_ids tensor: {e}")))?;
        let attention_mask_tensor = TensorRef::from_array_view(&attention_mask_array)
            .map_err(|e| VicwError::Embedding(format!("attention_mask tensor: {e}")))?;
        let token_type_ids_tensor = TensorRef::from_array_view(&token_type_ids_array)
            .map_err(|e| VicwError::Embedding(format!("token_type_ids tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => attention_mask_tensor,
                "token_type_ids" => token_type_ids_tensor
            ])
            .map_err(|e| VicwError::Embedding(format!("ONNX inference failed: {e}")))?;

        // Output shape: [1, seq_len, hidden]
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| VicwError::Embedding(format!("failed to extract output tensor: {e}")))?;

        let hidden_size = shape[shape.len() - 1] as usize;
        if hidden_size != self.dimension {
            return Err(VicwError::Embedding(format!(
                "model produces {hidden_size}-dim vectors but {} is pinned",
                self.dimension
            )));
        }

        let pooled = mean_pool_with_attention(data, &attention_mask, seq_len, hidden_size);
        Ok(l2_normalize(&pooled))
    }
}

#[async_trait]
impl EmbeddingAdapter for OnnxEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, VicwError> {
        // CPU-bound inference; keep it off the I/O executor threads.
        tokio::task::block_in_place(|| self.embed_text(text))
    }
}

/// Apply attention-masked mean pooling over token embeddings.
fn mean_pool_with_attention(
    embeddings: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden_size];
    let mut count = 0.0f32;

    for i in 0..seq_len {
        if attention_mask[i] > 0 {
            for j in 0..hidden_size {
                sum[j] += embeddings[i * hidden_size + j];
            }
            count += 1.0;
        }
    }

    if count > 0.0 {
        for val in &mut sum {
            *val /= count;
        }
    }

    sum
}

/// L2-normalize a vector.
fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vec.iter().map(|v| v / norm).collect()
    } else {
        vec.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_general_vector() {
        let n = l2_normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 0.001);
        assert!((n[1] - 0.8).abs() < 0.001);
        let norm: f32 = n.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[test]
    fn l2_normalize_zero_vector() {
        assert_eq!(l2_normalize(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn mean_pool_respects_attention_mask() {
        // Two tokens, hidden size 2; only the first is attended.
        let embeddings = [1.0, 2.0, 100.0, 200.0];
        let mask = [1_i64, 0];
        let pooled = mean_pool_with_attention(&embeddings, &mask, 2, 2);
        assert_eq!(pooled, vec![1.0, 2.0]);
    }

    #[test]
    fn mean_pool_averages_attended_tokens() {
        let embeddings = [1.0, 2.0, 3.0, 4.0];
        let mask = [1_i64, 1];
        let pooled = mean_pool_with_attention(&embeddings, &mask, 2, 2);
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn mean_pool_empty_mask_is_zero() {
        let embeddings = [1.0, 2.0];
        let mask = [0_i64];
        let pooled = mean_pool_with_attention(&embeddings, &mask, 1, 2);
        assert_eq!(pooled, vec![0.0, 0.0]);
    }
}
