//! 相似度适配器：按已知食材对候选菜谱重新排序
//!
//! 默认 LexicalSimilarity（规范化词元上的 Jaccard）；启用 [embedding] 时用嵌入向量余弦相似度。

use std::collections::HashSet;

use async_trait::async_trait;

use crate::core::CapabilityError;
use crate::domain::{canonical_name, Recipe};
use crate::llm::OpenAiEmbedder;

#[async_trait]
pub trait SimilarityAdapter: Send + Sync {
    /// 返回与 candidates 同序、同长度的分数
    async fn scores(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, CapabilityError>;

    fn name(&self) -> &str {
        "similarity"
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LexicalSimilarity;

fn tokens(text: &str) -> HashSet<String> {
    text.split([',', ';', '\n'])
        .map(canonical_name)
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    inter / union
}

#[async_trait]
impl SimilarityAdapter for LexicalSimilarity {
    async fn scores(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, CapabilityError> {
        let q = tokens(query);
        Ok(candidates.iter().map(|c| jaccard(&q, &tokens(c))).collect())
    }

    fn name(&self) -> &str {
        "lexical"
    }
}

pub struct EmbeddingSimilarity {
    embedder: OpenAiEmbedder,
}

impl EmbeddingSimilarity {
    pub fn new(embedder: OpenAiEmbedder) -> Self {
        Self { embedder }
    }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl SimilarityAdapter for EmbeddingSimilarity {
    async fn scores(&self, query: &str, candidates: &[String]) -> Result<Vec<f32>, CapabilityError> {
        let mut texts = Vec::with_capacity(candidates.len() + 1);
        texts.push(query.to_string());
        texts.extend(candidates.iter().cloned());
        let vectors = self.embedder.embed_batch(&texts).await?;
        let (q, rest) = vectors
            .split_first()
            .ok_or_else(|| CapabilityError::malformed("no embeddings returned"))?;
        Ok(rest.iter().map(|v| cosine(q, v)).collect())
    }

    fn name(&self) -> &str {
        "embedding"
    }
}

/// 按与 query 的相似度稳定降序排列菜谱；分数数量不符时保持原顺序
pub fn rank_by_scores(recipes: Vec<Recipe>, scores: &[f32]) -> Vec<Recipe> {
    if scores.len() != recipes.len() {
        return recipes;
    }
    let mut indexed: Vec<(f32, Recipe)> = scores.iter().copied().zip(recipes).collect();
    indexed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    indexed.into_iter().map(|(_, r)| r).collect()
}
