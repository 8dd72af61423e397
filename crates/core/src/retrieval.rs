//! Chunking, similarity and ranking for document lookup.

use serde::Serialize;

use crate::model::ResourceId;

pub const CHUNK_SIZE: usize = 500;
pub const CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_TOP_K: usize = 3;
pub const RELEVANCE_THRESHOLD: f32 = 0.15;
pub const KEYWORD_CONTEXT_CHARS: usize = 500;
pub const KEYWORD_LIMIT: usize = 5;

const CONTEXT_HEADER: &str = "Relevant information from your uploaded materials:\n\n";

/// Split text into overlapping windows of whitespace-separated words.
#[must_use]
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        let chunk = words[start..end].join(" ");
        if !chunk.trim().is_empty() {
            chunks.push(chunk);
        }
        start += step;
    }
    chunks
}

#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

//
// ─── RANKING ───────────────────────────────────────────────────────────────────
//

/// Embedded chunks belonging to one document.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub resource_id: ResourceId,
    pub filename: &'a str,
    pub chunks: &'a [(String, Vec<f32>)],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub resource_id: ResourceId,
    pub filename: String,
    pub chunk: String,
    pub similarity: f32,
}

/// Brute-force search: each document contributes its best `top_k` chunks
/// above `threshold`, then the merged list is cut to `top_k`.
#[must_use]
pub fn rank(query: &[f32], candidates: &[Candidate<'_>], top_k: usize, threshold: f32) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    for candidate in candidates {
        let mut scored: Vec<(usize, f32)> = candidate
            .chunks
            .iter()
            .enumerate()
            .map(|(i, (_, embedding))| (i, cosine_similarity(embedding, query)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (i, similarity) in scored.into_iter().take(top_k) {
            if similarity > threshold {
                hits.push(SearchHit {
                    resource_id: candidate.resource_id,
                    filename: candidate.filename.to_string(),
                    chunk: candidate.chunks[i].0.clone(),
                    similarity,
                });
            }
        }
    }
    hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    hits.truncate(top_k);
    hits
}

/// Render hits as a prompt block; `None` when there is nothing to add.
#[must_use]
pub fn format_context(hits: &[SearchHit]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }
    let mut context = String::from(CONTEXT_HEADER);
    for hit in hits {
        context.push_str(&format!("[From {}]\n{}\n\n", hit.filename, hit.chunk));
    }
    Some(context)
}

//
// ─── KEYWORD SEARCH ────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordMatch {
    /// Character offset of the match.
    pub position: usize,
    pub context: String,
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Case-insensitive occurrences of `query` with surrounding text.
#[must_use]
pub fn keyword_search(text: &str, query: &str, context_chars: usize, limit: usize) -> Vec<KeywordMatch> {
    let haystack: Vec<char> = text.chars().collect();
    let needle: Vec<char> = query.chars().map(fold).collect();
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }

    let half = context_chars / 2;
    let mut matches = Vec::new();
    for pos in 0..=(haystack.len() - needle.len()) {
        let hit = haystack[pos..pos + needle.len()]
            .iter()
            .zip(&needle)
            .all(|(h, n)| fold(*h) == *n);
        if !hit {
            continue;
        }

        let start = pos.saturating_sub(half);
        let end = (pos + needle.len() + half).min(haystack.len());
        let mut context: String = haystack[start..end].iter().collect();
        if start > 0 {
            context.insert_str(0, "...");
        }
        if end < haystack.len() {
            context.push_str("...");
        }
        matches.push(KeywordMatch {
            position: pos,
            context,
        });
        if matches.len() >= limit {
            break;
        }
    }
    matches
}
