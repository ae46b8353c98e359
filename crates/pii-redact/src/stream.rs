//! Chunked, bounded-concurrency stream processing.
//!
//! Large inputs are sliced into fixed-size chunks with a trailing overlap
//! region so matches near a seam are never lost. A fixed-size worker pool
//! matches chunks concurrently; results are translated to absolute offsets
//! and merged. The same chunking drives streaming replacement.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::cache::PatternCache;
use crate::config::StreamConfig;
use crate::error::{RedactError, Result};
use crate::types::PatternSpec;

/// A bounded slice of a larger text.
#[derive(Debug, Clone)]
pub struct TextChunk {
    /// Position of this chunk in the sequence.
    pub index: usize,
    /// Chunk content: the nominal slice plus the trailing overlap.
    pub content: String,
    /// Global byte offset of the chunk start in the original text.
    pub offset: usize,
    /// Bytes of this chunk before the overlap region begins.
    pub nominal_size: usize,
    /// Trailing overlap bytes duplicated into the next chunk's territory.
    pub overlap: usize,
}

/// A raw pattern match with absolute offsets.
///
/// Carries no category or confidence; the detection library maps matches
/// back to specs by pattern key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMatch {
    /// Cache key of the pattern that matched.
    pub pattern: String,
    /// The matched text.
    pub text: String,
    /// Absolute start byte offset.
    pub start: usize,
    /// Absolute end byte offset.
    pub end: usize,
}

/// The chunked stream processor.
#[derive(Debug)]
pub struct StreamProcessor {
    config: StreamConfig,
    cache: Arc<PatternCache>,
}

impl StreamProcessor {
    /// Create a processor sharing the given pattern cache.
    #[must_use]
    pub fn new(config: StreamConfig, cache: Arc<PatternCache>) -> Self {
        Self { config, cache }
    }

    /// The stream configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Whether an input of this size takes the chunked path.
    #[must_use]
    pub const fn is_streaming_size(&self, len: usize) -> bool {
        len > self.config.streaming_threshold
    }

    /// Slice text into chunks with trailing overlap.
    ///
    /// Chunk starts tile the text exactly; every boundary is adjusted
    /// forward to a UTF-8 character boundary.
    #[must_use]
    pub fn chunk_text(&self, text: &str) -> Vec<TextChunk> {
        let len = text.len();
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;

        while start < len {
            let nominal_end = ceil_char_boundary(text, (start + self.config.chunk_size).min(len));
            let extended_end = ceil_char_boundary(text, (nominal_end + self.config.overlap).min(len));
            chunks.push(TextChunk {
                index,
                content: text[start..extended_end].to_string(),
                offset: start,
                nominal_size: nominal_end - start,
                overlap: extended_end - nominal_end,
            });
            start = nominal_end;
            index += 1;
        }
        chunks
    }

    /// Run the pattern set against the text.
    ///
    /// Inputs at or below the streaming threshold take a deterministic
    /// single pass; larger inputs are chunked and matched by a bounded
    /// worker pool. Either way the returned matches are sorted by absolute
    /// position with seam duplicates merged.
    pub async fn process(&self, text: &str, specs: &[PatternSpec]) -> Result<Vec<StreamMatch>> {
        let matchers = Arc::new(self.cache.get_many(specs));

        if !self.is_streaming_size(text.len()) {
            let mut matches = match_slice(text, 0, &matchers);
            sort_matches(&mut matches);
            return Ok(merge_matches(text, matches));
        }

        let chunks = self.chunk_text(text);
        debug!(
            chunks = chunks.len(),
            concurrency = self.config.concurrency,
            "chunked matching started"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut join_set = JoinSet::new();

        for chunk in chunks {
            // A new chunk's work only starts once an in-flight worker has
            // released its permit.
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| RedactError::streaming("worker pool semaphore closed"))?;
            let matchers = Arc::clone(&matchers);
            join_set.spawn(async move {
                let _permit = permit;
                match_slice(&chunk.content, chunk.offset, &matchers)
            });
        }

        let mut matches = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let chunk_matches = joined
                .map_err(|err| RedactError::streaming(format!("chunk worker failed: {err}")))?;
            matches.extend(chunk_matches);
        }

        // Workers finish out of order; the caller always sees position order.
        sort_matches(&mut matches);
        Ok(merge_matches(text, matches))
    }

    /// Replace exact occurrences throughout the text, chunk by chunk.
    ///
    /// Within each chunk, replacements are applied in reverse position
    /// order so earlier offsets stay valid. Reconstruction takes chunk 0
    /// in full and drops each later chunk's share of the previous chunk's
    /// trailing overlap before splicing, keeping the output contiguous
    /// even when replacements change text length.
    #[must_use]
    pub fn replace_streaming(&self, text: &str, replacements: &HashMap<String, String>) -> String {
        if replacements.is_empty() {
            return text.to_string();
        }
        if !self.is_streaming_size(text.len()) {
            return replace_in_slice(text, replacements);
        }

        let chunks = self.chunk_text(text);
        let mut out = String::with_capacity(text.len());
        let mut prev_overlap = 0;

        for chunk in chunks {
            let skip = prev_overlap.min(chunk.content.len());
            out.push_str(&replace_in_slice(&chunk.content[skip..], replacements));
            prev_overlap = chunk.overlap;
        }
        out
    }
}

/// Advance `index` to the nearest character boundary at or after it.
fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

/// Match every compiled pattern against a slice, translating local match
/// positions by the slice's global offset.
fn match_slice(
    slice: &str,
    offset: usize,
    matchers: &HashMap<String, Arc<regex::Regex>>,
) -> Vec<StreamMatch> {
    let mut matches = Vec::new();
    for (key, regex) in matchers {
        for m in regex.find_iter(slice) {
            if m.as_str().is_empty() {
                continue;
            }
            matches.push(StreamMatch {
                pattern: key.clone(),
                text: m.as_str().to_string(),
                start: offset + m.start(),
                end: offset + m.end(),
            });
        }
    }
    matches
}

fn sort_matches(matches: &mut [StreamMatch]) {
    matches.sort_by(|a, b| {
        a.start
            .cmp(&b.start)
            .then(a.end.cmp(&b.end))
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
}

/// Merge same-pattern matches whose spans overlap or touch.
///
/// Seam duplicates (a match found in both a chunk's trailing overlap and
/// the next chunk's slice) collapse to one match; fragments expand to the
/// union span re-read from the original text.
fn merge_matches(text: &str, matches: Vec<StreamMatch>) -> Vec<StreamMatch> {
    let mut merged: Vec<StreamMatch> = Vec::with_capacity(matches.len());
    for m in matches {
        match merged.last_mut() {
            Some(last) if last.pattern == m.pattern && m.start <= last.end => {
                if m.end > last.end {
                    last.end = m.end;
                    last.text = text[last.start..last.end].to_string();
                }
            }
            _ => merged.push(m),
        }
    }
    merged
}

/// Apply exact-text replacements to one slice, right to left.
fn replace_in_slice(slice: &str, replacements: &HashMap<String, String>) -> String {
    let mut occurrences: Vec<(usize, usize, &str)> = Vec::new();
    for (needle, replacement) in replacements {
        if needle.is_empty() {
            continue;
        }
        for (pos, _) in slice.match_indices(needle.as_str()) {
            occurrences.push((pos, needle.len(), replacement.as_str()));
        }
    }
    // Reverse position order keeps earlier offsets valid while splicing.
    occurrences.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

    let mut out = slice.to_string();
    let mut last_applied_start = usize::MAX;
    for (pos, len, replacement) in occurrences {
        if pos + len > last_applied_start.min(out.len()) {
            continue;
        }
        out.replace_range(pos..pos + len, replacement);
        last_applied_start = pos;
    }
    out
}
