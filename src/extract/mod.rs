//! Deterministic claim extraction from canonicalised page text.
//!
//! A fixed catalogue of pattern matchers runs against the full document
//! and against each sentence; matches are deduplicated per normalized key,
//! keeping the highest-confidence (then shortest) representative. No
//! network, no model calls: the same text always yields the same claims.

mod catalogue;
pub mod signals;

use std::collections::HashMap;

use regex::Regex;

use crate::models::{ClaimMeta, ClaimType, Polarity};

use catalogue::{build_catalogue, Matcher};

/// One claim pulled out of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedClaim {
    pub claim_type: ClaimType,
    pub normalized_key: String,
    pub polarity: Polarity,
    pub snippet: String,
    pub confidence: f64,
    pub meta: ClaimMeta,
}

/// Claim extractor with a pre-compiled matcher catalogue.
pub struct ClaimExtractor {
    matchers: Vec<Matcher>,
    sentence_boundary: Regex,
}

impl Default for ClaimExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ClaimExtractor {
    pub fn new() -> Self {
        Self {
            matchers: build_catalogue(),
            // Terminator followed by whitespace and a capital starts a
            // new sentence.
            sentence_boundary: Regex::new(r"[.!?]\s+[A-Z]").unwrap(),
        }
    }

    /// Extract the deduplicated claim set from a document.
    pub fn extract(&self, text: &str) -> Vec<ExtractedClaim> {
        let mut best: HashMap<&'static str, ExtractedClaim> = HashMap::new();

        // Full-document pass: snippets are char windows around the match.
        for matcher in &self.matchers {
            for caps in matcher.regex.captures_iter(text) {
                let m = caps.get(0).expect("group 0 always present");
                let snippet = window_snippet(text, m.start(), m.end());
                let meta = matcher.numeric_meta(&caps);
                consider(&mut best, matcher, snippet, meta);
            }
        }

        // Sentence pass: the sentence itself is the snippet.
        for sentence in self.split_sentences(text) {
            for matcher in &self.matchers {
                if let Some(caps) = matcher.regex.captures(sentence) {
                    let snippet = collapse_whitespace(sentence);
                    let meta = matcher.numeric_meta(&caps);
                    consider(&mut best, matcher, snippet, meta);
                }
            }
        }

        let mut claims: Vec<ExtractedClaim> = best.into_values().collect();
        claims.sort_by(|a, b| a.normalized_key.cmp(&b.normalized_key));
        claims
    }

    /// Split on `[.!?]` + whitespace + capital, keeping fragments of
    /// 20-500 characters.
    fn split_sentences<'t>(&self, text: &'t str) -> Vec<&'t str> {
        let mut sentences = Vec::new();
        let mut start = 0usize;
        for m in self.sentence_boundary.find_iter(text) {
            // Keep the terminator with the sentence; the capital (always
            // one byte) opens the next one.
            sentences.push(text[start..m.start() + 1].trim());
            start = m.end() - 1;
        }
        sentences.push(text[start..].trim());
        sentences.retain(|s| {
            let len = s.chars().count();
            (20..=500).contains(&len)
        });
        sentences
    }
}

/// Keep the strongest candidate per key: higher confidence wins, ties go
/// to the shorter snippet (sentence snippets beat document windows).
fn consider(
    best: &mut HashMap<&'static str, ExtractedClaim>,
    matcher: &Matcher,
    snippet: String,
    meta: ClaimMeta,
) {
    if snippet.is_empty() {
        return;
    }
    let candidate = ExtractedClaim {
        claim_type: matcher.claim_type,
        normalized_key: matcher.key.to_string(),
        polarity: matcher.polarity,
        snippet,
        confidence: matcher.confidence,
        meta,
    };
    let replace = match best.get(matcher.key) {
        None => true,
        Some(current) => {
            candidate.confidence > current.confidence
                || (candidate.confidence == current.confidence
                    && candidate.snippet.chars().count() < current.snippet.chars().count())
        }
    };
    if replace {
        best.insert(matcher.key, candidate);
    }
}

/// Collapse runs of whitespace and newlines to single spaces.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Snippet for a full-document match: a ±150-character window, collapsed,
/// with any leading partial sentence trimmed when it resolves within the
/// first 50 characters.
fn window_snippet(text: &str, start: usize, end: usize) -> String {
    let mut begin = start;
    for _ in 0..150 {
        if begin == 0 {
            break;
        }
        begin -= 1;
        while begin > 0 && !text.is_char_boundary(begin) {
            begin -= 1;
        }
    }
    let mut stop = end;
    for _ in 0..150 {
        if stop >= text.len() {
            break;
        }
        stop += 1;
        while stop < text.len() && !text.is_char_boundary(stop) {
            stop += 1;
        }
    }

    let clipped_front = begin > 0;
    let collapsed = collapse_whitespace(&text[begin..stop]);
    if clipped_front {
        trim_leading_partial_sentence(&collapsed)
    } else {
        collapsed
    }
}

/// Drop a clipped leading fragment if a sentence boundary appears within
/// the first 50 characters.
fn trim_leading_partial_sentence(snippet: &str) -> String {
    let limit = snippet
        .char_indices()
        .nth(50)
        .map(|(i, _)| i)
        .unwrap_or(snippet.len());
    let head = &snippet[..limit];
    for boundary in [". ", "! ", "? "] {
        if let Some(pos) = head.find(boundary) {
            return snippet[pos + boundary.len()..].trim_start().to_string();
        }
    }
    snippet.to_string()
}
