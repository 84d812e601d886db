//! TextScanner: keyword detection in page text
//!
//! Two passes over the lowercased page text:
//! 1. Aho-Corasick over every keyword form (plain + URL-encoded) finds the
//!    keywords that occur at all. Overlapping matches, so "alex" is still
//!    seen inside "alexander".
//! 2. Only those candidates are confirmed with a word-boundary regex.
//!
//! A keyword therefore matches only as a whole word: "alex" matches
//! "I saw Alex" but not "Alexander". Boundaries are asserted only on a side
//! where the keyword itself begins/ends with a word character, so "c++" and
//! "#breakup" still match.
//!
//! The compiled matcher is cached and rebuilt only when the keyword list
//! changes.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use regex::Regex;
use std::collections::HashSet;

use super::state::DetectionState;

const TAG: &str = "TextScanner";

// =============================================================================
// Types
// =============================================================================

/// A keyword ready for matching
#[derive(Debug, Clone)]
struct CompiledKeyword {
    /// Keyword as stored (trimmed, case preserved)
    original: String,
    /// Lowercased form, also the cooldown key
    normalized: String,
    /// Word-boundary confirmation over all forms
    boundary: Regex,
}

/// Keyword scanner with a cached automaton
#[derive(Debug, Clone)]
pub struct TextScanner {
    cooldown_ms: u64,
    /// Keyword list the matcher was built from
    source: Vec<String>,
    compiled: Vec<CompiledKeyword>,
    /// Substring prefilter (None when no keywords or the build failed)
    automaton: Option<AhoCorasick>,
    /// Automaton pattern index -> index into `compiled`
    pattern_owner: Vec<usize>,
}

impl TextScanner {
    pub fn new(cooldown_ms: u64) -> Self {
        Self {
            cooldown_ms,
            source: Vec::new(),
            compiled: Vec::new(),
            automaton: None,
            pattern_owner: Vec::new(),
        }
    }

    pub fn cooldown_ms(&self) -> u64 {
        self.cooldown_ms
    }

    /// Number of distinct keywords in the current matcher
    pub fn keyword_count(&self) -> usize {
        self.compiled.len()
    }

    /// Keywords found in `page_text` that are not cooling down, in keyword
    /// order. Admitted keywords get their cooldown timestamp set to `now`.
    pub fn scan(
        &mut self,
        page_text: &str,
        keywords: &[String],
        state: &mut DetectionState,
        now: u64,
    ) -> Vec<String> {
        let admitted = self.pending(page_text, keywords, state, now);
        self.commit(&admitted, state, now);
        admitted
    }

    /// What `scan` would return, without starting any cooldown.
    pub fn pending(
        &mut self,
        page_text: &str,
        keywords: &[String],
        state: &DetectionState,
        now: u64,
    ) -> Vec<String> {
        if keywords.is_empty() {
            return Vec::new();
        }
        self.prepare(keywords);

        let mut admitted = Vec::new();
        for idx in self.found(page_text) {
            let keyword = &self.compiled[idx];
            if state.is_cooling(&keyword.normalized, now, self.cooldown_ms) {
                wp_debug!(TAG, "Keyword \"{}\" found but cooling down", keyword.original);
            } else {
                wp_info!(TAG, "Found keyword \"{}\"", keyword.original);
                admitted.push(keyword.original.clone());
            }
        }
        admitted
    }

    /// Start the cooldown of each keyword in `detected` at `now`.
    pub fn commit(&self, detected: &[String], state: &mut DetectionState, now: u64) {
        for keyword in detected {
            state.record(&keyword.trim().to_lowercase(), now);
        }
    }

    /// Keywords found in `page_text`, ignoring cooldowns.
    pub fn matches(&mut self, page_text: &str, keywords: &[String]) -> Vec<String> {
        if keywords.is_empty() {
            return Vec::new();
        }
        self.prepare(keywords);
        self.found(page_text)
            .into_iter()
            .map(|idx| self.compiled[idx].original.clone())
            .collect()
    }

    /// Rebuild the matcher if `keywords` differs from the cached list.
    fn prepare(&mut self, keywords: &[String]) {
        if self.source == keywords {
            return;
        }
        self.rebuild(keywords);
    }

    fn rebuild(&mut self, keywords: &[String]) {
        self.source = keywords.to_vec();
        self.compiled.clear();
        self.pattern_owner.clear();

        let mut patterns: Vec<String> = Vec::new();
        let mut seen = HashSet::new();

        for keyword in keywords {
            let original = keyword.trim();
            let normalized = original.to_lowercase();
            if normalized.is_empty() || !seen.insert(normalized.clone()) {
                continue;
            }

            let forms = keyword_forms(&normalized);
            let boundary = match boundary_regex(&forms) {
                Ok(re) => re,
                Err(e) => {
                    wp_warn!(TAG, "Skipping keyword \"{}\": {}", original, e);
                    continue;
                }
            };

            let idx = self.compiled.len();
            for form in forms {
                patterns.push(form);
                self.pattern_owner.push(idx);
            }
            self.compiled.push(CompiledKeyword {
                original: original.to_string(),
                normalized,
                boundary,
            });
        }

        self.automaton = if patterns.is_empty() {
            None
        } else {
            match AhoCorasickBuilder::new()
                .match_kind(MatchKind::Standard)
                .build(&patterns)
            {
                Ok(ac) => Some(ac),
                Err(e) => {
                    // Without the prefilter every keyword goes to the regex
                    wp_warn!(TAG, "Prefilter build failed: {}", e);
                    None
                }
            }
        };

        wp_debug!(
            TAG,
            "Matcher built: {} keyword(s), {} pattern(s)",
            self.compiled.len(),
            patterns.len()
        );
    }

    /// Indices into `compiled` of every keyword present in `page_text`,
    /// ascending (= keyword order).
    fn found(&self, page_text: &str) -> Vec<usize> {
        if self.compiled.is_empty() {
            return Vec::new();
        }
        let lower = page_text.to_lowercase();

        let candidates = match &self.automaton {
            Some(ac) => {
                let mut hit = vec![false; self.compiled.len()];
                for m in ac.find_overlapping_iter(&lower) {
                    hit[self.pattern_owner[m.pattern().as_usize()]] = true;
                }
                hit
            }
            None => vec![true; self.compiled.len()],
        };

        candidates
            .into_iter()
            .enumerate()
            .filter(|&(idx, candidate)| candidate && self.compiled[idx].boundary.is_match(&lower))
            .map(|(idx, _)| idx)
            .collect()
    }
}

// =============================================================================
// Matching helpers
// =============================================================================

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Plain lowercase form, plus the URL-encoded form when it differs
/// (e.g. "new york" -> "new%20york" inside a page URL).
fn keyword_forms(normalized: &str) -> Vec<String> {
    let encoded = urlencoding::encode(normalized).to_lowercase();
    if encoded == normalized {
        vec![normalized.to_string()]
    } else {
        vec![normalized.to_string(), encoded]
    }
}

/// `\b<form>\b` alternation, asserting a boundary only next to word chars.
fn boundary_regex(forms: &[String]) -> Result<Regex, regex::Error> {
    let alternatives: Vec<String> = forms
        .iter()
        .map(|form| {
            let lead = form.chars().next().is_some_and(is_word_char);
            let trail = form.chars().next_back().is_some_and(is_word_char);
            format!(
                "{}{}{}",
                if lead { r"\b" } else { "" },
                regex::escape(form),
                if trail { r"\b" } else { "" }
            )
        })
        .collect();
    Regex::new(&alternatives.join("|"))
}

// =============================================================================
// Tests
// =============================================================================
