//! Hand-engineered linguistic features
//!
//! This is the single definition of the surface statistics fed to the text
//! authorship model. Training tooling reaches the same code through the
//! `authorscope features` subcommand, so the columns a scaler was fitted on
//! and the columns computed at serving time cannot drift apart.
//!
//! Every feature is defined for any non-empty input: all divisions use a
//! denominator floored at 1.

use aho_corasick::AhoCorasick;
use authorscope_core::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Feature names in column order
pub const FEATURE_NAMES: [&str; 15] = [
    "char_count",
    "word_count",
    "sentence_count",
    "avg_word_length",
    "avg_sentence_length",
    "exclamation_count",
    "question_count",
    "comma_count",
    "period_count",
    "uppercase_ratio",
    "vocabulary_diversity",
    "ai_phrases_count",
    "max_bigram_freq",
    "syllable_density",
    "long_word_ratio",
];

/// Number of linguistic feature columns
pub const FEATURE_COUNT: usize = FEATURE_NAMES.len();

/// Phrases over-represented in machine-written prose
pub const AI_MARKER_PHRASES: [&str; 12] = [
    "as an ai",
    "i apologize",
    "i understand",
    "furthermore",
    "moreover",
    "additionally",
    "in conclusion",
    "to summarize",
    "it is important to note",
    "however",
    "therefore",
    "nevertheless",
];

/// Words strictly longer than this count toward `long_word_ratio`
const LONG_WORD_CHARS: usize = 6;

/// Tokens that end in a period without ending a sentence
const ABBREVIATIONS: [&str; 22] = [
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "inc", "ltd",
    "co", "corp", "no", "fig", "approx", "dept", "est", "cf",
];

/// Linguistic feature vector for one text
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinguisticFeatures {
    pub char_count: f64,
    pub word_count: f64,
    pub sentence_count: f64,
    pub avg_word_length: f64,
    pub avg_sentence_length: f64,
    pub exclamation_count: f64,
    pub question_count: f64,
    pub comma_count: f64,
    pub period_count: f64,
    pub uppercase_ratio: f64,
    pub vocabulary_diversity: f64,
    pub ai_phrases_count: f64,
    pub max_bigram_freq: f64,
    pub syllable_density: f64,
    pub long_word_ratio: f64,
}

impl LinguisticFeatures {
    /// Values in `FEATURE_NAMES` order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.char_count,
            self.word_count,
            self.sentence_count,
            self.avg_word_length,
            self.avg_sentence_length,
            self.exclamation_count,
            self.question_count,
            self.comma_count,
            self.period_count,
            self.uppercase_ratio,
            self.vocabulary_diversity,
            self.ai_phrases_count,
            self.max_bigram_freq,
            self.syllable_density,
            self.long_word_ratio,
        ]
    }

    /// `(name, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.to_array())
    }
}

/// Computes [`LinguisticFeatures`] from raw text.
///
/// Matchers are compiled once at construction; [`extract`](Self::extract)
/// is a pure function of its input.
pub struct LinguisticFeatureExtractor {
    ai_phrases: AhoCorasick,
    word_regex: Regex,
    vowel_groups: Regex,
}

impl LinguisticFeatureExtractor {
    /// Create a new extractor
    pub fn new() -> Result<Self> {
        Ok(Self {
            ai_phrases: AhoCorasick::new(AI_MARKER_PHRASES).map_err(|e| {
                Error::internal(format!("Failed to build AI phrase matcher: {}", e))
            })?,
            word_regex: Regex::new(r"\b\w+\b")
                .map_err(|e| Error::internal(format!("Failed to compile word regex: {}", e)))?,
            vowel_groups: Regex::new(r"[aeiouy]+")
                .map_err(|e| Error::internal(format!("Failed to compile vowel regex: {}", e)))?,
        })
    }

    /// Extract the feature vector for one text
    pub fn extract(&self, text: &str) -> LinguisticFeatures {
        let words: Vec<&str> = text.split_whitespace().collect();
        let lowered = text.to_lowercase();
        let words_lower: Vec<&str> = lowered.split_whitespace().collect();

        let char_count = text.chars().count();
        let word_count = words.len();
        let sentence_count = self.count_sentences(text);

        let avg_word_length = if words.is_empty() {
            0.0
        } else {
            let total: usize = words.iter().map(|w| w.chars().count()).sum();
            total as f64 / word_count as f64
        };

        let uppercase = text.chars().filter(|c| c.is_uppercase()).count();
        let unique_words: HashSet<&str> = words_lower.iter().copied().collect();
        let long_words = words
            .iter()
            .filter(|w| w.chars().count() > LONG_WORD_CHARS)
            .count();

        LinguisticFeatures {
            char_count: char_count as f64,
            word_count: word_count as f64,
            sentence_count: sentence_count as f64,
            avg_word_length,
            avg_sentence_length: word_count as f64 / sentence_count.max(1) as f64,
            exclamation_count: count_char(text, '!') as f64,
            question_count: count_char(text, '?') as f64,
            comma_count: count_char(text, ',') as f64,
            period_count: count_char(text, '.') as f64,
            uppercase_ratio: uppercase as f64 / char_count.max(1) as f64,
            vocabulary_diversity: unique_words.len() as f64 / words_lower.len().max(1) as f64,
            ai_phrases_count: self.count_ai_phrases(&lowered) as f64,
            max_bigram_freq: max_bigram_frequency(&words_lower),
            syllable_density: self.estimate_syllables(&lowered) as f64 / word_count.max(1) as f64,
            long_word_ratio: long_words as f64 / word_count.max(1) as f64,
        }
    }

    /// Extract one feature vector per text, in input order
    pub fn extract_batch<T: AsRef<str>>(&self, texts: &[T]) -> Vec<LinguisticFeatures> {
        texts.iter().map(|t| self.extract(t.as_ref())).collect()
    }

    /// Number of sentences, never less than 1.
    ///
    /// Every non-empty segment counts, including one made only of
    /// punctuation.
    pub fn count_sentences(&self, text: &str) -> usize {
        let segmented = split_sentences(text).len();
        if segmented == 0 {
            tracing::trace!("Sentence segmentation found nothing, counting one sentence");
        }
        segmented.max(1)
    }

    /// Number of distinct marker phrases present in already-lowercased text
    fn count_ai_phrases(&self, lowered: &str) -> usize {
        let mut seen = [false; AI_MARKER_PHRASES.len()];
        for mat in self.ai_phrases.find_overlapping_iter(lowered) {
            seen[mat.pattern().as_usize()] = true;
        }
        seen.iter().filter(|hit| **hit).count()
    }

    fn estimate_syllables(&self, lowered: &str) -> usize {
        self.word_regex
            .find_iter(lowered)
            .map(|word| self.vowel_groups.find_iter(word.as_str()).count().max(1))
            .sum()
    }
}

fn count_char(text: &str, needle: char) -> usize {
    text.chars().filter(|c| *c == needle).count()
}

/// Share of the most frequent adjacent word pair among all pairs
fn max_bigram_frequency(words: &[&str]) -> f64 {
    if words.len() < 2 {
        return 0.0;
    }

    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    for pair in words.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }

    let max = counts.values().copied().max().unwrap_or(0);
    max as f64 / (words.len() - 1) as f64
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '}' | '”' | '’' | '»')
}

/// Split text into sentences.
///
/// A boundary is a run of `.`/`!`/`?` (plus closing quotes or brackets)
/// followed by the end of text or by whitespace, whatever the case of the
/// next word. A lone period after a known abbreviation or a single letter
/// initial is never a boundary. An ellipsis is one unless the next word
/// starts lowercase.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if !is_terminal(ch) {
            continue;
        }

        let mut end = idx + ch.len_utf8();
        let mut run_len = 1;
        while let Some(&(next_idx, next)) = chars.peek() {
            if is_terminal(next) || is_closing(next) {
                if is_terminal(next) {
                    run_len += 1;
                }
                end = next_idx + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let rest = &text[end..];
        let boundary = match rest.chars().next() {
            None => true,
            Some(c) if c.is_whitespace() => {
                let ellipsis = run_len > 1
                    && text[idx..end]
                        .chars()
                        .filter(|c| is_terminal(*c))
                        .all(|c| c == '.');
                if ch == '.' && run_len == 1 && ends_with_abbreviation(&text[start..idx]) {
                    false
                } else if ellipsis {
                    !rest
                        .trim_start()
                        .chars()
                        .next()
                        .is_some_and(char::is_lowercase)
                } else {
                    true
                }
            }
            Some(_) => false,
        };

        if boundary {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let remainder = text[start..].trim();
    if !remainder.is_empty() {
        sentences.push(remainder);
    }

    sentences
}

fn ends_with_abbreviation(preceding: &str) -> bool {
    let Some(token) = preceding.split_whitespace().last() else {
        return false;
    };
    let token = token
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();

    let mut letters = token.chars();
    let single_initial = matches!((letters.next(), letters.next()), (Some(c), None) if c.is_alphabetic());

    single_initial || ABBREVIATIONS.contains(&token.as_str())
}
