//! Row text strategies
//!
//! A closed set: random strings over the alphabet, or words sampled from a
//! corpus file. Both yield non-empty strings.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::Path;

use crate::config::TextConfig;
use crate::error::{GeneratorError, GeneratorResult};

#[derive(Debug, Clone)]
pub enum TextSource {
    /// Space-joined words of random alphabet symbols
    RandomChars {
        alphabet: Vec<char>,
        words_in_row: (usize, usize),
        max_word_len: usize,
    },
    /// Words from a text corpus, filtered to the alphabet
    Corpus { alphabet: Vec<char>, words: Vec<String> },
}

impl TextSource {
    pub fn from_config(config: &TextConfig, alphabet: &str) -> GeneratorResult<Self> {
        let alphabet: Vec<char> = alphabet.chars().collect();
        if alphabet.is_empty() {
            return Err(GeneratorError::Config("alphabet must not be empty".to_string()));
        }
        match config {
            TextConfig::Random {
                words_in_row,
                max_word_len,
            } => Ok(TextSource::RandomChars {
                alphabet,
                words_in_row: (words_in_row[0].max(1), words_in_row[1].max(1)),
                max_word_len: (*max_word_len).max(1),
            }),
            TextConfig::Corpus { path } => Self::corpus(path, alphabet),
        }
    }

    pub fn corpus(path: &Path, alphabet: Vec<char>) -> GeneratorResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            GeneratorError::Config(format!("Failed to read corpus {}: {}", path.display(), e))
        })?;
        let words = split_corpus(&text);
        if words.is_empty() {
            return Err(GeneratorError::Config(format!(
                "corpus {} contains no words",
                path.display()
            )));
        }
        log::info!("Loaded {} corpus words from {}", words.len(), path.display());
        Ok(TextSource::Corpus { alphabet, words })
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        match self {
            TextSource::RandomChars {
                alphabet,
                words_in_row,
                max_word_len,
            } => {
                let (lo, hi) = ordered(*words_in_row);
                let n_words = rng.gen_range(lo..=hi);
                let words: Vec<String> = (0..n_words)
                    .map(|_| {
                        let len = rng.gen_range(1..=*max_word_len);
                        (0..len)
                            .map(|_| alphabet[rng.gen_range(0..alphabet.len())])
                            .collect()
                    })
                    .collect();
                words.join(" ")
            }
            TextSource::Corpus { alphabet, words } => {
                let word = words.choose(rng).map(String::as_str).unwrap_or_default();
                let filtered: String = word.chars().filter(|c| alphabet.contains(c)).collect();
                if filtered.is_empty() || filtered == "." {
                    alphabet[0].to_string()
                } else {
                    filtered
                }
            }
        }
    }
}

fn ordered((a, b): (usize, usize)) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// Split on spaces, then on newlines, tabs and carriage returns; drop empty pieces
fn split_corpus(text: &str) -> Vec<String> {
    text.split(' ')
        .flat_map(|w| w.split(&['\n', '\t', '\r'][..]))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}
