//! Word Vocabulary and Corpus Preparation
//!
//! The network works on word indices. This module turns a raw message corpus
//! into those indices and back:
//!
//! ```text
//! text ──tokenize──► words ──Vocabulary::build──► word ↔ index table
//!                      │                                 │
//!                      └──────────── encode ─────────────┘
//!                                      ↓
//!                split_messages ──► training_pairs ──► (X, Y)
//! ```
//!
//! ## Corpus Format
//!
//! Messages are delimited by sentinel words written into the corpus itself:
//!
//! ```text
//! START_MESSAGE Happy birthday , my friend ! END_MESSAGE
//! START_MESSAGE Congrats on the new job END_MESSAGE
//! ```
//!
//! Everything up to and including an `END_MESSAGE` is one message. The third
//! sentinel, `UNKNOWN_TOKEN`, stands in for words that were cut from the
//! vocabulary by a size limit.
//!
//! ## Index Order
//!
//! Indices are assigned by descending frequency, with ties going to the word
//! seen first. Index 0 is therefore the most common word in the corpus.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Marks the beginning of a message
pub const START_MESSAGE: &str = "START_MESSAGE";
/// Marks the end of a message
pub const END_MESSAGE: &str = "END_MESSAGE";
/// Replaces words outside the vocabulary
pub const UNKNOWN_TOKEN: &str = "UNKNOWN_TOKEN";

const SENTINEL_WORDS: [&str; 3] = [START_MESSAGE, END_MESSAGE, UNKNOWN_TOKEN];

/// Indices of the three reserved words
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sentinels {
    pub start: usize,
    pub end: usize,
    pub unknown: usize,
}

/// Bidirectional word ↔ index table
///
/// Serializes as a plain JSON array of words in index order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<String>", try_from = "Vec<String>")]
pub struct Vocabulary {
    words: Vec<String>,
    index: HashMap<String, usize>,
    sentinels: Sentinels,
}

impl Vocabulary {
    /// Build a vocabulary from a token stream
    ///
    /// # Arguments
    ///
    /// * `tokens` - The tokenized corpus
    /// * `max_size` - Optional cap on the number of entries, sentinels included.
    ///   Only the most frequent words are kept; the rest will encode as
    ///   `UNKNOWN_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVocabulary`] if `max_size` leaves no room for
    /// the three sentinels.
    ///
    /// # Example
    ///
    /// ```rust
    /// use cardsmith::vocab::{tokenize, Vocabulary};
    ///
    /// let tokens = tokenize("START_MESSAGE hi hi there END_MESSAGE");
    /// let vocab = Vocabulary::build(&tokens, None)?;
    /// assert_eq!(vocab.index_of("hi"), Some(0));
    /// assert_eq!(vocab.len(), 5);
    /// # Ok::<(), cardsmith::Error>(())
    /// ```
    pub fn build<S: AsRef<str>>(tokens: &[S], max_size: Option<usize>) -> Result<Self> {
        if let Some(max) = max_size {
            if max < SENTINEL_WORDS.len() {
                return Err(Error::InvalidVocabulary(format!(
                    "max_size {} cannot hold the {} sentinel words",
                    max,
                    SENTINEL_WORDS.len()
                )));
            }
        }

        // word -> (count, first position)
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (position, token) in tokens.iter().enumerate() {
            counts.entry(token.as_ref()).or_insert((0, position)).0 += 1;
        }

        let mut ranked: Vec<(&str, usize, usize)> = counts
            .into_iter()
            .map(|(word, (count, first))| (word, count, first))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

        let budget = max_size.map(|max| max - SENTINEL_WORDS.len());
        let mut regular = 0;
        let mut words = Vec::new();
        for (word, _, _) in ranked {
            if SENTINEL_WORDS.contains(&word) {
                words.push(word.to_string());
            } else if budget.map_or(true, |b| regular < b) {
                words.push(word.to_string());
                regular += 1;
            }
        }
        for sentinel in SENTINEL_WORDS {
            if !words.iter().any(|w| w == sentinel) {
                words.push(sentinel.to_string());
            }
        }

        Self::from_words(words)
    }

    /// Create a vocabulary from words in index order
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVocabulary`] on a duplicate word or a missing
    /// sentinel.
    pub fn from_words(words: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(words.len());
        for (i, word) in words.iter().enumerate() {
            if index.insert(word.clone(), i).is_some() {
                return Err(Error::InvalidVocabulary(format!("duplicate word {:?}", word)));
            }
        }

        let lookup = |word: &str| {
            index
                .get(word)
                .copied()
                .ok_or_else(|| Error::InvalidVocabulary(format!("missing sentinel {}", word)))
        };
        let sentinels = Sentinels {
            start: lookup(START_MESSAGE)?,
            end: lookup(END_MESSAGE)?,
            unknown: lookup(UNKNOWN_TOKEN)?,
        };

        Ok(Self {
            words,
            index,
            sentinels,
        })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn sentinels(&self) -> Sentinels {
        self.sentinels
    }

    pub fn index_of(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn word(&self, index: usize) -> Option<&str> {
        self.words.get(index).map(String::as_str)
    }

    /// Map words to indices, substituting `UNKNOWN_TOKEN` for unseen words
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        tokens
            .iter()
            .map(|t| self.index_of(t.as_ref()).unwrap_or(self.sentinels.unknown))
            .collect()
    }

    /// Map indices back to words
    ///
    /// Returns `None` if any index is outside the vocabulary.
    pub fn decode(&self, indices: &[usize]) -> Option<Vec<&str>> {
        indices.iter().map(|&i| self.word(i)).collect()
    }

    /// Save the vocabulary as a JSON array of words
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a vocabulary saved with [`Vocabulary::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let vocab: Vocabulary = serde_json::from_str(&json)?;
        Ok(vocab)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.words
    }
}

impl TryFrom<Vec<String>> for Vocabulary {
    type Error = Error;

    fn try_from(words: Vec<String>) -> Result<Self> {
        Self::from_words(words)
    }
}

/// Split text into word tokens
///
/// Whitespace separates chunks. Punctuation at either end of a chunk becomes
/// separate tokens, one per character except that a run of dots stays
/// together as an ellipsis. Punctuation inside a word (`don't`,
/// `well-wishes`, `END_MESSAGE`) is kept, and chunks with no letters or
/// digits at all, such as `:)` or `;-)`, are kept whole. Case is preserved.
///
/// ```rust
/// use cardsmith::vocab::tokenize;
///
/// assert_eq!(
///     tokenize("Happy birthday, don't party too hard!! :)"),
///     vec!["Happy", "birthday", ",", "don't", "party", "too", "hard", "!", "!", ":)"]
/// );
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();

    for chunk in text.split_whitespace() {
        let Some(first) = chunk.find(char::is_alphanumeric) else {
            tokens.push(chunk.to_string());
            continue;
        };
        let end = chunk
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_alphanumeric())
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(chunk.len());

        push_punctuation(&chunk[..first], &mut tokens);
        tokens.push(chunk[first..end].to_string());
        push_punctuation(&chunk[end..], &mut tokens);
    }

    tokens
}

fn push_punctuation(run: &str, tokens: &mut Vec<String>) {
    let mut chars = run.chars().peekable();
    while let Some(c) = chars.next() {
        let mut token = String::from(c);
        if c == '.' {
            while let Some(dot) = chars.next_if_eq(&'.') {
                token.push(dot);
            }
        }
        tokens.push(token);
    }
}

/// Cut an encoded corpus into messages
///
/// Each message runs up to and including an `end` index. Tokens after the
/// last `end` do not form a complete message and are dropped.
pub fn split_messages(indices: &[usize], end: usize) -> Vec<Vec<usize>> {
    let mut messages = Vec::new();
    let mut current = Vec::new();
    for &index in indices {
        current.push(index);
        if index == end {
            messages.push(std::mem::take(&mut current));
        }
    }
    messages
}

/// Turn messages into next-token training examples
///
/// For a message `m`, the input is `m[..len-1]` and the target is `m[1..]`.
/// Messages shorter than two tokens carry no prediction and are skipped.
pub fn training_pairs(messages: &[Vec<usize>]) -> (Vec<Vec<usize>>, Vec<Vec<usize>>) {
    messages
        .iter()
        .filter(|m| m.len() >= 2)
        .map(|m| (m[..m.len() - 1].to_vec(), m[1..].to_vec()))
        .unzip()
}
