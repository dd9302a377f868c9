//! Message Generation
//!
//! New messages are written one word at a time by feeding the sequence so far
//! back through the network:
//!
//! ```text
//! sequence = seed                     e.g. [END_MESSAGE, START_MESSAGE]
//! loop:
//!     p     = forward(sequence).last_output()
//!     token = mode of Multinomial(sample_count, p)   redraw while UNKNOWN
//!     sequence.push(token)
//!     stop once token == END_MESSAGE
//! ```
//!
//! ## Multinomial Mode
//!
//! Rather than drawing one word from `p`, the generator runs `sample_count`
//! trials and keeps the word drawn most often. With the default of 10 trials
//! this sits between greedy decoding (always the argmax) and plain sampling
//! (`sample_count = 1`): likely words win more often than their probability
//! alone would give them, but the output still varies from run to run.
//!
//! ## Seeds
//!
//! A seed of `[END_MESSAGE, START_MESSAGE]` makes the network believe it has
//! just finished one message and is starting another, which is the situation
//! it saw at every message boundary in training. An optional lead word placed
//! in front nudges the hidden state toward a topic. See [`default_seed`].
//!
//! ## Failure
//!
//! Generation never returns an error. When it cannot continue, because the
//! seed holds an index outside the vocabulary or the network produced an
//! unusable distribution (softmax overflow gives NaN), it logs a warning and
//! returns an empty message.

use crate::forward::argmax;
use crate::model::RnnModel;
use crate::vocab::Sentinels;
use rand::Rng;
use rand_distr::{Binomial, Distribution};
use tracing::{debug, warn};

/// Anything that can predict a distribution over the next token
pub trait NextTokenModel {
    fn vocab_size(&self) -> usize;

    /// Probabilities for the token following `sequence`
    fn next_token_distribution(&self, sequence: &[usize]) -> Vec<f64>;
}

impl NextTokenModel for RnnModel {
    fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    fn next_token_distribution(&self, sequence: &[usize]) -> Vec<f64> {
        self.forward(sequence)
            .last_output()
            .map(<[f64]>::to_vec)
            .unwrap_or_default()
    }
}

/// Sampling settings
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationConfig {
    /// Multinomial trials per word; 1 is plain categorical sampling
    pub sample_count: u64,
    /// Shortest message [`SequenceGenerator::generate_accepted`] returns
    pub min_length: usize,
    /// Stop after this many generated words even without an END_MESSAGE
    pub max_length: Option<usize>,
    /// Messages tried by [`SequenceGenerator::generate_accepted`] before giving up
    pub max_attempts: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            sample_count: 10,
            min_length: 3,
            max_length: None,
            max_attempts: 100,
        }
    }
}

/// `[lead, END_MESSAGE, START_MESSAGE]`, or just the last two without a lead
pub fn default_seed(sentinels: Sentinels, lead: Option<usize>) -> Vec<usize> {
    lead.into_iter()
        .chain([sentinels.end, sentinels.start])
        .collect()
}

/// Draw one multinomial sample of `trials` over `probabilities`
///
/// Bins are filled one at a time with binomial draws on the probability
/// conditional on the bins already filled; the last bin takes whatever trials
/// are left. Returns `None` if the distribution is empty or holds a
/// non-finite value.
pub fn multinomial_counts<R: Rng + ?Sized>(
    trials: u64,
    probabilities: &[f64],
    rng: &mut R,
) -> Option<Vec<u64>> {
    let (last, leading) = probabilities.split_last()?;
    if !last.is_finite() || leading.iter().any(|p| !p.is_finite()) {
        return None;
    }

    let mut counts = vec![0; probabilities.len()];
    let mut remaining = trials;
    let mut mass = 1.0;

    for (count, &p) in counts.iter_mut().zip(leading) {
        if remaining == 0 {
            break;
        }
        let conditional = if mass > 0.0 {
            (p / mass).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let drawn = Binomial::new(remaining, conditional).ok()?.sample(rng);
        *count = drawn;
        remaining -= drawn;
        mass -= p;
    }

    if let Some(tail) = counts.last_mut() {
        *tail += remaining;
    }
    Some(counts)
}

/// Index drawn most often in `sample_count` trials; lowest index wins ties
pub fn sample_mode<R: Rng + ?Sized>(
    probabilities: &[f64],
    sample_count: u64,
    rng: &mut R,
) -> Option<usize> {
    if sample_count == 0 {
        return None;
    }
    let counts = multinomial_counts(sample_count, probabilities, rng)?;
    let counts: Vec<f64> = counts.into_iter().map(|c| c as f64).collect();
    Some(argmax(&counts))
}

/// Writes messages with a trained model
pub struct SequenceGenerator<'a, M: NextTokenModel> {
    model: &'a M,
    sentinels: Sentinels,
    config: GenerationConfig,
}

impl<'a, M: NextTokenModel> SequenceGenerator<'a, M> {
    pub fn new(model: &'a M, sentinels: Sentinels) -> Self {
        Self {
            model,
            sentinels,
            config: GenerationConfig::default(),
        }
    }

    pub fn with_config(mut self, config: GenerationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Generate one message after `seed`
    ///
    /// Returns the generated words only: the seed and the closing
    /// END_MESSAGE are stripped. An empty result means generation failed or
    /// the model ended the message straight away.
    pub fn generate<R: Rng + ?Sized>(&self, seed: &[usize], rng: &mut R) -> Vec<usize> {
        let vocab_size = self.model.vocab_size();
        if let Some(&bad) = seed.iter().find(|&&t| t >= vocab_size) {
            warn!(token = bad, vocab_size, "Seed token outside vocabulary");
            return Vec::new();
        }

        let Sentinels { end, unknown, .. } = self.sentinels;
        let mut sequence = seed.to_vec();

        loop {
            let generated = sequence.len() - seed.len();
            if generated > 0 && sequence.last() == Some(&end) {
                break;
            }
            if self.config.max_length.is_some_and(|max| generated >= max) {
                debug!(generated, "Reached maximum message length");
                break;
            }

            let distribution = self.model.next_token_distribution(&sequence);
            if distribution.len() != vocab_size {
                warn!(
                    expected = vocab_size,
                    found = distribution.len(),
                    "Distribution does not cover the vocabulary"
                );
                return Vec::new();
            }
            if distribution
                .iter()
                .enumerate()
                .all(|(i, &p)| i == unknown || p == 0.0)
            {
                warn!("No probability mass outside UNKNOWN_TOKEN");
                return Vec::new();
            }

            let token = loop {
                match sample_mode(&distribution, self.config.sample_count, rng) {
                    Some(candidate) if candidate == unknown => continue,
                    Some(candidate) => break candidate,
                    None => {
                        warn!("Distribution cannot be sampled");
                        return Vec::new();
                    }
                }
            };
            sequence.push(token);
        }

        let mut message = sequence.split_off(seed.len());
        if message.last() == Some(&end) {
            message.pop();
        }
        message
    }

    /// Generate until a message of at least `min_length` words comes out
    ///
    /// Returns `None` after `max_attempts` messages that were all too short.
    pub fn generate_accepted<R: Rng + ?Sized>(
        &self,
        seed: &[usize],
        rng: &mut R,
    ) -> Option<Vec<usize>> {
        for attempt in 0..self.config.max_attempts {
            let message = self.generate(seed, rng);
            if message.len() >= self.config.min_length {
                return Some(message);
            }
            debug!(attempt, length = message.len(), "Message too short, retrying");
        }
        None
    }
}
