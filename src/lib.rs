//! Cardsmith: A Recurrent Network That Writes Greeting Cards
//!
//! A vanilla (Elman) recurrent language model implemented from scratch in
//! Rust. It learns next-word prediction over a corpus of short messages with
//! truncated backpropagation through time, then writes new messages by
//! sampling from its own predictions.
//!
//! # Modules
//!
//! - [`tensor`] - Dense row-major `f64` matrices
//! - [`model`] - Hyperparameters and the `{U, V, W}` parameter store
//! - [`layers`] - tanh and softmax
//! - [`forward`] - The recurrence over a token sequence
//! - [`loss`] - Cross-entropy evaluation
//! - [`bptt`] - Truncated backpropagation through time
//! - [`gradients`] - Gradient accumulators
//! - [`gradient_check`] - Finite-difference verification of BPTT
//! - [`optimizer`] - SGD and learning-rate decay
//! - [`train`] - The epoch loop
//! - [`training_logger`] - CSV and `tracing` progress reports
//! - [`checkpoint`] - Versioned binary snapshots
//! - [`vocab`] - Tokenization and the word table
//! - [`generate`] - Multinomial-mode message sampling
//!
//! # Example
//!
//! ```rust,no_run
//! use cardsmith::vocab::{split_messages, tokenize, training_pairs};
//! use cardsmith::{
//!     default_seed, Config, RnnModel, SequenceGenerator, Trainer, TrainingConfig, Vocabulary,
//! };
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let text = std::fs::read_to_string("training_data.txt")?;
//! let tokens = tokenize(&text);
//! let vocab = Vocabulary::build(&tokens, None)?;
//! let messages = split_messages(&vocab.encode(&tokens), vocab.sentinels().end);
//! let (inputs, targets) = training_pairs(&messages);
//!
//! let mut rng = StdRng::seed_from_u64(10);
//! let mut model = RnnModel::new(&Config::new(vocab.len()), &mut rng);
//! Trainer::new(TrainingConfig::default())?.train(&mut model, &inputs, &targets)?;
//!
//! let generator = SequenceGenerator::new(&model, vocab.sentinels());
//! let seed = default_seed(vocab.sentinels(), None);
//! if let Some(message) = generator.generate_accepted(&seed, &mut rng) {
//!     println!("{}", vocab.decode(&message).unwrap_or_default().join(" "));
//! }
//! # Ok::<(), cardsmith::Error>(())
//! ```

pub mod bptt;
pub mod checkpoint;
pub mod error;
pub mod forward;
pub mod generate;
pub mod gradient_check;
pub mod gradients;
pub mod layers;
pub mod loss;
pub mod model;
pub mod optimizer;
pub mod tensor;
pub mod train;
pub mod training_logger;
pub mod vocab;

// Re-export main types for convenience
pub use checkpoint::Checkpoint;
pub use error::{Error, Result};
pub use forward::ForwardPass;
pub use generate::{default_seed, GenerationConfig, NextTokenModel, SequenceGenerator};
pub use gradient_check::{
    gradient_check, GradientCheckConfig, GradientCheckReport, GradientMismatch,
};
pub use gradients::{compute_grad_norm, RnnGradients};
pub use loss::random_baseline_loss;
pub use model::{Config, Parameter, RnnModel};
pub use optimizer::{decayed_learning_rate, sgd_update};
pub use tensor::Matrix;
pub use train::{Trainer, TrainingConfig, TrainingReport, TrainingState};
pub use training_logger::TrainingLogger;
pub use vocab::{Sentinels, Vocabulary};
