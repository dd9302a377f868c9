//! Checkpoint Format
//!
//! A checkpoint is a single binary file holding everything needed to
//! generate from a model or continue training it:
//!
//! ```text
//! magic        14 bytes  "CARDSMITH_CKPT"
//! version      u8        1
//! config       u32 length + JSON {vocab_size, hidden_dim, bptt_truncate}
//! U, V, W      each: rows u32, cols u32, rows·cols f64 (row-major)
//! vocabulary   u8 flag; if 1: u32 length + JSON array of words
//! state        u32 length + JSON {examples_seen, epoch, learning_rate,
//!                                  loss_history: [[examples_seen, loss bits]]}
//! ```
//!
//! All integers and floats are little-endian. Weights are stored as raw
//! `f64` bits, so a loaded model is bit-identical to the saved one. Losses in
//! the state JSON are written as their `u64` bit patterns for the same reason,
//! which also keeps a diverged run's `NaN` or `inf` loadable.
//!
//! Saving writes `<path>.tmp` first and renames it over `<path>`, so an
//! interrupted save leaves the previous checkpoint intact.

use crate::error::{Error, Result};
use crate::model::{Config, Parameter, RnnModel};
use crate::tensor::Matrix;
use crate::train::TrainingState;
use crate::vocab::Vocabulary;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const MAGIC: &[u8; 14] = b"CARDSMITH_CKPT";
const VERSION: u8 = 1;

/// A saved model with its vocabulary and training progress
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub model: RnnModel,
    pub vocabulary: Option<Vocabulary>,
    pub state: TrainingState,
}

impl Checkpoint {
    /// Checkpoint of a model with no vocabulary and no training history
    pub fn inference_only(model: RnnModel) -> Self {
        Self {
            model,
            vocabulary: None,
            state: TrainingState::default(),
        }
    }

    /// Save to `path`, replacing any existing file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_snapshot(path, &self.model, self.vocabulary.as_ref(), &self.state)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        let checkpoint = Self::read_from(&mut reader)?;
        info!(
            path = %path.display(),
            vocab_size = checkpoint.model.vocab_size(),
            hidden_dim = checkpoint.model.hidden_dim(),
            examples_seen = checkpoint.state.examples_seen,
            has_vocabulary = checkpoint.vocabulary.is_some(),
            "Checkpoint loaded"
        );
        Ok(checkpoint)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        write_snapshot(writer, &self.model, self.vocabulary.as_ref(), &self.state)
    }

    /// Read and validate a checkpoint
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidCheckpoint`] on a bad magic, a bad flag, a truncated
    ///   stream or a vocabulary that does not match the model
    /// - [`Error::UnsupportedVersion`] on an unknown format version
    /// - [`Error::ShapeMismatch`] when a matrix disagrees with the config
    /// - [`Error::Json`] when a JSON section does not parse
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let magic: [u8; 14] = read_array(reader)?;
        if &magic != MAGIC {
            return Err(Error::InvalidCheckpoint(
                "missing CARDSMITH_CKPT header".into(),
            ));
        }
        let [version] = read_array::<_, 1>(reader)?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let config: Config = serde_json::from_slice(&read_section(reader)?)?;

        let u = read_matrix(reader, Parameter::U, &config)?;
        let v = read_matrix(reader, Parameter::V, &config)?;
        let w = read_matrix(reader, Parameter::W, &config)?;

        let vocabulary = match read_array::<_, 1>(reader)? {
            [0] => None,
            [1] => {
                let vocab: Vocabulary = serde_json::from_slice(&read_section(reader)?)?;
                if vocab.len() != config.vocab_size {
                    return Err(Error::InvalidCheckpoint(format!(
                        "vocabulary has {} words but the model expects {}",
                        vocab.len(),
                        config.vocab_size
                    )));
                }
                Some(vocab)
            }
            [flag] => {
                return Err(Error::InvalidCheckpoint(format!(
                    "bad vocabulary flag {}",
                    flag
                )))
            }
        };

        let state: TrainingState = serde_json::from_slice(&read_section(reader)?)?;
        let model = RnnModel::from_parameters(config, u, v, w)?;

        Ok(Self {
            model,
            vocabulary,
            state,
        })
    }
}

/// Write a checkpoint of borrowed parts to `path`, atomically
pub fn save_snapshot<P: AsRef<Path>>(
    path: P,
    model: &RnnModel,
    vocabulary: Option<&Vocabulary>,
    state: &TrainingState,
) -> Result<()> {
    let path = path.as_ref();
    let tmp = tmp_path(path);

    let mut writer = BufWriter::new(File::create(&tmp)?);
    write_snapshot(&mut writer, model, vocabulary, state)?;
    let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
    file.sync_all()?;
    drop(file);
    fs::rename(&tmp, path)?;

    let bytes = fs::metadata(path)?.len();
    info!(path = %path.display(), bytes, examples_seen = state.examples_seen, "Checkpoint saved");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_snapshot<W: Write>(
    writer: &mut W,
    model: &RnnModel,
    vocabulary: Option<&Vocabulary>,
    state: &TrainingState,
) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_all(&[VERSION])?;

    write_section(writer, &serde_json::to_vec(model.config())?)?;
    for parameter in Parameter::ALL {
        write_matrix(writer, model.parameter(parameter))?;
    }

    match vocabulary {
        Some(vocab) => {
            writer.write_all(&[1])?;
            write_section(writer, &serde_json::to_vec(vocab)?)?;
        }
        None => writer.write_all(&[0])?,
    }

    write_section(writer, &serde_json::to_vec(state)?)?;
    Ok(())
}

fn write_u32<W: Write>(writer: &mut W, value: usize) -> Result<()> {
    let value = u32::try_from(value)
        .map_err(|_| Error::InvalidCheckpoint(format!("{} does not fit in u32", value)))?;
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn write_section<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    write_u32(writer, bytes.len())?;
    writer.write_all(bytes)?;
    Ok(())
}

fn write_matrix<W: Write>(writer: &mut W, matrix: &Matrix) -> Result<()> {
    write_u32(writer, matrix.rows)?;
    write_u32(writer, matrix.cols)?;
    for value in &matrix.data {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf).map_err(truncated)?;
    Ok(buf)
}

fn read_u32<R: Read>(reader: &mut R) -> Result<usize> {
    Ok(u32::from_le_bytes(read_array(reader)?) as usize)
}

fn read_section<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let len = read_u32(reader)?;
    let mut bytes = Vec::new();
    reader.take(len as u64).read_to_end(&mut bytes)?;
    if bytes.len() != len {
        return Err(Error::InvalidCheckpoint("file is truncated".into()));
    }
    Ok(bytes)
}

fn read_matrix<R: Read>(reader: &mut R, parameter: Parameter, config: &Config) -> Result<Matrix> {
    let expected = config.shape_of(parameter);
    let rows = read_u32(reader)?;
    let cols = read_u32(reader)?;
    if (rows, cols) != expected {
        return Err(Error::ShapeMismatch {
            parameter: parameter.name(),
            expected,
            found: (rows, cols),
        });
    }

    let len = rows.checked_mul(cols).ok_or_else(|| {
        Error::InvalidCheckpoint(format!("{}x{} matrix is too large", rows, cols))
    })?;
    // Sized by what is actually read, not by the header
    let mut data = Vec::new();
    for _ in 0..len {
        data.push(f64::from_le_bytes(read_array(reader)?));
    }
    Ok(Matrix::new(data, rows, cols))
}

fn truncated(err: io::Error) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::InvalidCheckpoint("file is truncated".into())
    } else {
        Error::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{tokenize, Vocabulary};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn sample_checkpoint() -> Checkpoint {
        let tokens = tokenize("START_MESSAGE thank you ! END_MESSAGE");
        let vocab = Vocabulary::build(&tokens, None).unwrap();
        let config = Config::new(vocab.len()).with_hidden_dim(3).with_bptt_truncate(2);
        let model = RnnModel::new(&config, &mut StdRng::seed_from_u64(21));
        Checkpoint {
            model,
            vocabulary: Some(vocab),
            state: TrainingState {
                examples_seen: 120,
                epoch: 10,
                learning_rate: 0.00125,
                loss_history: vec![(0, 1.9459101090932196), (60, 1.2345678901234567)],
            },
        }
    }

    fn encode(checkpoint: &Checkpoint) -> Vec<u8> {
        let mut bytes = Vec::new();
        checkpoint.write_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_round_trip_in_memory() {
        let original = sample_checkpoint();
        let bytes = encode(&original);
        assert_eq!(&bytes[..14], MAGIC);
        assert_eq!(bytes[14], VERSION);

        let restored = Checkpoint::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(restored, original);

        let x = [0, 1, 2, 3];
        assert_eq!(
            restored.model.forward(&x).outputs(),
            original.model.forward(&x).outputs()
        );
    }

    #[test]
    fn test_round_trip_file_without_vocabulary() {
        let path =
            std::env::temp_dir().join(format!("cardsmith_ckpt_{}.bin", std::process::id()));
        let mut original = sample_checkpoint();
        original.vocabulary = None;

        original.save(&path).unwrap();
        assert!(!tmp_path(&path).exists());
        let restored = Checkpoint::load(&path).unwrap();
        assert_eq!(restored, original);

        // A second save replaces the first
        let fresh = Checkpoint::inference_only(original.model.clone());
        fresh.save(&path).unwrap();
        assert_eq!(Checkpoint::load(&path).unwrap().state, TrainingState::default());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_rejects_bad_magic_and_version() {
        let mut bytes = encode(&sample_checkpoint());
        bytes[14] = 2;
        assert!(matches!(
            Checkpoint::read_from(&mut Cursor::new(&bytes)),
            Err(Error::UnsupportedVersion(2))
        ));

        bytes[0] = b'X';
        assert!(matches!(
            Checkpoint::read_from(&mut Cursor::new(&bytes)),
            Err(Error::InvalidCheckpoint(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_file() {
        let bytes = encode(&sample_checkpoint());
        for cut in [10, 40, bytes.len() - 1] {
            assert!(matches!(
                Checkpoint::read_from(&mut Cursor::new(&bytes[..cut])),
                Err(Error::InvalidCheckpoint(_))
            ));
        }
    }

    #[test]
    fn test_rejects_huge_shape_without_allocating() {
        let config = Config {
            vocab_size: u32::MAX as usize,
            hidden_dim: u32::MAX as usize,
            bptt_truncate: 4,
        };
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.push(VERSION);
        write_section(&mut bytes, &serde_json::to_vec(&config).unwrap()).unwrap();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&1.5f64.to_le_bytes());

        assert!(matches!(
            Checkpoint::read_from(&mut Cursor::new(bytes)),
            Err(Error::InvalidCheckpoint(_))
        ));
    }

    #[test]
    fn test_diverged_state_round_trips() {
        let mut checkpoint = sample_checkpoint();
        checkpoint.state.loss_history = vec![(0, 1.3), (60, f64::INFINITY), (120, f64::NAN)];

        let mut bytes = Vec::new();
        write_snapshot(
            &mut bytes,
            &checkpoint.model,
            checkpoint.vocabulary.as_ref(),
            &checkpoint.state,
        )
        .unwrap();
        let restored = Checkpoint::read_from(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(restored.model, checkpoint.model);
        let losses: Vec<f64> = restored.state.loss_history.iter().map(|&(_, l)| l).collect();
        assert_eq!(losses[0], 1.3);
        assert_eq!(losses[1], f64::INFINITY);
        assert!(losses[2].is_nan());
    }

    #[test]
    fn test_rejects_shape_disagreeing_with_config() {
        let checkpoint = sample_checkpoint();
        let mut bytes = encode(&checkpoint);

        // U's row count follows the config section
        let config_len = u32::from_le_bytes(bytes[15..19].try_into().unwrap()) as usize;
        let rows_at = 19 + config_len;
        bytes[rows_at..rows_at + 4].copy_from_slice(&4u32.to_le_bytes());

        match Checkpoint::read_from(&mut Cursor::new(bytes)) {
            Err(Error::ShapeMismatch {
                parameter,
                expected,
                found,
            }) => {
                assert_eq!(parameter, "U");
                assert_eq!(expected, (3, checkpoint.model.vocab_size()));
                assert_eq!(found, (4, checkpoint.model.vocab_size()));
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }
}
