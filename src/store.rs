//! Model artifact persistence.
//!
//! File format (little-endian):
//! - Header: magic bytes `FEMB`, format version `u8`, payload length `u64`
//! - Payload: bincode-encoded [`ModelArtifact`] (config, vocabulary, all six
//!   parameter tensors with explicit shapes, trained flag, save timestamp)
//! - Footer: xxhash64 checksum of all preceding bytes
//!
//! Loading validates every layer against the declared [`NetworkConfig`], so a
//! network that comes out of [`load`] can never hit a shape error later.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use bincode::Options;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::embedding::{CharVocabulary, EmbeddingNetwork, NetworkConfig, NetworkWeights};
use crate::error::{Error, Result};

pub const MAGIC: [u8; 4] = *b"FEMB";
pub const FORMAT_VERSION: u8 = 1;

const HEADER_LEN: usize = MAGIC.len() + 1 + 8;
const CHECKSUM_LEN: usize = 8;

#[derive(Debug, Serialize, Deserialize)]
struct MatrixRecord {
    rows: u64,
    cols: u64,
    data: Vec<f32>,
}

impl MatrixRecord {
    fn from_array(m: &Array2<f32>) -> Self {
        Self {
            rows: m.nrows() as u64,
            cols: m.ncols() as u64,
            data: m.iter().copied().collect(),
        }
    }

    fn into_array(self, name: &str) -> Result<Array2<f32>> {
        let shape = (self.rows as usize, self.cols as usize);
        Array2::from_shape_vec(shape, self.data).map_err(|e| {
            Error::format(format!(
                "{name} data does not fit its declared {}x{} shape: {e}",
                shape.0, shape.1
            ))
        })
    }
}

/// Everything persisted for one network.
#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    config: NetworkConfig,
    vocabulary: String,
    w1: MatrixRecord,
    b1: Vec<f32>,
    w2: MatrixRecord,
    b2: Vec<f32>,
    w3: MatrixRecord,
    b3: Vec<f32>,
    trained: bool,
    saved_at: String,
}

/// Metadata read back from an artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactInfo {
    pub version: u8,
    pub config: NetworkConfig,
    pub vocabulary: String,
    pub trained: bool,
    pub saved_at: String,
    pub parameter_count: usize,
    pub size_bytes: usize,
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// Encode a network into artifact bytes.
pub fn to_bytes(network: &EmbeddingNetwork) -> Result<Vec<u8>> {
    let w = network.weights();
    let artifact = ModelArtifact {
        config: *network.config(),
        vocabulary: network.vocabulary().symbols(),
        w1: MatrixRecord::from_array(&w.w1),
        b1: w.b1.to_vec(),
        w2: MatrixRecord::from_array(&w.w2),
        b2: w.b2.to_vec(),
        w3: MatrixRecord::from_array(&w.w3),
        b3: w.b3.to_vec(),
        trained: network.is_trained(),
        saved_at: chrono::Utc::now().to_rfc3339(),
    };

    let payload = codec()
        .serialize(&artifact)
        .map_err(|e| Error::format(format!("failed to encode model: {e}")))?;

    let mut data = Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN);
    data.extend_from_slice(&MAGIC);
    data.push(FORMAT_VERSION);
    data.extend_from_slice(&(payload.len() as u64).to_le_bytes());
    data.extend_from_slice(&payload);

    let checksum = xxhash_rust::xxh64::xxh64(&data, 0);
    data.extend_from_slice(&checksum.to_le_bytes());
    Ok(data)
}

/// Decode artifact bytes into a validated network and its metadata.
pub fn from_bytes(bytes: &[u8]) -> Result<(EmbeddingNetwork, ArtifactInfo)> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(Error::format(format!(
            "artifact is {} bytes, shorter than the minimum {}",
            bytes.len(),
            HEADER_LEN + CHECKSUM_LEN
        )));
    }
    if bytes[..MAGIC.len()] != MAGIC {
        return Err(Error::format("not a field embedding model (bad magic bytes)"));
    }

    let version = bytes[MAGIC.len()];
    if version != FORMAT_VERSION {
        return Err(Error::format(format!(
            "unsupported model format version {version} (expected {FORMAT_VERSION})"
        )));
    }

    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&bytes[MAGIC.len() + 1..HEADER_LEN]);
    let payload_len = u64::from_le_bytes(len_bytes);
    let actual_payload_len = (bytes.len() - HEADER_LEN - CHECKSUM_LEN) as u64;
    if payload_len != actual_payload_len {
        return Err(Error::format(format!(
            "header declares a {payload_len}-byte payload but {actual_payload_len} bytes follow it"
        )));
    }

    let (body, footer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let mut checksum_bytes = [0u8; 8];
    checksum_bytes.copy_from_slice(footer);
    if xxhash_rust::xxh64::xxh64(body, 0) != u64::from_le_bytes(checksum_bytes) {
        return Err(Error::format("checksum mismatch (artifact is corrupt)"));
    }

    let payload = &body[HEADER_LEN..];
    let artifact: ModelArtifact = codec()
        .with_limit(payload.len() as u64)
        .deserialize(payload)
        .map_err(|e| Error::format(format!("failed to decode model payload: {e}")))?;

    let vocabulary = CharVocabulary::from_symbols(&artifact.vocabulary)
        .map_err(|e| Error::format(format!("invalid vocabulary: {e}")))?;
    let weights = NetworkWeights {
        w1: artifact.w1.into_array("W1")?,
        b1: Array1::from(artifact.b1),
        w2: artifact.w2.into_array("W2")?,
        b2: Array1::from(artifact.b2),
        w3: artifact.w3.into_array("W3")?,
        b3: Array1::from(artifact.b3),
    };
    let network =
        EmbeddingNetwork::from_parts(artifact.config, vocabulary, weights, artifact.trained)?;

    let info = ArtifactInfo {
        version,
        config: artifact.config,
        vocabulary: artifact.vocabulary,
        trained: artifact.trained,
        saved_at: artifact.saved_at,
        parameter_count: network.weights().parameter_count(),
        size_bytes: bytes.len(),
    };
    Ok((network, info))
}

/// `model.bin` -> `model.bin.tmp`, next to the target.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Persist `network` to `path`, creating parent directories. The file is
/// written to a temporary sibling and renamed into place.
pub fn save(network: &EmbeddingNetwork, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let data = to_bytes(network)?;
    let tmp_path = temp_path(path);
    let written = std::fs::write(&tmp_path, &data)
        .and_then(|()| std::fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    info!(
        path = %path.display(),
        bytes = data.len(),
        trained = network.is_trained(),
        "model saved"
    );
    Ok(())
}

/// Load and validate a network from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<EmbeddingNetwork> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let (network, info) = from_bytes(&bytes)?;
    info!(
        path = %path.display(),
        version = info.version,
        trained = info.trained,
        saved_at = %info.saved_at,
        "model loaded"
    );
    Ok(network)
}

/// Read artifact metadata, validating the whole file.
pub fn inspect(path: impl AsRef<Path>) -> Result<ArtifactInfo> {
    let bytes = std::fs::read(path.as_ref())?;
    from_bytes(&bytes).map(|(_, info)| info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> EmbeddingNetwork {
        EmbeddingNetwork::new(NetworkConfig::default(), 17).unwrap()
    }

    #[test]
    fn bytes_round_trip_preserves_weights() {
        let net = sample();
        let bytes = to_bytes(&net).unwrap();
        assert_eq!(&bytes[..4], b"FEMB");
        assert_eq!(bytes[4], FORMAT_VERSION);

        let (loaded, info) = from_bytes(&bytes).unwrap();
        assert_eq!(loaded.weights(), net.weights());
        assert_eq!(loaded.config(), net.config());
        assert_eq!(loaded.vocabulary(), net.vocabulary());
        assert!(!info.trained);
        assert_eq!(info.parameter_count, net.weights().parameter_count());
        assert_eq!(info.size_bytes, bytes.len());
    }

    #[test]
    fn trained_flag_round_trips() {
        let net = EmbeddingNetwork::pretrained(NetworkConfig::default(), 42).unwrap();
        let (loaded, _) = from_bytes(&to_bytes(&net).unwrap()).unwrap();
        assert!(loaded.is_trained());
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = to_bytes(&sample()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(from_bytes(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = to_bytes(&sample()).unwrap();
        bytes[4] = FORMAT_VERSION + 1;
        assert!(matches!(from_bytes(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_truncation() {
        let bytes = to_bytes(&sample()).unwrap();
        assert!(matches!(from_bytes(&bytes[..bytes.len() - 1]), Err(Error::Format(_))));
        assert!(matches!(from_bytes(&bytes[..6]), Err(Error::Format(_))));
        assert!(matches!(from_bytes(&[]), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_oversized_declared_payload() {
        let mut bytes = to_bytes(&sample()).unwrap();
        bytes[MAGIC.len() + 1..HEADER_LEN].copy_from_slice(&(u64::MAX - 5).to_le_bytes());
        assert!(matches!(from_bytes(&bytes), Err(Error::Format(_))));

        bytes[MAGIC.len() + 1..HEADER_LEN].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(matches!(from_bytes(&bytes), Err(Error::Format(_))));
    }

    #[test]
    fn temp_path_appends_to_the_full_file_name() {
        assert_eq!(
            temp_path(Path::new("/models/a.bin")),
            PathBuf::from("/models/a.bin.tmp")
        );
        assert_ne!(
            temp_path(Path::new("/models/a.bin")),
            temp_path(Path::new("/models/a.json"))
        );
    }

    #[test]
    fn rejects_flipped_payload_bit() {
        let mut bytes = to_bytes(&sample()).unwrap();
        let mid = HEADER_LEN + 40;
        bytes[mid] ^= 0x01;
        assert!(matches!(from_bytes(&bytes), Err(Error::Format(_))));
    }

    /// Re-wrap a hand-built artifact with a valid header and checksum.
    fn wrap(artifact: &ModelArtifact) -> Vec<u8> {
        let payload = codec().serialize(artifact).unwrap();
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC);
        data.push(FORMAT_VERSION);
        data.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        data.extend_from_slice(&payload);
        let checksum = xxhash_rust::xxh64::xxh64(&data, 0);
        data.extend_from_slice(&checksum.to_le_bytes());
        data
    }

    fn artifact_for(net: &EmbeddingNetwork) -> ModelArtifact {
        let w = net.weights();
        ModelArtifact {
            config: *net.config(),
            vocabulary: net.vocabulary().symbols(),
            w1: MatrixRecord::from_array(&w.w1),
            b1: w.b1.to_vec(),
            w2: MatrixRecord::from_array(&w.w2),
            b2: w.b2.to_vec(),
            w3: MatrixRecord::from_array(&w.w3),
            b3: w.b3.to_vec(),
            trained: false,
            saved_at: "2026-01-01T00:00:00+00:00".into(),
        }
    }

    #[test]
    fn rejects_shape_that_disagrees_with_config() {
        let net = sample();
        let mut artifact = artifact_for(&net);
        artifact.config.hidden1_dim = 64;
        let err = from_bytes(&wrap(&artifact)).unwrap_err();
        assert!(matches!(err, Error::Format(_)), "{err}");
    }

    #[test]
    fn rejects_data_that_disagrees_with_declared_shape() {
        let net = sample();
        let mut artifact = artifact_for(&net);
        artifact.w3.data.pop();
        assert!(matches!(from_bytes(&wrap(&artifact)), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_missing_bias_values() {
        let net = sample();
        let mut artifact = artifact_for(&net);
        artifact.b2.clear();
        assert!(matches!(from_bytes(&wrap(&artifact)), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_duplicate_vocabulary() {
        let net = sample();
        let mut artifact = artifact_for(&net);
        artifact.vocabulary = "aab".into();
        assert!(matches!(from_bytes(&wrap(&artifact)), Err(Error::Format(_))));
    }

    #[test]
    fn rejects_undecodable_payload() {
        let payload = vec![0xFFu8; 16];
        let mut data = Vec::new();
        data.extend_from_slice(&MAGIC);
        data.push(FORMAT_VERSION);
        data.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        data.extend_from_slice(&payload);
        let checksum = xxhash_rust::xxh64::xxh64(&data, 0);
        data.extend_from_slice(&checksum.to_le_bytes());
        assert!(matches!(from_bytes(&data), Err(Error::Format(_))));
    }
}
