//! Large-object payloads: BLOB decoding and CLOB values stored in files.
//!
//! Relative file names are resolved against the directory of the input file,
//! so an export that wrote `blob_1.data` next to `data.txt` can be re-imported
//! unchanged.

use std::{
    fs,
    path::{Path, PathBuf},
};

use base64::{Engine, engine::general_purpose::STANDARD};
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

/// How the raw text of a BLOB column is turned into bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobMode {
    /// The value names a file holding the payload.
    #[default]
    File,
    Base64,
    /// Hex digits, optionally written as `0x...` or `X'...'`.
    Hex,
}

impl BlobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlobMode::File => "file",
            BlobMode::Base64 => "base64",
            BlobMode::Hex => "hex",
        }
    }
}

impl std::str::FromStr for BlobMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" | "filename" => Ok(BlobMode::File),
            "base64" => Ok(BlobMode::Base64),
            "hex" | "ansi" => Ok(BlobMode::Hex),
            other => Err(anyhow::anyhow!("Unknown BLOB mode '{other}'")),
        }
    }
}

pub trait BlobDecoder {
    fn decode_blob(&self, raw: &str, mode: BlobMode) -> Result<Vec<u8>, ConversionError>;
}

/// Decodes BLOB text, resolving file names relative to `base_dir`.
#[derive(Debug, Clone, Default)]
pub struct FileBlobDecoder {
    base_dir: Option<PathBuf>,
}

impl FileBlobDecoder {
    pub fn new(base_dir: Option<PathBuf>) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }
}

impl BlobDecoder for FileBlobDecoder {
    fn decode_blob(&self, raw: &str, mode: BlobMode) -> Result<Vec<u8>, ConversionError> {
        let value = raw.trim();
        match mode {
            BlobMode::File => {
                let path = resolve_lob_path(value, self.base_dir.as_deref());
                fs::read(&path).map_err(|source| ConversionError::LobFile { path, source })
            }
            BlobMode::Base64 => STANDARD
                .decode(value)
                .map_err(|err| ConversionError::InvalidEncoding {
                    encoding: "base64",
                    reason: err.to_string(),
                }),
            BlobMode::Hex => {
                hex::decode(strip_hex_literal(value)).map_err(|err| {
                    ConversionError::InvalidEncoding {
                        encoding: "hex",
                        reason: err.to_string(),
                    }
                })
            }
        }
    }
}

fn strip_hex_literal(value: &str) -> &str {
    if let Some(rest) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        return rest;
    }
    value
        .strip_prefix("X'")
        .or_else(|| value.strip_prefix("x'"))
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(value)
}

pub fn resolve_lob_path(name: &str, base_dir: Option<&Path>) -> PathBuf {
    let path = Path::new(name);
    match base_dir {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

/// Loads a CLOB/XML value whose field holds a file name.
pub fn read_clob_file(
    name: &str,
    base_dir: Option<&Path>,
    encoding: &'static Encoding,
) -> Result<String, ConversionError> {
    let path = resolve_lob_path(name.trim(), base_dir);
    let bytes = fs::read(&path).map_err(|source| ConversionError::LobFile {
        path: path.clone(),
        source,
    })?;
    let (text, _, had_errors) = encoding.decode(&bytes);
    if had_errors {
        return Err(ConversionError::InvalidEncoding {
            encoding: encoding.name(),
            reason: format!("{path:?} contains undecodable bytes"),
        });
    }
    Ok(text.into_owned())
}
