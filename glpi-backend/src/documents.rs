//! Document transfer between Telegram and GLPI.
//!
//! GLPI ships files as base64 with a hex SHA-1. Downloads are decoded in
//! chunks into the staging directory and verified; uploads are read from the
//! staging directory and encoded.

use base64::engine::general_purpose::STANDARD;
use base64::read::DecoderReader;
use base64::write::EncoderStringWriter;
use once_cell::sync::Lazy;
use regex::Regex;
use sha1::{Digest, Sha1};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::GatewayError;
use crate::glpi::types::DocumentPayload;

const CHUNK_SIZE: usize = 64 * 1024;

/// Extensions sent back to Telegram as photos
const IMAGE_EXTENSIONS: [&str; 5] = ["bmp", "gif", "jpg", "jpeg", "png"];

const FALLBACK_NAME: &str = "document";

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/*?:"<>|\s]"#).unwrap());
static UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"_+").unwrap());

/// A verified file in the staging directory
#[derive(Debug, Clone, PartialEq)]
pub struct StagedDocument {
    pub path: PathBuf,
    /// Name as GLPI knows it, used as the Telegram caption
    pub original_name: String,
}

impl StagedDocument {
    pub fn is_image(&self) -> bool {
        is_image(&self.path)
    }
}

fn translit_char(c: char) -> Option<&'static str> {
    let latin = match c.to_lowercase().next().unwrap_or(c) {
        'а' => "a",
        'б' => "b",
        'в' => "v",
        'г' => "g",
        'д' => "d",
        'е' | 'ё' | 'э' => "e",
        'ж' => "zh",
        'з' => "z",
        'и' => "i",
        'й' => "j",
        'к' => "k",
        'л' => "l",
        'м' => "m",
        'н' => "n",
        'о' => "o",
        'п' => "p",
        'р' => "r",
        'с' => "s",
        'т' => "t",
        'у' => "u",
        'ф' => "f",
        'х' => "h",
        'ц' => "ts",
        'ч' => "ch",
        'ш' => "sh",
        'щ' => "sch",
        'ъ' | 'ь' => "",
        'ы' => "y",
        'ю' => "ju",
        'я' => "ja",
        _ => return None,
    };
    Some(latin)
}

fn transliterate(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match translit_char(c) {
            Some(latin) if c.is_uppercase() => {
                let mut chars = latin.chars();
                if let Some(first) = chars.next() {
                    out.extend(first.to_uppercase());
                    out.push_str(chars.as_str());
                }
            }
            Some(latin) => out.push_str(latin),
            None => out.push(c),
        }
    }
    out
}

/// Make a file name safe for the staging directory: path-hostile characters
/// and whitespace become `_`, runs of `_` collapse, Cyrillic becomes Latin.
pub fn sanitize_filename(name: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(name, "_");
    let collapsed = UNDERSCORES.replace_all(&replaced, "_");
    let latin = transliterate(&collapsed);
    if latin.is_empty() || latin.chars().all(|c| c == '.' || c == '_') {
        FALLBACK_NAME.to_string()
    } else {
        latin
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Decode `b64` into `dir/filename`, verifying the SHA-1 of the written bytes.
/// The directory is created if absent; on mismatch the file is removed.
pub fn b64_to_file(
    dir: &Path,
    filename: &str,
    b64: &str,
    expected_sha1: &str,
) -> Result<PathBuf, GatewayError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(filename);

    let cleaned: Vec<u8> = b64.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    let written = write_decoded(&cleaned, &path);
    let actual = match written {
        Ok(digest) => digest,
        Err(e) => {
            let _ = fs::remove_file(&path);
            return Err(e);
        }
    };

    log::debug!("[Checksum] calc: {} get: {}", actual, expected_sha1);
    if !actual.eq_ignore_ascii_case(expected_sha1.trim()) {
        log::error!("Documents: SHA-1 mismatch for {}", path.display());
        let _ = fs::remove_file(&path);
        return Err(GatewayError::ChecksumMismatch {
            expected: expected_sha1.to_string(),
            actual,
        });
    }
    Ok(path)
}

/// Stream-decode into `path`, hashing each chunk as it is written
fn write_decoded(b64: &[u8], path: &Path) -> Result<String, GatewayError> {
    let mut decoder = DecoderReader::new(b64, &STANDARD);
    let mut file = BufWriter::new(File::create(path)?);
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = decoder
            .read(&mut buf)
            .map_err(|e| GatewayError::Decode(format!("Invalid base64 payload: {}", e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        file.write_all(&buf[..n])?;
    }
    file.flush()?;
    Ok(hex::encode(hasher.finalize()))
}

/// Base64 of a file, read in chunks
pub fn file_to_b64(path: &Path) -> Result<String, GatewayError> {
    let mut reader = BufReader::with_capacity(CHUNK_SIZE, File::open(path)?);
    let mut encoder = EncoderStringWriter::new(&STANDARD);
    io::copy(&mut reader, &mut encoder)?;
    Ok(encoder.into_inner())
}

/// Hex SHA-1 of a byte slice, the checksum format GLPI uses
#[cfg(test)]
pub fn sha1_hex(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Base64 of an in-memory buffer
#[cfg(test)]
pub fn encode_bytes(bytes: &[u8]) -> String {
    use base64::Engine;
    STANDARD.encode(bytes)
}

/// Stage a `getDocument` payload off the async runtime
pub async fn stage_document(
    dir: PathBuf,
    payload: DocumentPayload,
) -> Result<StagedDocument, GatewayError> {
    tokio::task::spawn_blocking(move || {
        let name = sanitize_filename(&payload.filename);
        let path = b64_to_file(&dir, &name, &payload.base64, &payload.sha1sum)?;
        Ok(StagedDocument {
            path,
            original_name: payload.filename,
        })
    })
    .await
    .map_err(|e| GatewayError::Io(format!("Staging task failed: {}", e)))?
}

/// Encode a staged upload off the async runtime
pub async fn encode_staged(path: PathBuf) -> Result<String, GatewayError> {
    tokio::task::spawn_blocking(move || file_to_b64(&path))
        .await
        .map_err(|e| GatewayError::Io(format!("Encoding task failed: {}", e)))?
}
