//! Codec gateway: serialize a recording to JSON and stream it through an
//! optional zlib or gzip transform, and the inverse.
//!
//! The algorithm is always supplied by the caller; content is never sniffed.

use crate::data::RecordedData;
use crate::error::{RecordReplayError, Result};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use std::io::{Read, Write};

/// Default compression level for zlib and gzip (range: 0-9).
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Export selector tokens (`?compression=`).
const EXPORT_TOKEN_ZLIB: &str = "ZLIB";
const EXPORT_TOKEN_GZIP: &str = "GZIP";

/// Import selector tokens (`Content-Encoding`). zlib travels as "deflate".
const CONTENT_ENCODING_GZIP: &str = "gzip";
const CONTENT_ENCODING_ZLIB: &str = "deflate";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Zlib,
    Gzip,
}

impl Compression {
    /// Parse the export query token: `""`, `ZLIB` or `GZIP`, exact case.
    pub fn from_export_token(token: &str) -> Result<Self> {
        match token {
            "" => Ok(Self::None),
            EXPORT_TOKEN_ZLIB => Ok(Self::Zlib),
            EXPORT_TOKEN_GZIP => Ok(Self::Gzip),
            other => Err(RecordReplayError::UnsupportedCompression(other.to_string())),
        }
    }

    /// Parse an import `Content-Encoding` header: `""`, `gzip` or `deflate`.
    pub fn from_content_encoding(encoding: &str) -> Result<Self> {
        match encoding {
            "" => Ok(Self::None),
            CONTENT_ENCODING_GZIP => Ok(Self::Gzip),
            CONTENT_ENCODING_ZLIB => Ok(Self::Zlib),
            other => Err(RecordReplayError::UnsupportedCompression(other.to_string())),
        }
    }

    /// `Content-Encoding` value set on an export response, if any.
    pub fn export_content_encoding(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Zlib => Some(EXPORT_TOKEN_ZLIB),
            Self::Gzip => Some(EXPORT_TOKEN_GZIP),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zlib => "zlib",
            Self::Gzip => "gzip",
        }
    }
}

/// Encodes and decodes recordings at a fixed compression level.
#[derive(Debug, Clone, Copy)]
pub struct CodecGateway {
    level: flate2::Compression,
}

impl CodecGateway {
    pub fn new(level: u32) -> Self {
        Self {
            level: flate2::Compression::new(level.min(9)),
        }
    }

    /// Serialize `data` into `sink`, compressed with `algorithm`.
    pub fn encode_to<W: Write>(
        &self,
        data: &RecordedData,
        algorithm: Compression,
        sink: W,
    ) -> Result<()> {
        match algorithm {
            Compression::None => {
                let mut sink = sink;
                write_json(&mut sink, data, algorithm)?;
                sink.flush().map_err(|e| compression_failed(algorithm, e))
            }
            Compression::Zlib => {
                let mut encoder = ZlibEncoder::new(sink, self.level);
                write_json(&mut encoder, data, algorithm)?;
                encoder
                    .finish()
                    .map(|_| ())
                    .map_err(|e| compression_failed(algorithm, e))
            }
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(sink, self.level);
                write_json(&mut encoder, data, algorithm)?;
                encoder
                    .finish()
                    .map(|_| ())
                    .map_err(|e| compression_failed(algorithm, e))
            }
        }
    }

    pub fn encode(&self, data: &RecordedData, algorithm: Compression) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_to(data, algorithm, &mut out)?;
        Ok(out)
    }

    /// Decompress `stream` with `algorithm` and parse the result.
    pub fn decode<R: Read>(&self, stream: R, algorithm: Compression) -> Result<RecordedData> {
        let mut raw = Vec::new();
        let read = match algorithm {
            Compression::None => {
                let mut stream = stream;
                stream.read_to_end(&mut raw)
            }
            Compression::Zlib => ZlibDecoder::new(stream).read_to_end(&mut raw),
            Compression::Gzip => GzDecoder::new(stream).read_to_end(&mut raw),
        };
        read.map_err(|e| {
            RecordReplayError::DecompressionFailed(format!("{}: {}", algorithm.name(), e))
        })?;

        serde_json::from_slice(&raw).map_err(|e| RecordReplayError::MalformedData(e.to_string()))
    }
}

impl Default for CodecGateway {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

fn write_json<W: Write>(sink: &mut W, data: &RecordedData, algorithm: Compression) -> Result<()> {
    serde_json::to_writer(&mut *sink, data).map_err(|e| {
        if e.is_io() {
            compression_failed(algorithm, e)
        } else {
            RecordReplayError::MalformedData(e.to_string())
        }
    })?;
    sink.write_all(b"\n")
        .map_err(|e| compression_failed(algorithm, e))
}

fn compression_failed(algorithm: Compression, e: impl std::fmt::Display) -> RecordReplayError {
    RecordReplayError::CompressionFailed(format!("{}: {}", algorithm.name(), e))
}
