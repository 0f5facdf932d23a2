use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};

use crate::CodecError;

const BROTLI_BUFFER_SIZE: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_WINDOW: u32 = 22;

/// Body encodings understood when normalizing a `content-encoding` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
    Brotli,
    Identity,
}

impl ContentEncoding {
    /// Unknown or absent encodings are treated as identity.
    pub fn from_header(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Identity;
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "gzip" | "x-gzip" => Self::Gzip,
            "deflate" => Self::Deflate,
            "br" => Self::Brotli,
            _ => Self::Identity,
        }
    }
}

pub fn decode_content(encoding: ContentEncoding, input: &[u8]) -> Result<Vec<u8>, CodecError> {
    match encoding {
        ContentEncoding::Gzip => gzip_decompress(input),
        // Servers disagree on whether "deflate" carries the zlib wrapper.
        ContentEncoding::Deflate => zlib_decompress(input).or_else(|_| deflate_decompress(input)),
        ContentEncoding::Brotli => brotli_decompress(input),
        ContentEncoding::Identity => Ok(input.to_vec()),
    }
}

/// Decodes as much of a cut-off stream as the decoder yields before it
/// runs out of input. Empty when nothing could be decoded.
pub fn decode_content_prefix(encoding: ContentEncoding, input: &[u8]) -> Vec<u8> {
    match encoding {
        ContentEncoding::Gzip => read_prefix(GzDecoder::new(input)),
        ContentEncoding::Deflate => {
            let wrapped = read_prefix(ZlibDecoder::new(input));
            if wrapped.is_empty() {
                read_prefix(DeflateDecoder::new(input))
            } else {
                wrapped
            }
        }
        ContentEncoding::Brotli => read_prefix(brotli::Decompressor::new(input, BROTLI_BUFFER_SIZE)),
        ContentEncoding::Identity => input.to_vec(),
    }
}

pub fn gzip_compress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input).map_err(compression_error)?;
    encoder.finish().map_err(compression_error)
}

pub fn gzip_decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    read_all(GzDecoder::new(input))
}

/// Raw deflate stream, no zlib header.
pub fn deflate_compress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input).map_err(compression_error)?;
    encoder.finish().map_err(compression_error)
}

pub fn deflate_decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    read_all(DeflateDecoder::new(input))
}

pub fn zlib_compress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input).map_err(compression_error)?;
    encoder.finish().map_err(compression_error)
}

pub fn zlib_decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    read_all(ZlibDecoder::new(input))
}

pub fn brotli_compress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::new();
    {
        let mut writer = brotli::CompressorWriter::new(
            &mut output,
            BROTLI_BUFFER_SIZE,
            BROTLI_QUALITY,
            BROTLI_WINDOW,
        );
        writer.write_all(input).map_err(compression_error)?;
        writer.flush().map_err(compression_error)?;
    }
    Ok(output)
}

pub fn brotli_decompress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    read_all(brotli::Decompressor::new(input, BROTLI_BUFFER_SIZE))
}

fn read_all(mut decoder: impl Read) -> Result<Vec<u8>, CodecError> {
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(compression_error)?;
    Ok(output)
}

fn read_prefix(mut decoder: impl Read) -> Vec<u8> {
    let mut output = Vec::new();
    let mut chunk = [0u8; BROTLI_BUFFER_SIZE];
    loop {
        match decoder.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => output.extend_from_slice(&chunk[..read]),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
    output
}

fn compression_error(err: std::io::Error) -> CodecError {
    CodecError::Compression(err.to_string())
}
