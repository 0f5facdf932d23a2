mod compress;
mod encode;
mod error;

pub use compress::{
    ContentEncoding, brotli_compress, brotli_decompress, decode_content, decode_content_prefix,
    deflate_compress,
    deflate_decompress, gzip_compress, gzip_decompress, zlib_compress, zlib_decompress,
};
pub use encode::{
    base64_decode_bytes, base64_decode_str, base64_encode_bytes, base64_encode_str,
    bytes_to_string_lossy, url_decode_str, url_encode_component,
};
pub use error::CodecError;
