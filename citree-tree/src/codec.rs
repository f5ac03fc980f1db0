//! Payload serialization for trees that store their own records.
//!
//! A codec must be self-delimiting: records are packed back to back in the Data
//! section and the decoder is handed a reader positioned at the payload, with the
//! following records still behind it.

use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::sync::Arc;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::Serialize;
use serde::de::DeserializeOwned;

use citree_io::varint::{read_varint, write_varint};

/// Upper bound on a single length-prefixed payload.
const MAX_PAYLOAD_LEN: u64 = 1 << 32;

pub trait PayloadCodec: Send + Sync {
    type Value;

    /// Name recorded in container metadata and checked when a container is opened.
    fn type_name(&self) -> String;

    fn encode(&self, value: &Self::Value, out: &mut dyn Write) -> io::Result<()>;

    fn decode(&self, input: &mut dyn Read) -> io::Result<Self::Value>;
}

impl<C: PayloadCodec + ?Sized> PayloadCodec for Arc<C> {
    type Value = C::Value;

    fn type_name(&self) -> String {
        (**self).type_name()
    }

    fn encode(&self, value: &Self::Value, out: &mut dyn Write) -> io::Result<()> {
        (**self).encode(value, out)
    }

    fn decode(&self, input: &mut dyn Read) -> io::Result<Self::Value> {
        (**self).decode(input)
    }
}

fn read_length_prefixed(input: &mut dyn Read) -> io::Result<Vec<u8>> {
    let len = read_varint(input)?;
    if len > MAX_PAYLOAD_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("payload length {len} is out of range"),
        ));
    }
    let mut bytes = Vec::new();
    input.take(len).read_to_end(&mut bytes)?;
    if (bytes.len() as u64) < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("payload truncated: {} of {len} bytes", bytes.len()),
        ));
    }
    Ok(bytes)
}

fn write_length_prefixed(bytes: &[u8], out: &mut dyn Write) -> io::Result<()> {
    write_varint(out, bytes.len() as u64)?;
    out.write_all(bytes)
}

/// UTF-8 text, length-prefixed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringCodec;

impl PayloadCodec for StringCodec {
    type Value = String;

    fn type_name(&self) -> String {
        "string".to_string()
    }

    fn encode(&self, value: &String, out: &mut dyn Write) -> io::Result<()> {
        write_length_prefixed(value.as_bytes(), out)
    }

    fn decode(&self, input: &mut dyn Read) -> io::Result<String> {
        let bytes = read_length_prefixed(input)?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// No payload at all; records carry only their boundaries.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnitCodec;

impl PayloadCodec for UnitCodec {
    type Value = ();

    fn type_name(&self) -> String {
        "unit".to_string()
    }

    fn encode(&self, _value: &(), _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    fn decode(&self, _input: &mut dyn Read) -> io::Result<()> {
        Ok(())
    }
}

///
/// Any serde type, encoded with bincode.
///
#[derive(Debug, Clone, Copy)]
pub struct BincodeCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BincodeCodec<T> {
    pub fn new() -> Self {
        BincodeCodec {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BincodeCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> PayloadCodec for BincodeCodec<T> {
    type Value = T;

    fn type_name(&self) -> String {
        format!("bincode<{}>", std::any::type_name::<T>())
    }

    fn encode(&self, value: &T, out: &mut dyn Write) -> io::Result<()> {
        bincode::serialize_into(out, value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn decode(&self, input: &mut dyn Read) -> io::Result<T> {
        bincode::deserialize_from(input).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

///
/// Gzip-compresses the output of an inner codec.
///
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipCodec<C> {
    inner: C,
}

impl<C: PayloadCodec> GzipCodec<C> {
    pub fn new(inner: C) -> Self {
        GzipCodec { inner }
    }
}

impl<C: PayloadCodec> PayloadCodec for GzipCodec<C> {
    type Value = C::Value;

    fn type_name(&self) -> String {
        format!("gzip<{}>", self.inner.type_name())
    }

    fn encode(&self, value: &C::Value, out: &mut dyn Write) -> io::Result<()> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        self.inner.encode(value, &mut encoder)?;
        let compressed = encoder.finish()?;
        write_length_prefixed(&compressed, out)
    }

    fn decode(&self, input: &mut dyn Read) -> io::Result<C::Value> {
        let compressed = read_length_prefixed(input)?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        self.inner.decode(&mut decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Transcript {
        name: String,
        score: u16,
    }

    fn encode_all<C: PayloadCodec>(codec: &C, values: &[C::Value]) -> Vec<u8> {
        let mut buf = Vec::new();
        for value in values {
            codec.encode(value, &mut buf).unwrap();
        }
        buf
    }

    fn decode_all<C: PayloadCodec>(codec: &C, bytes: &[u8], n: usize) -> Vec<C::Value> {
        let mut reader = bytes;
        let values = (0..n).map(|_| codec.decode(&mut reader).unwrap()).collect();
        assert!(reader.is_empty(), "codec left {} bytes unread", reader.len());
        values
    }

    #[rstest]
    fn test_string_codec_is_self_delimiting() {
        let values = vec!["A".to_string(), String::new(), "exon\tgene".to_string()];
        let bytes = encode_all(&StringCodec, &values);
        assert_eq!(decode_all(&StringCodec, &bytes, 3), values);
    }

    #[rstest]
    fn test_string_codec_rejects_bad_utf8() {
        let bytes = [2u8, 0xFF, 0xFE];
        let err = StringCodec.decode(&mut &bytes[..]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[rstest]
    #[case(1 << 31, io::ErrorKind::UnexpectedEof)]
    #[case(MAX_PAYLOAD_LEN + 1, io::ErrorKind::InvalidData)]
    fn test_corrupt_length_prefix(#[case] len: u64, #[case] expected: io::ErrorKind) {
        let mut bytes = Vec::new();
        write_varint(&mut bytes, len).unwrap();
        bytes.extend_from_slice(b"abc");

        let err = StringCodec.decode(&mut bytes.as_slice()).unwrap_err();
        assert_eq!(err.kind(), expected);
    }

    #[rstest]
    fn test_unit_codec_writes_nothing() {
        let bytes = encode_all(&UnitCodec, &[(), ()]);
        assert!(bytes.is_empty());
    }

    #[rstest]
    fn test_bincode_codec() {
        let codec = BincodeCodec::<Transcript>::new();
        let values = vec![
            Transcript {
                name: "tx1".to_string(),
                score: 900,
            },
            Transcript {
                name: "tx2".to_string(),
                score: 0,
            },
        ];
        let bytes = encode_all(&codec, &values);
        assert_eq!(decode_all(&codec, &bytes, 2), values);
        assert!(codec.type_name().contains("Transcript"));
    }

    #[rstest]
    fn test_gzip_codec_wraps_inner() {
        let codec = GzipCodec::new(StringCodec);
        let values = vec!["a".repeat(500), "b".to_string()];
        let bytes = encode_all(&codec, &values);
        assert!(bytes.len() < 500);
        assert_eq!(decode_all(&codec, &bytes, 2), values);
        assert_eq!(codec.type_name(), "gzip<string>");
    }

    #[rstest]
    fn test_shared_codec() {
        let codec = Arc::new(StringCodec);
        let bytes = encode_all(&codec, &["x".to_string()]);
        assert_eq!(decode_all(&codec, &bytes, 1), vec!["x".to_string()]);
        assert_eq!(codec.type_name(), "string");
    }
}
