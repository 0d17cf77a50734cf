//! Streaming raw-DEFLATE compression used to compress individual Pixie
//! message fragments (subject lists, data dictionaries, price syncs).
//!
//! A single [`Compressor`]/[`Decompressor`] pair is created per connection
//! and reused across messages: raw DEFLATE carries state between calls, so
//! creating a fresh one per message would break decoding on the other end.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress};

use bidfx_core::error::{BidFxError, Result};

pub struct Compressor {
    inner: Compress,
}

impl Default for Compressor {
    fn default() -> Self {
        Compressor { inner: Compress::new(Compression::new(6), false) }
    }
}

impl Compressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compress `input` and flush with `Z_SYNC_FLUSH`, so the receiver's
    /// decompressor can consume it without waiting for more data.
    pub fn compress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len());
        self.inner
            .compress_vec(input, &mut out, FlushCompress::Sync)
            .map_err(|e| BidFxError::pricing(format!("deflate compression failed: {e}")))?;
        Ok(out)
    }
}

pub struct Decompressor {
    inner: Decompress,
}

impl Default for Decompressor {
    fn default() -> Self {
        Decompressor { inner: Decompress::new(false) }
    }
}

impl Decompressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decompress(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(input.len() * 3);
        self.inner
            .decompress_vec(input, &mut out, FlushDecompress::Sync)
            .map_err(|e| BidFxError::pricing(format!("inflate decompression failed: {e}")))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_then_decompress_round_trips() {
        let mut compressor = Compressor::new();
        let mut decompressor = Decompressor::new();
        let messages: [&[u8]; 3] = [
            b"AssetClass=Fx,Currency=EUR,CurrencyPair=EURUSD,Level=1",
            b"a second fragment that shares a dictionary with the first",
            b"",
        ];
        for msg in messages {
            let compressed = compressor.compress(msg).unwrap();
            let decompressed = decompressor.decompress(&compressed).unwrap();
            assert_eq!(decompressed, msg);
        }
    }
}
