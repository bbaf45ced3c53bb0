// This software is provided for non-commercial use only.
// Commercial use is strictly prohibited.
// If you use, modify, or redistribute this software, you must provide proper attribution to the original author.
// (c) 2026 Onur Tuna. All rights reserved.

//! Segment reassembly: fetch a manifest's init + media segments one by one
//! and concatenate them into a single buffer.
//!
//! Fetches are strictly sequential. Byte order in the output is the playlist
//! order; there is no partial result, the first failed fetch aborts.

use bytes::{Bytes, BytesMut};
use tracing::{debug, info};
use url::Url;

use crate::error::{NvrError, Result};
use crate::manifest::ManifestDocument;
use crate::transport::{Request, SharedTransport};

pub struct SegmentAssembler {
    transport: SharedTransport,
}

impl SegmentAssembler {
    pub fn new(transport: SharedTransport) -> Self {
        Self { transport }
    }

    /// Fetch every part of `doc` in order and return the concatenation.
    pub async fn assemble(&self, doc: &ManifestDocument) -> Result<Bytes> {
        let mut out = BytesMut::new();
        let mut parts = 0usize;

        for uri in doc.fetch_order() {
            let data = self.fetch(uri).await?;
            debug!(uri = %uri, bytes = data.len(), "Segment fetched");
            out.extend_from_slice(&data);
            parts += 1;
        }

        info!(
            parts,
            init = doc.init_uri.is_some(),
            total_bytes = out.len(),
            "Segments reassembled"
        );
        Ok(out.freeze())
    }

    /// Fetch a list of standalone files in order and concatenate them.
    pub async fn assemble_files(&self, files: &[Url]) -> Result<Bytes> {
        let mut out = BytesMut::new();
        for uri in files {
            let data = self.fetch(uri).await?;
            debug!(uri = %uri, bytes = data.len(), "Recording file fetched");
            out.extend_from_slice(&data);
        }
        Ok(out.freeze())
    }

    async fn fetch(&self, uri: &Url) -> Result<Bytes> {
        let response = self
            .transport
            .send(Request::get(uri.clone()))
            .await
            .map_err(|e| segment_error(uri, e))?;
        let response = response.error_for_status().map_err(|e| segment_error(uri, e))?;
        Ok(response.body)
    }
}

fn segment_error(uri: &Url, cause: NvrError) -> NvrError {
    NvrError::SegmentFetch { uri: uri.to_string(), reason: cause.to_string() }
}
