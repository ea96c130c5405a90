//! Streaming reader over an object body.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{StreamExt, TryStreamExt};
use futures::stream::BoxStream;
use object_store::GetResult;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::StreamReader;

use crate::types::Error;

/// [`AsyncRead`] over the chunks of a single object download.
///
/// The body is pulled chunk by chunk as it is consumed, so memory use stays
/// bounded by the backend's chunk size regardless of object size. A failed
/// chunk surfaces as an [`io::Error`] wrapping the classified [`Error`].
pub struct ObjectReader {
    inner: StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>,
    size: u64,
}

impl ObjectReader {
    pub(crate) fn new(result: GetResult) -> Self {
        let size = result.meta.size;
        let stream = result
            .into_stream()
            .map_err(|err| io::Error::other(Error::from(err)))
            .boxed();
        Self {
            inner: StreamReader::new(stream),
            size,
        }
    }

    /// Size of the object in bytes as reported by the store.
    pub const fn size(&self) -> u64 {
        self.size
    }
}

impl std::fmt::Debug for ObjectReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectReader")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
