//! Response body types
//!
//! Fixed responses use a boxed `Full` body. Streams use [`ChannelBody`]: the
//! handler pushes chunks through a [`ChunkSender`] and hyper pulls them as
//! the socket drains. A send fails once hyper has dropped the body, which is
//! how a stream learns that its client went away.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::{Body, Frame};
use thiserror::Error;
use tokio::sync::mpsc;

pub type ResponseBody = http_body_util::combinators::BoxBody<Bytes, Infallible>;

/// Chunks buffered ahead of the socket; one keeps the producer in lockstep
const CHANNEL_CAPACITY: usize = 1;

pub fn full(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into()).boxed()
}

pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new().boxed()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("connection closed by peer")]
    Closed,
}

/// Destination for the chunks of a streamed response
pub trait ChunkSink {
    fn send_chunk(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), ChunkError>> + Send;
}

/// Producer half of a streamed body
pub struct ChunkSender {
    tx: mpsc::Sender<Bytes>,
}

impl ChunkSink for ChunkSender {
    fn send_chunk(&mut self, chunk: Bytes) -> impl Future<Output = Result<(), ChunkError>> + Send {
        let tx = &self.tx;
        async move { tx.send(chunk).await.map_err(|_| ChunkError::Closed) }
    }
}

/// Consumer half of a streamed body, handed to hyper
pub struct ChannelBody {
    rx: mpsc::Receiver<Bytes>,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        self.rx
            .poll_recv(cx)
            .map(|chunk| chunk.map(|data| Ok(Frame::data(data))))
    }
}

/// Create a connected sender/body pair
pub fn channel() -> (ChunkSender, ChannelBody) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    (ChunkSender { tx }, ChannelBody { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chunks_arrive_in_order() {
        let (mut tx, body) = channel();
        let producer = tokio::spawn(async move {
            tx.send_chunk(Bytes::from_static(b"ab")).await.unwrap();
            tx.send_chunk(Bytes::from_static(b"cd")).await.unwrap();
        });

        let collected = body.collect().await.unwrap().to_bytes();
        producer.await.unwrap();
        assert_eq!(&collected[..], b"abcd");
    }

    #[tokio::test]
    async fn test_send_fails_after_body_dropped() {
        let (mut tx, body) = channel();
        drop(body);
        assert_eq!(
            tx.send_chunk(Bytes::from_static(b"x")).await,
            Err(ChunkError::Closed)
        );
    }

    #[tokio::test]
    async fn test_full_body_size() {
        let body = full(Bytes::from_static(b"12345"));
        assert_eq!(body.size_hint().exact(), Some(5));
        assert_eq!(empty().size_hint().exact(), Some(0));
    }
}
