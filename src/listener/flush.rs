//! Acknowledgement that a response body was handed to the connection.

use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use http_body::{Frame, SizeHint};
use tokio::sync::oneshot;

/// Response body that fires an acknowledgement once it is dropped.
///
/// hyper drops the body after its last frame was written to the connection,
/// so the acknowledgement marks the response as flushed.
struct AckBody {
    inner: Body,
    ack: Option<oneshot::Sender<()>>,
}

impl http_body::Body for AckBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for AckBody {
    fn drop(&mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(());
        }
    }
}

/// Wraps `response` so that the returned receiver resolves once its body was written.
///
/// The receiver also resolves with `Ok(())` if the response is dropped
/// without being sent, so waiting on it never hangs.
pub fn with_flush_ack(response: Response) -> (Response, oneshot::Receiver<()>) {
    let (tx, rx) = oneshot::channel();
    let response = response.map(|inner| {
        Body::new(AckBody {
            inner,
            ack: Some(tx),
        })
    });
    (response, rx)
}
