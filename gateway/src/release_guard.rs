//! Guarantees a concurrency slot release fires on every request exit path,
//! including a streaming response body that outlives the handler or a
//! client disconnect that drops the body early.

use crate::rate_limiter::RateLimiter;
use axum::body::Bytes;
use http_body::{Body, Frame};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use uuid::Uuid;

struct ReleaseOnDrop {
    rate_limiter: RateLimiter,
    key_id: Uuid,
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        let rate_limiter = self.rate_limiter.clone();
        let key_id = self.key_id;
        tokio::spawn(async move { rate_limiter.release(key_id).await });
    }
}

pin_project! {
    /// Wraps a response body so the concurrency slot is released the moment
    /// the body is fully driven to completion OR dropped without being
    /// driven (e.g. client disconnect), whichever happens first.
    pub struct ReleaseGuardedBody<B> {
        #[pin]
        inner: B,
        guard: ReleaseOnDrop,
    }
}

impl<B> ReleaseGuardedBody<B> {
    pub fn new(inner: B, rate_limiter: RateLimiter, key_id: Uuid) -> Self {
        Self { inner, guard: ReleaseOnDrop { rate_limiter, key_id } }
    }
}

impl<B> Body for ReleaseGuardedBody<B>
where
    B: Body<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        this.inner.poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> http_body::SizeHint {
        self.inner.size_hint()
    }
}
