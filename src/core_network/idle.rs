//! Read half wrapper for transfer sockets: reads fail with `TimedOut` once
//! the peer has sent nothing for a whole idle period. Every read that makes
//! progress restarts the period, so a slow but steady sender is never cut off.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::{Instant, Sleep};

pub struct IdleTimeoutReader<R> {
    inner: R,
    idle: Duration,
    deadline: Pin<Box<Sleep>>,
}

impl<R> IdleTimeoutReader<R> {
    /// Must be created inside a tokio runtime.
    pub fn new(inner: R, idle: Duration) -> Self {
        Self {
            inner,
            idle,
            deadline: Box::pin(tokio::time::sleep(idle)),
        }
    }

    /// Starts a fresh idle period, e.g. after time spent answering a chunk.
    pub fn rearm(&mut self) {
        let next = Instant::now() + self.idle;
        self.deadline.as_mut().reset(next);
    }

    pub fn idle(&self) -> Duration {
        self.idle
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for IdleTimeoutReader<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.rearm();
                Poll::Ready(result)
            }
            Poll::Pending => match this.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no data for {} ms", this.idle.as_millis()),
                ))),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}
