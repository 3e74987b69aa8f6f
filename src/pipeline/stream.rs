//! Response stream constructors.

use std::future::Future;

use futures_util::{stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::bridge::response::PseudoResponse;
use crate::pipeline::{ExchangeContext, ResponseStream};

/// A stream of exactly one event.
pub fn single(response: PseudoResponse) -> ResponseStream {
    stream::once(async move { response }).boxed()
}

/// A stream of a fixed, already-computed list of events.
pub fn sequence(responses: Vec<PseudoResponse>) -> ResponseStream {
    stream::iter(responses).boxed()
}

/// The emitting half of a channel-fed response stream.
#[derive(Debug, Clone)]
pub struct Emitter {
    tx: mpsc::Sender<PseudoResponse>,
    cancel: CancellationToken,
}

/// The consumer stopped listening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed;

impl Emitter {
    /// Emit one event. Fails once the stream has been dropped or cancelled.
    pub async fn emit(&self, response: PseudoResponse) -> Result<(), Closed> {
        if self.cancel.is_cancelled() {
            return Err(Closed);
        }
        self.tx.send(response).await.map_err(|_| Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }
}

/// A stream fed by `producer` running on its own task.
///
/// The producer is stopped when the exchange context is cancelled or the
/// returned stream is dropped, whichever comes first.
pub fn channel<F, Fut>(context: &ExchangeContext, capacity: usize, producer: F) -> ResponseStream
where
    F: FnOnce(Emitter) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let cancel = context.token().child_token();
    let emitter = Emitter {
        tx,
        cancel: cancel.clone(),
    };

    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = task_cancel.cancelled() => {
                tracing::trace!("Response producer cancelled");
            }
            _ = producer(emitter) => {}
        }
    });

    let guard = cancel.drop_guard();
    stream::unfold((rx, guard), |(mut rx, guard)| async move {
        rx.recv().await.map(|event| (event, (rx, guard)))
    })
    .boxed()
}
