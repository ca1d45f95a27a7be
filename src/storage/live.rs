//! Live query streams
//!
//! Every committed mutation publishes a [`StoreChange`] on a broadcast channel. A live query
//! subscribes first, emits one snapshot immediately, then re-runs its query for each change that
//! touches its language. Dropping the stream drops the subscription.

use futures_util::future;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;

use crate::storage::models::Language;
use crate::storage::StorageResult;

/// Buffered change events per subscriber before it starts lagging
const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Stream of query snapshots
///
/// Each poll that re-runs the query takes the connection lock synchronously, so a poll can
/// wait for an in-flight write to commit. Writes are short local transactions; a caller that
/// must never block its executor should drive the stream from a blocking task.
pub type LiveStream<T> = BoxStream<'static, StorageResult<T>>;

/// A committed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreChange {
    /// Words (or their translations) of this language changed
    Words(Language),
}

impl StoreChange {
    /// Whether a live query scoped to `language` must re-run
    pub fn affects(&self, language: Language) -> bool {
        match self {
            StoreChange::Words(changed) => *changed == language,
        }
    }
}

/// Publishes [`StoreChange`] events to every live query
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<StoreChange>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn notify(&self, change: StoreChange) {
        let receivers = self.sender.send(change).unwrap_or(0);
        tracing::trace!(?change, receivers, "store change published");
    }

    /// Raw change events, for observers that do their own re-querying
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.sender.subscribe()
    }

    /// Number of open live queries and raw subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Stream `query` results: one snapshot now, one more after every change to `language`.
    ///
    /// A lagged subscriber re-queries once instead of replaying the missed events.
    pub fn live_query<T, F>(&self, language: Language, mut query: F) -> LiveStream<T>
    where
        T: Send + 'static,
        F: FnMut() -> StorageResult<T> + Send + 'static,
    {
        // Subscribe before the first snapshot so no change slips in between.
        let changes = BroadcastStream::new(self.subscribe()).filter_map(move |event| {
            future::ready(match event {
                Ok(change) if change.affects(language) => Some(()),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "live query lagged, re-querying");
                    Some(())
                }
            })
        });

        stream::once(future::ready(()))
            .chain(changes)
            .map(move |()| query())
            .boxed()
    }
}
