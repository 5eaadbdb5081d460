//! Concurrent GET dispatch for many catalog paths at once.
//!
//! Requests are pulled lazily from the input iterator into a bounded pool
//! (`buffer_unordered`), so at most `concurrency` are in flight. Batches
//! larger than [`CONNECTION_LIMIT`] are paced so dispatch starts stay under
//! the API's per-second connection ceiling.
//!
//! A failed request never aborts its siblings and is not retried; its slot
//! carries the error instead.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::dispatch::Dispatcher;
use super::options::CONNECTION_LIMIT;
use super::transport::ApiRequest;
use super::DispatchOptions;
use crate::error::Result;

/// Outcome of one submitted request.
#[derive(Debug)]
pub struct BatchItem<T> {
    /// Position in the submitted sequence
    pub index: usize,
    pub path: String,
    pub result: Result<T>,
}

impl<T> BatchItem<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> Result<U>) -> BatchItem<U> {
        BatchItem {
            index: self.index,
            path: self.path,
            result: self.result.and_then(f),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Spacing between dispatch starts.
///
/// An explicit delay always wins; otherwise only batches above the
/// connection ceiling are paced, at `ceil(1000 / CONNECTION_LIMIT)` ms.
pub fn pacing_interval(total: usize, options: &DispatchOptions) -> Option<Duration> {
    if let Some(delay) = options.delay() {
        return Some(delay);
    }
    if total > CONNECTION_LIMIT {
        let ms = 1000u64.div_ceil(CONNECTION_LIMIT as u64);
        return Some(Duration::from_millis(ms));
    }
    None
}

/// Keeps dispatch starts at least `spacing` apart.
///
/// Each start is measured from the previous actual start, so a stream
/// polled late or consumed slowly still never starts requests together.
struct Pacer {
    spacing: Duration,
    last_start: Mutex<Option<Instant>>,
}

impl Pacer {
    fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            last_start: Mutex::new(None),
        }
    }

    /// Wait until this request may start, then record the start
    async fn wait_turn(&self) {
        loop {
            let earliest = {
                let mut last_start = self.last_start.lock().await;
                let now = Instant::now();
                let earliest = last_start
                    .map(|prev| prev.checked_add(self.spacing).unwrap_or(now + FAR_FUTURE));
                match earliest {
                    Some(earliest) if earliest > now => earliest,
                    _ => {
                        *last_start = Some(now);
                        return;
                    }
                }
            };
            sleep_until(earliest).await;
        }
    }
}

/// Stand-in deadline when a delay overflows the clock (about 30 years)
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

#[derive(Clone)]
pub struct BatchDispatcher {
    dispatcher: Dispatcher,
}

impl BatchDispatcher {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Run the requests concurrently, yielding results in completion order.
    pub fn stream<'a, I>(
        &'a self,
        requests: I,
        options: &DispatchOptions,
    ) -> impl Stream<Item = BatchItem<String>> + Send + 'a
    where
        I: IntoIterator<Item = ApiRequest>,
        I::IntoIter: ExactSizeIterator + Send + 'a,
    {
        let requests = requests.into_iter();
        let total = requests.len();
        let spacing = pacing_interval(total, options);
        let concurrency = options.effective_concurrency();
        // Pacing happens here, so individual sends must not sleep again
        let per_request = DispatchOptions {
            delay_ms: None,
            ..options.clone()
        };
        let pacer = spacing.map(|spacing| Arc::new(Pacer::new(spacing)));

        debug!(
            total,
            concurrency,
            spacing_ms = spacing.map(|d| d.as_millis() as u64),
            "Starting batch"
        );

        stream::iter(requests.enumerate())
            .map(move |(index, request)| {
                let options = per_request.clone();
                let pacer = pacer.clone();
                async move {
                    if let Some(pacer) = pacer {
                        pacer.wait_turn().await;
                    }
                    let result = self.dispatcher.send(&request, &options).await;
                    if let Err(ref e) = result {
                        warn!(index, path = %request.path, error = %e, "Batch request failed");
                    }
                    BatchItem {
                        index,
                        path: request.path,
                        result,
                    }
                }
            })
            .buffer_unordered(concurrency)
    }

    /// Run the requests concurrently and wait for all of them.
    ///
    /// Returns one item per request, in submission order.
    pub async fn send_batch<I>(
        &self,
        requests: I,
        options: &DispatchOptions,
    ) -> Vec<BatchItem<String>>
    where
        I: IntoIterator<Item = ApiRequest>,
        I::IntoIter: ExactSizeIterator + Send,
    {
        let mut items: Vec<BatchItem<String>> = self.stream(requests, options).collect().await;
        items.sort_by_key(|item| item.index);

        let failed = items.iter().filter(|item| !item.is_ok()).count();
        info!(total = items.len(), failed, "Batch complete");
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::MockTransport;
    use crate::config::ResponseFormat;
    use std::sync::Arc;

    fn get(path: &str) -> ApiRequest {
        ApiRequest::get(path, ResponseFormat::Json)
    }

    fn batch_over(transport: Arc<MockTransport>) -> BatchDispatcher {
        BatchDispatcher::new(Dispatcher::new(transport))
    }

    #[test]
    fn test_pacing_interval() {
        let options = DispatchOptions::default();
        assert_eq!(pacing_interval(10, &options), None);
        assert_eq!(pacing_interval(75, &options), None);
        assert_eq!(pacing_interval(76, &options), Some(Duration::from_millis(14)));

        let explicit = DispatchOptions {
            delay_ms: Some(5),
            ..Default::default()
        };
        assert_eq!(pacing_interval(3, &explicit), Some(Duration::from_millis(5)));
    }

    #[tokio::test]
    async fn test_results_follow_submission_order() {
        let transport = Arc::new(
            MockTransport::new()
                .reply_with("a", 200, "A", Duration::from_millis(30))
                .reply_with("b", 200, "B", Duration::from_millis(10))
                .reply_with("c", 200, "C", Duration::from_millis(20)),
        );
        let batch = batch_over(transport);

        let items = batch
            .send_batch(vec![get("a"), get("b"), get("c")], &DispatchOptions::default())
            .await;

        let bodies: Vec<_> = items.iter().map(|i| i.result.as_ref().unwrap().as_str()).collect();
        assert_eq!(bodies, vec!["A", "B", "C"]);
        assert_eq!(items.iter().map(|i| i.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_yields_completion_order() {
        let transport = Arc::new(
            MockTransport::new()
                .reply_with("a", 200, "A", Duration::from_millis(300))
                .reply_with("b", 200, "B", Duration::from_millis(100))
                .reply_with("c", 200, "C", Duration::from_millis(200)),
        );
        let batch = batch_over(transport);

        let order: Vec<String> = batch
            .stream(vec![get("a"), get("b"), get("c")], &DispatchOptions::default())
            .map(|item| item.result.unwrap())
            .collect()
            .await;

        assert_eq!(order, vec!["B", "C", "A"]);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_its_slot() {
        let transport = Arc::new(
            MockTransport::new()
                .reply("ok-1", "1")
                .reply_with("broken", 500, "boom", Duration::ZERO)
                .reply("ok-2", "2"),
        );
        let batch = batch_over(transport.clone());

        let items = batch
            .send_batch(
                vec![get("ok-1"), get("broken"), get("ok-2")],
                &DispatchOptions::default(),
            )
            .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].result.as_ref().unwrap(), "1");
        assert_eq!(items[1].result.as_ref().unwrap_err().status(), Some(500));
        assert_eq!(items[1].path, "broken");
        assert_eq!(items[2].result.as_ref().unwrap(), "2");
        // No retry of the failed item
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_same_batch_twice_yields_same_bodies() {
        let transport = Arc::new(
            MockTransport::new()
                .reply("x", "X")
                .reply("y", "Y")
                .reply("z", "Z"),
        );
        let batch = batch_over(transport);
        let paths = ["x", "y", "z"];

        let mut first: Vec<String> = batch
            .send_batch(paths.iter().map(|p| get(p)), &DispatchOptions::default())
            .await
            .into_iter()
            .map(|i| i.result.unwrap())
            .collect();
        let mut second: Vec<String> = batch
            .send_batch(paths.iter().map(|p| get(p)), &DispatchOptions::default())
            .await
            .into_iter()
            .map(|i| i.result.unwrap())
            .collect();

        first.sort();
        second.sort();
        assert_eq!(first, second);
        assert_eq!(first, vec!["X", "Y", "Z"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_large_batch_is_paced() {
        let paths: Vec<String> = (0..100).map(|i| format!("item/{}", i)).collect();
        let transport = paths
            .iter()
            .fold(MockTransport::new(), |mock, path| mock.reply(path, "{}"));
        let transport = Arc::new(transport);
        let batch = batch_over(transport.clone());

        let items = batch
            .send_batch(paths.iter().map(|p| get(p)), &DispatchOptions::default())
            .await;
        assert!(items.iter().all(BatchItem::is_ok));

        let mut starts: Vec<Instant> = transport.calls().iter().map(|c| c.started).collect();
        starts.sort();
        assert_eq!(starts.len(), 100);
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(14));
        }
        // Spacing is handled by the batch, not by each send
        assert!(transport.calls().iter().all(|c| c.options.delay_ms.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_polled_late_is_still_paced() {
        let paths: Vec<String> = (0..100).map(|i| format!("item/{}", i)).collect();
        let transport = paths
            .iter()
            .fold(MockTransport::new(), |mock, path| mock.reply(path, "{}"));
        let transport = Arc::new(transport);
        let batch = batch_over(transport.clone());

        let stream = batch.stream(paths.iter().map(|p| get(p)), &DispatchOptions::default());
        tokio::time::sleep(Duration::from_secs(2)).await;
        let items: Vec<BatchItem<String>> = stream.collect().await;
        assert_eq!(items.len(), 100);

        let mut starts: Vec<Instant> = transport.calls().iter().map(|c| c.started).collect();
        starts.sort();
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(14));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_consumer_keeps_spacing() {
        let paths: Vec<String> = (0..80).map(|i| format!("item/{}", i)).collect();
        let transport = paths
            .iter()
            .fold(MockTransport::new(), |mock, path| mock.reply(path, "{}"));
        let transport = Arc::new(transport);
        let batch = batch_over(transport.clone());

        let mut stream = Box::pin(
            batch.stream(paths.iter().map(|p| get(p)), &DispatchOptions::default()),
        );
        let mut received = 0;
        while stream.next().await.is_some() {
            received += 1;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(received, 80);

        let mut starts: Vec<Instant> = transport.calls().iter().map(|c| c.started).collect();
        starts.sort();
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(14));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_delay_does_not_overflow() {
        let transport = Arc::new(MockTransport::new().reply("a", "A").reply("b", "B"));
        let batch = batch_over(transport.clone());
        let options = DispatchOptions {
            delay_ms: Some(u64::MAX),
            ..Default::default()
        };

        let mut stream = Box::pin(batch.stream(vec![get("a"), get("b")], &options));
        let first = stream.next().await.unwrap();

        assert_eq!(first.result.unwrap(), "A");
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_batch_is_not_paced() {
        let paths: Vec<String> = (0..10).map(|i| format!("item/{}", i)).collect();
        let transport = paths
            .iter()
            .fold(MockTransport::new(), |mock, path| mock.reply(path, "{}"));
        let transport = Arc::new(transport);
        let batch = batch_over(transport.clone());

        let begin = Instant::now();
        batch
            .send_batch(paths.iter().map(|p| get(p)), &DispatchOptions::default())
            .await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 10);
        assert!(calls.iter().all(|c| c.started == begin));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_is_respected() {
        let paths: Vec<String> = (0..6).map(|i| format!("slow/{}", i)).collect();
        let transport = paths.iter().fold(MockTransport::new(), |mock, path| {
            mock.reply_with(path, 200, "ok", Duration::from_millis(100))
        });
        let transport = Arc::new(transport);
        let batch = batch_over(transport.clone());
        let options = DispatchOptions {
            concurrency: 2,
            ..Default::default()
        };

        let begin = Instant::now();
        batch.send_batch(paths.iter().map(|p| get(p)), &options).await;

        // Three waves of two requests each
        let elapsed = Instant::now() - begin;
        assert!(elapsed >= Duration::from_millis(300));
        let in_first_wave = transport
            .calls()
            .iter()
            .filter(|c| c.started == begin)
            .count();
        assert_eq!(in_first_wave, 2);
    }
}
