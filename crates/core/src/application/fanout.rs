// Publisher fan-out - hand one report to every publisher concurrently

use crate::application::executor::PanicGuardResult;
use crate::domain::Report;
use crate::port::{PublishError, Publisher};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// How one fan-out went, per publisher outcome
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanoutSummary {
    pub delivered: usize,
    pub failed: usize,
    /// Still running when the cancellation signal fired
    pub abandoned: usize,
}

/// Fans a completed report out to all publishers
///
/// Every publisher runs in its own task. A failure, panic or hang of one
/// publisher never keeps the others from receiving the report.
#[derive(Clone, Default)]
pub struct PublisherFanout {
    publishers: Vec<Arc<dyn Publisher>>,
}

impl PublisherFanout {
    pub fn new(publishers: Vec<Arc<dyn Publisher>>) -> Self {
        Self { publishers }
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }

    /// Publish to all and wait until each has finished or been cancelled
    pub async fn publish(&self, report: Arc<Report>, cancel: &CancellationToken) -> FanoutSummary {
        let units = self
            .publishers
            .iter()
            .map(|publisher| publish_one(Arc::clone(publisher), Arc::clone(&report), cancel));

        let mut summary = FanoutSummary::default();
        for result in futures::future::join_all(units).await {
            match result {
                Delivery::Delivered => summary.delivered += 1,
                Delivery::Failed => summary.failed += 1,
                Delivery::Abandoned => summary.abandoned += 1,
            }
        }

        debug!(
            run_id = %report.run_id(),
            delivered = summary.delivered,
            failed = summary.failed,
            abandoned = summary.abandoned,
            "Report fan-out finished"
        );

        summary
    }
}

enum Delivery {
    Delivered,
    Failed,
    Abandoned,
}

async fn publish_one(
    publisher: Arc<dyn Publisher>,
    report: Arc<Report>,
    cancel: &CancellationToken,
) -> Delivery {
    let name = publisher.name().to_string();
    let token = cancel.clone();
    let mut handle = tokio::spawn(async move { publisher.publish(report, token).await });

    tokio::select! {
        biased;
        joined = &mut handle => match PanicGuardResult::from_join(joined) {
            PanicGuardResult::Success(Ok(())) => {
                debug!(publisher = %name, "Report published");
                Delivery::Delivered
            }
            PanicGuardResult::Success(Err(PublishError::Cancelled)) => {
                debug!(publisher = %name, "Publish cancelled");
                Delivery::Abandoned
            }
            PanicGuardResult::Success(Err(e)) => {
                warn!(publisher = %name, error = %e, "Publisher failed");
                Delivery::Failed
            }
            PanicGuardResult::Panicked(msg) => {
                warn!(publisher = %name, panic_msg = %msg, "Publisher panicked");
                Delivery::Failed
            }
        },
        _ = cancel.cancelled() => {
            debug!(publisher = %name, "Stopped waiting on publisher after cancellation");
            Delivery::Abandoned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::publisher::mocks::MockPublisher;
    use std::time::Duration;

    fn report() -> Arc<Report> {
        Arc::new(Report::new("run-1", 0, Vec::new(), Duration::ZERO))
    }

    #[tokio::test]
    async fn test_failing_publisher_does_not_block_others() {
        let good = Arc::new(MockPublisher::recording("good"));
        let bad = Arc::new(MockPublisher::failing("bad", "endpoint down"));
        let boom = Arc::new(MockPublisher::panicking("boom", "publisher exploded"));
        let fanout = PublisherFanout::new(vec![
            bad.clone() as Arc<dyn Publisher>,
            boom.clone(),
            good.clone(),
        ]);

        let summary = fanout.publish(report(), &CancellationToken::new()).await;

        assert_eq!(
            summary,
            FanoutSummary {
                delivered: 1,
                failed: 2,
                abandoned: 0
            }
        );
        assert_eq!(good.received().len(), 1);
        assert_eq!(bad.call_count(), 1);
        assert_eq!(boom.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_publishers_receive_same_report() {
        let a = Arc::new(MockPublisher::recording("a"));
        let b = Arc::new(MockPublisher::recording("b"));
        let fanout = PublisherFanout::new(vec![a.clone() as Arc<dyn Publisher>, b.clone()]);
        let report = report();

        fanout.publish(Arc::clone(&report), &CancellationToken::new()).await;

        assert!(Arc::ptr_eq(&a.received()[0], &report));
        assert!(Arc::ptr_eq(&b.received()[0], &report));
    }

    #[tokio::test]
    async fn test_cancellation_stops_waiting() {
        let slow = Arc::new(MockPublisher::recording("slow").with_delay(Duration::from_secs(10)));
        let fanout = PublisherFanout::new(vec![slow.clone() as Arc<dyn Publisher>]);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let summary = tokio::time::timeout(Duration::from_secs(2), fanout.publish(report(), &cancel))
            .await
            .expect("fan-out should stop waiting after cancellation");

        assert_eq!(summary.abandoned, 1);
        assert!(slow.received().is_empty());
    }

    #[tokio::test]
    async fn test_empty_fanout() {
        let fanout = PublisherFanout::default();
        assert!(fanout.is_empty());
        let summary = fanout.publish(report(), &CancellationToken::new()).await;
        assert_eq!(summary, FanoutSummary::default());
    }
}
