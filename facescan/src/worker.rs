use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::scanner::Scanner;
use crate::types::{ScanProgress, ScanSummary};
use crate::{ScanError, ScanResult};

/// Runs scans on the blocking thread pool, one at a time.
///
/// Detection is CPU bound and the store calls are synchronous, so each
/// run occupies a blocking thread. A second [`ScanWorker::start`] while a
/// run is active fails with [`ScanError::Busy`].
pub struct ScanWorker {
    scanner: Arc<Scanner>,
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when the run ends, including by panic.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ScanWorker {
    pub fn new(scanner: Scanner) -> Self {
        Self {
            scanner: Arc::new(scanner),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Starts a scan in the background. Must be called from within a
    /// Tokio runtime.
    ///
    /// `progress` runs on the scanning thread.
    pub fn start<P>(&self, folders: Vec<PathBuf>, force_rescan: bool, progress: P) -> ScanResult<ScanHandle>
    where
        P: FnMut(&ScanProgress) + Send + 'static,
    {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ScanError::Busy);
        }
        let guard = BusyGuard(self.busy.clone());

        let token = CancellationToken::new();
        let scanner = self.scanner.clone();
        let child = token.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            scanner.scan(&folders, force_rescan, progress, || child.is_cancelled())
        });
        info!(force_rescan, "background scan started");
        Ok(ScanHandle { token, task })
    }
}

/// Handle to a running background scan.
#[derive(Debug)]
pub struct ScanHandle {
    token: CancellationToken,
    task: JoinHandle<ScanResult<ScanSummary>>,
}

impl ScanHandle {
    /// Requests cancellation. The scan stops before its next file.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to end and returns its summary.
    pub async fn wait(self) -> ScanResult<ScanSummary> {
        self.task.await.map_err(|e| ScanError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::scanner::tests::{Fixture, TableDetector};
    use crate::store::GalleryStore;

    fn slow_fixture(files: usize) -> Fixture {
        let fx = Fixture::with_detector(TableDetector::new(2).with_delay(Duration::from_millis(50)));
        for i in 0..files {
            fx.write(&format!("img{i}.jpg"), &format!("content {i}"));
        }
        fx
    }

    #[tokio::test]
    async fn runs_in_background() {
        let fx = slow_fixture(3);
        let worker = ScanWorker::new(fx.scanner());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let handle = worker
            .start(fx.folders(), false, move |p| sink.lock().unwrap().push(p.current))
            .unwrap();
        let summary = handle.wait().await.unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.added, 3);
        assert!(!summary.cancelled);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert!(!worker.is_scanning());
    }

    #[tokio::test]
    async fn second_start_is_busy() {
        let fx = slow_fixture(5);
        let worker = ScanWorker::new(fx.scanner());

        let handle = worker.start(fx.folders(), false, |_| {}).unwrap();
        assert!(worker.is_scanning());
        assert!(matches!(
            worker.start(fx.folders(), false, |_| {}),
            Err(ScanError::Busy)
        ));

        handle.wait().await.unwrap();
        assert!(!worker.is_scanning());
        let again = worker.start(fx.folders(), true, |_| {}).unwrap();
        assert_eq!(again.wait().await.unwrap().added, 5);
    }

    #[tokio::test]
    async fn cancel_stops_early() {
        let fx = slow_fixture(5);
        let worker = ScanWorker::new(fx.scanner());

        let handle = worker.start(fx.folders(), false, |_| {}).unwrap();
        handle.cancel();
        let summary = handle.wait().await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.total, 5);
        assert!(summary.added < 5);
        assert!(fx.store.folder_scanned_at(fx.dir.path()).unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_run_releases_worker() {
        let fx = Fixture::new();
        fx.write("a.jpg", "a");
        fx.detector.set("a.jpg", vec![vec![1.0, 0.0, 0.0]]);
        let worker = ScanWorker::new(fx.scanner());

        let err = worker.start(fx.folders(), false, |_| {}).unwrap().wait().await;
        assert!(matches!(err, Err(ScanError::FaceId(_))));
        assert!(!worker.is_scanning());
    }
}
