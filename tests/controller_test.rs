//! Controller behaviour against an in-memory file service.

use files_controller::{
    DeletePayload, DirectoryEntry, DirectoryListing, DownloadDescriptor, DownloadState, DownloadToggle,
    EntryKind, FileService, FilesController, FilesError, Notification, ProgressSink, RenamePayload,
    ServiceError, ServiceResult, ShareLink, TransferHandle, TransferOutcome, UploadEntry,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Fetch(String),
    Write(String, Vec<String>),
    AddByPath(String, String),
    MakeDir(String),
    Move(String, String),
    Delete(Vec<String>),
    DownloadLink(Vec<String>),
    ShareLink(Vec<String>),
    BeginTransfer(String),
}

#[derive(Default)]
struct State {
    listings: HashMap<String, DirectoryListing>,
    calls: Vec<Call>,
    sinks: Vec<ProgressSink>,
    write_gate: Option<Arc<Notify>>,
    fail_fetch: bool,
    fail_write: bool,
    fail_mkdir: bool,
    fail_move: bool,
    fail_delete: bool,
    fail_download_link: bool,
    fail_share: bool,
}

#[derive(Clone, Default)]
struct MemoryService {
    state: Arc<Mutex<State>>,
}

impl MemoryService {
    fn with_listing(self, path: &str, entries: Vec<DirectoryEntry>) -> Self {
        self.state.lock().unwrap().listings.insert(
            path.to_string(),
            DirectoryListing {
                path: path.to_string(),
                kind: EntryKind::Directory,
                hash: None,
                entries,
            },
        );
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    fn fetches(&self) -> usize {
        self.count(|c| matches!(c, Call::Fetch(_)))
    }

    fn last_sink(&self) -> ProgressSink {
        self.state.lock().unwrap().sinks.last().cloned().expect("no transfer started")
    }

    fn set(&self, f: impl FnOnce(&mut State)) {
        f(&mut self.state.lock().unwrap());
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

fn paths(selection: &[DirectoryEntry]) -> Vec<String> {
    selection.iter().map(|e| e.path.clone()).collect()
}

impl FileService for MemoryService {
    async fn fetch_directory(&self, path: &str) -> ServiceResult<DirectoryListing> {
        self.record(Call::Fetch(path.to_string()));
        let state = self.state.lock().unwrap();
        if state.fail_fetch {
            return Err(ServiceError::NotFound(path.to_string()));
        }
        Ok(state.listings.get(path).cloned().unwrap_or(DirectoryListing {
            path: path.to_string(),
            kind: EntryKind::Directory,
            hash: None,
            entries: Vec::new(),
        }))
    }

    async fn write(&self, base_path: &str, entries: Vec<UploadEntry>, sink: ProgressSink) -> ServiceResult<()> {
        let targets = entries.into_iter().map(|e| e.path).collect();
        self.record(Call::Write(base_path.to_string(), targets));
        sink.report(40);

        let (gate, fail) = {
            let state = self.state.lock().unwrap();
            (state.write_gate.clone(), state.fail_write)
        };
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if fail {
            return Err(ServiceError::Api("disk full".into()));
        }
        sink.report(100);
        Ok(())
    }

    async fn add_by_path(&self, base_path: &str, source: &str) -> ServiceResult<()> {
        self.record(Call::AddByPath(base_path.to_string(), source.to_string()));
        Ok(())
    }

    async fn make_directory(&self, path: &str) -> ServiceResult<()> {
        self.record(Call::MakeDir(path.to_string()));
        if self.state.lock().unwrap().fail_mkdir {
            return Err(ServiceError::Api("file already exists".into()));
        }
        Ok(())
    }

    async fn move_entry(&self, from: &str, to: &str) -> ServiceResult<()> {
        self.record(Call::Move(from.to_string(), to.to_string()));
        if self.state.lock().unwrap().fail_move {
            return Err(ServiceError::Api("target exists".into()));
        }
        Ok(())
    }

    async fn delete(&self, paths: &[String]) -> ServiceResult<()> {
        self.record(Call::Delete(paths.to_vec()));
        if self.state.lock().unwrap().fail_delete {
            return Err(ServiceError::NotFound("/three".into()));
        }
        Ok(())
    }

    async fn request_download_link(&self, selection: &[DirectoryEntry]) -> ServiceResult<DownloadDescriptor> {
        self.record(Call::DownloadLink(paths(selection)));
        if self.state.lock().unwrap().fail_download_link {
            return Err(ServiceError::Api("gateway offline".into()));
        }
        Ok(DownloadDescriptor {
            url: "http://gateway.test/ipfs/bafy".into(),
            filename: selection[0].name().to_string(),
        })
    }

    async fn request_share_link(&self, selection: &[DirectoryEntry]) -> ServiceResult<String> {
        self.record(Call::ShareLink(paths(selection)));
        if self.state.lock().unwrap().fail_share {
            return Err(ServiceError::Api("no gateway".into()));
        }
        Ok(format!("https://share.test/ipfs/{}", selection[0].name()))
    }

    async fn begin_transfer(&self, descriptor: &DownloadDescriptor, sink: ProgressSink) -> ServiceResult<TransferHandle> {
        self.record(Call::BeginTransfer(descriptor.url.clone()));
        let handle = sink.handle();
        sink.report(0);
        self.state.lock().unwrap().sinks.push(sink);
        Ok(handle)
    }
}

fn controller(service: &MemoryService) -> (FilesController<MemoryService>, UnboundedReceiver<Notification>) {
    FilesController::new(service.clone())
}

fn notifications(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

// =============================================================================
// Download
// =============================================================================

#[tokio::test]
async fn toggle_starts_then_cancels_download() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);
    let selection = [DirectoryEntry::file("/a/report.pdf")];

    let started = assert_ok!(files.toggle_download(&selection).await);
    assert_eq!(started, DownloadToggle::Started { filename: "report.pdf".into() });
    assert_eq!(files.download_state(), DownloadState { in_flight: true, progress: Some(0) });

    let sink = service.last_sink();
    sink.report(42);
    assert_eq!(files.download_state().progress, Some(42));

    let cancelled = assert_ok!(files.toggle_download(&selection).await);
    assert_eq!(cancelled, DownloadToggle::Cancelled);
    assert_eq!(files.download_state(), DownloadState::default());
    assert!(sink.is_cancelled());
    assert_eq!(sink.handle().outcome(), Some(&TransferOutcome::Cancelled));

    // Cancelling never starts a second transfer.
    assert_eq!(service.count(|c| matches!(c, Call::BeginTransfer(_))), 1);

    sink.report(99);
    assert_eq!(files.download_state(), DownloadState::default());
}

#[tokio::test]
async fn download_setup_failure_leaves_state_idle() {
    let service = MemoryService::default();
    service.set(|s| s.fail_download_link = true);
    let (mut files, mut rx) = controller(&service);

    let err = assert_err!(files.toggle_download(&[DirectoryEntry::file("/x.bin")]).await);
    assert!(matches!(err, FilesError::DownloadSetup(_)));
    assert_eq!(files.download_state(), DownloadState::default());
    assert_eq!(service.count(|c| matches!(c, Call::BeginTransfer(_))), 0);
    assert!(matches!(
        notifications(&mut rx).as_slice(),
        [Notification::DownloadFailed { .. }]
    ));
}

#[tokio::test]
async fn finished_download_is_reaped_and_announced() {
    let service = MemoryService::default();
    let (mut files, mut rx) = controller(&service);
    let selection = [DirectoryEntry::file("/movie.mp4")];

    assert_ok!(files.toggle_download(&selection).await);
    service.last_sink().finish(TransferOutcome::Completed);

    assert!(!files.download_state().in_flight);
    assert_eq!(files.reap_download(), Some(TransferOutcome::Completed));
    assert_eq!(files.reap_download(), None);
    assert_eq!(
        notifications(&mut rx),
        vec![Notification::DownloadFinished { filename: "movie.mp4".into() }]
    );

    // The next toggle starts a fresh download instead of cancelling.
    let again = assert_ok!(files.toggle_download(&selection).await);
    assert!(matches!(again, DownloadToggle::Started { .. }));
    assert_eq!(service.count(|c| matches!(c, Call::BeginTransfer(_))), 2);
}

#[tokio::test]
async fn cancel_after_completion_keeps_finished_download() {
    let service = MemoryService::default();
    let (mut files, mut rx) = controller(&service);

    assert_ok!(files.toggle_download(&[DirectoryEntry::file("/movie.mp4")]).await);
    service.last_sink().finish(TransferOutcome::Completed);

    assert!(!files.cancel_download());
    assert_eq!(service.count(|c| matches!(c, Call::BeginTransfer(_))), 1);
    assert_eq!(service.count(|c| matches!(c, Call::DownloadLink(_))), 1);

    // The finished transfer is still there to be reported.
    assert_eq!(files.reap_download(), Some(TransferOutcome::Completed));
    assert_eq!(
        notifications(&mut rx),
        vec![Notification::DownloadFinished { filename: "movie.mp4".into() }]
    );
}

#[tokio::test]
async fn cancel_download_aborts_running_transfer() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    assert!(!files.cancel_download());
    assert_ok!(files.toggle_download(&[DirectoryEntry::file("/movie.mp4")]).await);
    assert!(files.cancel_download());
    assert!(service.last_sink().is_cancelled());
    assert_eq!(files.download_state(), DownloadState::default());
    assert!(!files.cancel_download());
}

#[tokio::test]
async fn unreaped_completion_is_reported_before_next_download() {
    let service = MemoryService::default();
    let (mut files, mut rx) = controller(&service);

    assert_ok!(files.toggle_download(&[DirectoryEntry::file("/first.bin")]).await);
    service.last_sink().finish(TransferOutcome::Failed("reset by peer".into()));

    let next = assert_ok!(files.toggle_download(&[DirectoryEntry::file("/second.bin")]).await);
    assert_eq!(next, DownloadToggle::Started { filename: "second.bin".into() });
    assert_eq!(
        notifications(&mut rx),
        vec![Notification::DownloadFailed { message: "reset by peer".into() }]
    );
}

#[tokio::test]
async fn empty_download_selection_is_rejected() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);
    let err = assert_err!(files.toggle_download(&[]).await);
    assert!(matches!(err, FilesError::EmptySelection));
    assert!(service.calls().is_empty());
}

// =============================================================================
// Modals
// =============================================================================

#[tokio::test]
async fn reset_is_idempotent_for_every_modal() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);
    let selection = [DirectoryEntry::file("/a.txt")];

    files.show_rename(&selection).unwrap();
    files.show_delete(&selection).unwrap();
    let _request = files.show_share(&selection).unwrap();

    for _ in 0..2 {
        files.cancel_rename();
        files.cancel_delete();
        files.close_share();
        assert!(!files.rename_modal().is_open());
        assert_eq!(files.rename_modal().payload(), &RenamePayload::default());
        assert!(!files.delete_modal().is_open());
        assert_eq!(files.delete_modal().payload(), &DeletePayload::default());
        assert!(!files.share_modal().is_open());
        assert_eq!(files.share_modal().payload(), &ShareLink::Pending);
    }
    assert!(service.calls().is_empty());
}

// =============================================================================
// Share
// =============================================================================

#[tokio::test]
async fn share_opens_pending_then_shows_link() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    let request = files.show_share(&[DirectoryEntry::file("/pics/cat.png")]).unwrap();
    assert!(files.share_modal().is_open());
    assert_eq!(files.share_modal().payload(), &ShareLink::Pending);

    let applied = assert_ok!(files.resolve_share(request.await));
    assert!(applied);
    assert_eq!(
        files.share_modal().payload(),
        &ShareLink::Ready("https://share.test/ipfs/cat.png".into())
    );
}

#[tokio::test]
async fn late_share_link_does_not_reopen_closed_modal() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    let request = files.show_share(&[DirectoryEntry::file("/pics/cat.png")]).unwrap();
    files.close_share();

    let applied = assert_ok!(files.resolve_share(request.await));
    assert!(!applied);
    assert!(!files.share_modal().is_open());
    assert_eq!(files.share_modal().payload(), &ShareLink::Pending);
}

#[tokio::test]
async fn superseded_share_request_is_ignored() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    let first = files.show_share(&[DirectoryEntry::file("/old.txt")]).unwrap();
    let second = files.show_share(&[DirectoryEntry::file("/new.txt")]).unwrap();

    assert!(!assert_ok!(files.resolve_share(first.await)));
    assert_eq!(files.share_modal().payload(), &ShareLink::Pending);

    assert!(assert_ok!(files.resolve_share(second.await)));
    assert_eq!(
        files.share_modal().payload(),
        &ShareLink::Ready("https://share.test/ipfs/new.txt".into())
    );
}

#[tokio::test]
async fn share_failure_replaces_pending_with_error() {
    let service = MemoryService::default();
    service.set(|s| s.fail_share = true);
    let (mut files, mut rx) = controller(&service);

    let err = assert_err!(files.share(&[DirectoryEntry::file("/a.txt")]).await);
    assert!(matches!(err, FilesError::ShareLink(_)));
    assert!(files.share_modal().is_open());
    assert!(matches!(files.share_modal().payload(), ShareLink::Failed(msg) if msg.contains("no gateway")));
    assert!(matches!(
        notifications(&mut rx).as_slice(),
        [Notification::ShareFailed { .. }]
    ));
}

#[tokio::test]
async fn late_share_failure_is_reported_without_reopening() {
    let service = MemoryService::default();
    service.set(|s| s.fail_share = true);
    let (mut files, mut rx) = controller(&service);

    let request = files.show_share(&[DirectoryEntry::file("/a.txt")]).unwrap();
    files.close_share();

    let err = assert_err!(files.resolve_share(request.await));
    assert!(matches!(err, FilesError::ShareLink(_)));
    assert!(!files.share_modal().is_open());
    assert_eq!(files.share_modal().payload(), &ShareLink::Pending);
    assert!(matches!(
        notifications(&mut rx).as_slice(),
        [Notification::ShareFailed { .. }]
    ));
}

// =============================================================================
// Rename
// =============================================================================

#[tokio::test]
async fn rename_payload_describes_first_entry() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    files.show_rename(&[DirectoryEntry::file("/a/b/c.txt")]).unwrap();
    assert!(files.rename_modal().is_open());
    assert_eq!(
        files.rename_modal().payload(),
        &RenamePayload {
            folder: false,
            path: "/a/b/c.txt".into(),
            filename: "c.txt".into(),
        }
    );
}

#[tokio::test]
async fn rename_to_same_name_is_a_noop() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    files.show_rename(&[DirectoryEntry::file("/a/b/c.txt")]).unwrap();
    assert!(files.submit_rename("c.txt").is_none());
    assert!(!files.rename_modal().is_open());

    files.show_rename(&[DirectoryEntry::file("/a/b/c.txt")]).unwrap();
    assert!(files.submit_rename("").is_none());
    assert!(!files.rename_modal().is_open());

    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn rename_closes_modal_before_moving() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    files.show_rename(&[DirectoryEntry::file("/a/b/c.txt")]).unwrap();
    let op = files.submit_rename("d.txt").expect("rename should move");

    assert!(!files.rename_modal().is_open());
    assert_eq!(files.rename_modal().payload(), &RenamePayload::default());
    assert!(service.calls().is_empty());

    assert_ok!(op.await);
    assert_eq!(service.calls(), vec![Call::Move("/a/b/c.txt".into(), "/a/b/d.txt".into())]);

    // The modal is closed, so a repeated submit does nothing.
    assert!(files.submit_rename("d.txt").is_none());
    assert_eq!(service.calls().len(), 1);
}

#[tokio::test]
async fn rename_only_replaces_final_segment() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    files.show_rename(&[DirectoryEntry::directory("/c.txt/c.txt")]).unwrap();
    assert!(files.rename_modal().payload().folder);
    assert_ok!(files.submit_rename("d.txt").unwrap().await);
    assert_eq!(service.calls(), vec![Call::Move("/c.txt/c.txt".into(), "/c.txt/d.txt".into())]);
}

#[tokio::test]
async fn failed_rename_is_notified_not_reopened() {
    let service = MemoryService::default();
    service.set(|s| s.fail_move = true);
    let (mut files, mut rx) = controller(&service);

    files.show_rename(&[DirectoryEntry::file("/a.txt")]).unwrap();
    let err = assert_err!(files.submit_rename("b.txt").unwrap().await);

    assert!(matches!(err, FilesError::Operation { op: "move", .. }));
    assert!(!files.rename_modal().is_open());
    assert_eq!(
        notifications(&mut rx),
        vec![Notification::OperationFailed {
            op: "move",
            message: "API error: target exists".into(),
        }]
    );
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn delete_prompt_counts_selection() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    files
        .show_delete(&[
            DirectoryEntry::file("/one.txt"),
            DirectoryEntry::file("/two.txt"),
            DirectoryEntry::directory("/three"),
        ])
        .unwrap();

    assert!(files.delete_modal().is_open());
    assert_eq!(
        files.delete_modal().payload(),
        &DeletePayload {
            files: 2,
            folders: 1,
            paths: vec!["/one.txt".into(), "/two.txt".into(), "/three".into()],
        }
    );
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn confirm_deletes_once_as_a_batch() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    files
        .show_delete(&[DirectoryEntry::file("/one.txt"), DirectoryEntry::directory("/three")])
        .unwrap();
    let op = files.confirm_delete().expect("delete should run");
    assert!(!files.delete_modal().is_open());
    assert!(files.confirm_delete().is_none());

    assert_ok!(op.await);
    assert_eq!(
        service.calls(),
        vec![Call::Delete(vec!["/one.txt".into(), "/three".into()])]
    );
}

#[tokio::test]
async fn cancelled_delete_has_no_effect() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);

    files.show_delete(&[DirectoryEntry::file("/keep.txt")]).unwrap();
    files.cancel_delete();
    assert!(files.confirm_delete().is_none());
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn failed_delete_is_notified_and_prompt_stays_closed() {
    let service = MemoryService::default();
    service.set(|s| s.fail_delete = true);
    let (mut files, mut rx) = controller(&service);

    files.show_delete(&[DirectoryEntry::directory("/three")]).unwrap();
    let err = assert_err!(files.confirm_delete().unwrap().await);

    assert!(matches!(err, FilesError::Operation { op: "delete", .. }));
    assert!(!files.delete_modal().is_open());
    assert_eq!(files.delete_modal().payload(), &DeletePayload::default());
    assert!(matches!(
        notifications(&mut rx).as_slice(),
        [Notification::OperationFailed { op: "delete", .. }]
    ));
}

// =============================================================================
// Directory fetching
// =============================================================================

#[tokio::test]
async fn fetches_only_when_path_changes() {
    let service = MemoryService::default().with_listing("/a", vec![DirectoryEntry::file("/a/x.txt")]);
    let (mut files, _rx) = controller(&service);

    assert_ok!(files.mount("/a").await);
    assert_eq!(service.fetches(), 1);

    assert!(!assert_ok!(files.refresh("/a").await));
    assert!(!assert_ok!(files.refresh("/a").await));
    assert_eq!(service.fetches(), 1);

    assert!(assert_ok!(files.navigate_to("/b").await));
    assert_eq!(service.fetches(), 2);
    assert_eq!(files.current_path(), "/b");
}

#[tokio::test]
async fn failed_fetch_keeps_listing_and_retries() {
    let service = MemoryService::default().with_listing("/a", vec![DirectoryEntry::file("/a/x.txt")]);
    let (mut files, mut rx) = controller(&service);

    assert_ok!(files.mount("/a").await);
    service.set(|s| s.fail_fetch = true);

    let err = assert_err!(files.refresh("/c").await);
    assert!(matches!(err, FilesError::Fetch { ref path, .. } if path == "/c"));
    assert_eq!(files.listing().map(|l| l.path.as_str()), Some("/a"));
    assert!(files.fetch_error().is_some());
    assert!(matches!(
        notifications(&mut rx).as_slice(),
        [Notification::FetchFailed { path, .. }] if path == "/c"
    ));

    service.set(|s| s.fail_fetch = false);
    assert!(assert_ok!(files.refresh("/c").await));
    assert!(files.fetch_error().is_none());
    assert_eq!(service.fetches(), 3);
}

#[tokio::test]
async fn sorted_entries_follow_preference() {
    let service = MemoryService::default().with_listing(
        "/",
        vec![
            DirectoryEntry::file("/small.txt").with_size(1),
            DirectoryEntry::file("/big.txt").with_size(100),
            DirectoryEntry::directory("/docs"),
        ],
    );
    let (mut files, _rx) = controller(&service);
    assert_ok!(files.mount("/").await);

    files.update_sorting(files_controller::SortBy::Size);
    files.update_sorting(files_controller::SortBy::Size);
    let names: Vec<String> = files.sorted_entries().iter().map(|e| e.name().to_string()).collect();
    assert_eq!(names, ["docs", "big.txt", "small.txt"]);
}

// =============================================================================
// Direct operations
// =============================================================================

#[tokio::test]
async fn uploads_and_folders_resolve_under_current_path() {
    let service = MemoryService::default();
    let (mut files, _rx) = controller(&service);
    assert_ok!(files.mount("/docs").await);

    assert_ok!(files.make_dir("drafts").await);
    assert_ok!(
        files
            .add(
                vec![
                    UploadEntry::bytes("notes.md", "hi"),
                    UploadEntry::bytes("/elsewhere/abs.md", "x"),
                ],
                "",
            )
            .await
    );
    assert_ok!(files.add(vec![UploadEntry::bytes("a.txt", "a")], "/inbox").await);
    assert_ok!(files.add_by_path("/ipfs/bafyroot").await);

    assert_eq!(
        service.calls()[1..],
        [
            Call::MakeDir("/docs/drafts".into()),
            Call::Write(
                "/docs".into(),
                vec!["/docs/notes.md".into(), "/elsewhere/abs.md".into()]
            ),
            Call::Write("/inbox".into(), vec!["/inbox/a.txt".into()]),
            Call::AddByPath("/docs".into(), "/ipfs/bafyroot".into()),
        ]
    );
}

#[tokio::test]
async fn inspect_routes_to_first_hash() {
    let service = MemoryService::default();
    let (files, _rx) = controller(&service);

    let selection = [
        DirectoryEntry::file("/no-hash.txt"),
        DirectoryEntry::file("/x.txt").with_hash("bafyx"),
    ];
    assert_eq!(files.inspect(&selection).as_deref(), Some("/explore/ipfs/bafyx"));
    assert_eq!(files.inspect(&[DirectoryEntry::file("/y")]), None);
}

#[tokio::test]
async fn failed_mkdir_is_notified() {
    let service = MemoryService::default();
    service.set(|s| s.fail_mkdir = true);
    let (files, mut rx) = controller(&service);

    let err = assert_err!(files.make_dir("drafts").await);
    assert!(matches!(err, FilesError::Operation { op: "mkdir", .. }));
    assert_eq!(service.calls(), vec![Call::MakeDir("/drafts".into())]);
    assert_eq!(
        notifications(&mut rx),
        vec![Notification::OperationFailed {
            op: "mkdir",
            message: "API error: file already exists".into(),
        }]
    );
}

#[tokio::test]
async fn failed_write_is_notified_and_clears_progress() {
    let service = MemoryService::default();
    service.set(|s| s.fail_write = true);
    let (files, mut rx) = controller(&service);

    let err = assert_err!(files.add(vec![UploadEntry::bytes("a.txt", "a")], "/inbox").await);
    assert!(matches!(err, FilesError::Operation { op: "write", .. }));
    assert_eq!(files.write_progress(), None);
    assert!(matches!(
        notifications(&mut rx).as_slice(),
        [Notification::OperationFailed { op: "write", .. }]
    ));
}

#[tokio::test]
async fn write_progress_tracks_running_upload() {
    let service = MemoryService::default();
    let gate = Arc::new(Notify::new());
    service.set(|s| s.write_gate = Some(gate.clone()));
    let (files, _rx) = controller(&service);
    assert_eq!(files.write_progress(), None);

    let upload = files.add(vec![UploadEntry::bytes("big.iso", vec![0u8; 64])], "/inbox");
    tokio::pin!(upload);
    assert!(futures::poll!(&mut upload).is_pending());
    assert_eq!(files.write_progress(), Some(40));

    gate.notify_one();
    assert_ok!(upload.await);
    assert_eq!(files.write_progress(), None);
}
