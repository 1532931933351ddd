use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::session::{SessionSnapshot, SessionStore};
use crate::store::KeyValueStore;

/// Default delay between the first scheduled snapshot and its write.
/// 預設的延遲寫入時間。
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

enum Command {
    Schedule(SessionSnapshot),
    Flush(Sender<()>),
    Shutdown,
}

/// Background writer that coalesces session snapshots off the caller's thread.
/// 在背景執行緒合併並寫入工作階段快照，不阻塞呼叫端。
///
/// Later snapshots replace pending ones; failures are logged and dropped.
/// 較新的快照會取代尚未寫入的快照；寫入失敗只記錄日誌。
#[derive(Debug)]
pub struct SnapshotPersister {
    sender: Option<Sender<Command>>,
    worker: Option<JoinHandle<()>>,
}

impl SnapshotPersister {
    /// Starts the worker thread which takes ownership of `store`.
    /// 啟動背景執行緒並接管 `store`。
    pub fn spawn<K>(store: SessionStore<K>, debounce: Duration) -> io::Result<Self>
    where
        K: KeyValueStore + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("codeshell-persist".into())
            .spawn(move || run(store, receiver, debounce))?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Queues `snapshot` for a debounced write.
    /// 排入延遲寫入。
    pub fn schedule(&self, snapshot: SessionSnapshot) {
        if let Some(sender) = &self.sender {
            if sender.send(Command::Schedule(snapshot)).is_err() {
                warn!("snapshot persister is gone; dropping snapshot");
            }
        }
    }

    /// Writes any pending snapshot now and waits for it.
    /// 立即寫入尚未寫出的快照並等待完成。
    pub fn flush(&self) {
        let Some(sender) = &self.sender else {
            return;
        };
        let (ack, done) = mpsc::channel();
        if sender.send(Command::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }

    /// Writes pending state and stops the worker.
    /// 寫出剩餘狀態並停止背景執行緒。
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(Command::Shutdown);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("snapshot persister thread panicked");
            }
        }
    }
}

impl Drop for SnapshotPersister {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<K: KeyValueStore>(
    mut store: SessionStore<K>,
    receiver: Receiver<Command>,
    debounce: Duration,
) {
    let mut pending: Option<SessionSnapshot> = None;
    let mut deadline: Option<Instant> = None;
    loop {
        let command = match deadline {
            Some(at) => {
                match receiver.recv_timeout(at.saturating_duration_since(Instant::now())) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => Some(Command::Shutdown),
                }
            }
            None => Some(receiver.recv().unwrap_or(Command::Shutdown)),
        };

        match command {
            None => {
                write_pending(&mut store, &mut pending);
                deadline = None;
            }
            Some(Command::Schedule(snapshot)) => {
                pending = Some(snapshot);
                // The deadline is fixed by the first pending snapshot.
                deadline.get_or_insert_with(|| Instant::now() + debounce);
            }
            Some(Command::Flush(ack)) => {
                write_pending(&mut store, &mut pending);
                deadline = None;
                let _ = ack.send(());
            }
            Some(Command::Shutdown) => {
                write_pending(&mut store, &mut pending);
                break;
            }
        }
    }
    debug!("snapshot persister stopped");
}

fn write_pending<K: KeyValueStore>(
    store: &mut SessionStore<K>,
    pending: &mut Option<SessionSnapshot>,
) {
    let Some(snapshot) = pending.take() else {
        return;
    };
    match store.save(&snapshot) {
        Ok(()) => debug!(files = snapshot.opened_files.len(), "session snapshot written"),
        Err(err) => warn!(%err, "failed to write session snapshot"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::path::PathBuf;

    fn snapshot(files: &[&str]) -> SessionSnapshot {
        SessionSnapshot {
            opened_files: files.iter().map(PathBuf::from).collect(),
            ..SessionSnapshot::default()
        }
    }

    #[test]
    fn flush_writes_only_the_latest_snapshot() {
        let backing = MemoryStore::new();
        let persister =
            SnapshotPersister::spawn(SessionStore::new(backing.clone()), Duration::from_secs(60))
                .unwrap();

        persister.schedule(snapshot(&["/a"]));
        persister.schedule(snapshot(&["/a", "/b"]));
        persister.schedule(snapshot(&["/c"]));
        persister.flush();

        assert_eq!(backing.writes(), 1);
        let loaded = SessionStore::new(backing).load().unwrap().unwrap();
        assert_eq!(loaded.opened_files, vec![PathBuf::from("/c")]);
    }

    #[test]
    fn debounce_elapses_without_flush() {
        let backing = MemoryStore::new();
        let persister =
            SnapshotPersister::spawn(SessionStore::new(backing.clone()), Duration::from_millis(10))
                .unwrap();
        persister.schedule(snapshot(&["/a"]));

        let started = Instant::now();
        while backing.writes() == 0 && started.elapsed() < Duration::from_secs(5) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(backing.writes(), 1);
        persister.shutdown();
    }

    #[test]
    fn drop_writes_pending_snapshot() {
        let backing = MemoryStore::new();
        {
            let persister = SnapshotPersister::spawn(
                SessionStore::new(backing.clone()),
                Duration::from_secs(60),
            )
            .unwrap();
            persister.schedule(snapshot(&["/kept"]));
        }
        let loaded = SessionStore::new(backing).load().unwrap().unwrap();
        assert_eq!(loaded.opened_files, vec![PathBuf::from("/kept")]);
    }

    #[test]
    fn flush_without_pending_state_does_not_write() {
        let backing = MemoryStore::new();
        let persister =
            SnapshotPersister::spawn(SessionStore::new(backing.clone()), DEFAULT_DEBOUNCE)
                .unwrap();
        persister.flush();
        assert_eq!(backing.writes(), 0);
    }
}
