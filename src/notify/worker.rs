use std::{
    sync::mpsc::{self, Receiver, SyncSender, TrySendError},
    thread::{self, JoinHandle},
};

use log::{debug, error, warn};

use super::{NotifyError, NotifyTransport};
use crate::monitor::Severity;

struct PushJob {
    title: String,
    message: String,
    severity: Severity,
}

/// Moves delivery onto a worker thread so a slow push service never stalls
/// the monitor loop. A full queue drops the message.
pub struct QueuedTransport {
    sender: Option<SyncSender<PushJob>>,
    worker: Option<JoinHandle<()>>,
}

impl QueuedTransport {
    pub fn spawn(inner: Box<dyn NotifyTransport>, depth: usize) -> Result<Self, NotifyError> {
        let (sender, receiver) = mpsc::sync_channel(depth.max(1));
        let worker = thread::Builder::new()
            .name("millwatch-push".to_string())
            .spawn(move || run_worker(inner, receiver))
            .map_err(NotifyError::Spawn)?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

impl NotifyTransport for QueuedTransport {
    fn send(&self, title: &str, message: &str, severity: Severity) -> Result<(), NotifyError> {
        let Some(sender) = &self.sender else {
            return Err(NotifyError::WorkerGone);
        };
        let job = PushJob {
            title: title.to_string(),
            message: message.to_string(),
            severity,
        };
        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(NotifyError::QueueFull),
            Err(TrySendError::Disconnected(_)) => Err(NotifyError::WorkerGone),
        }
    }

    fn close(mut self: Box<Self>) {
        // Dropping the sender lets the worker drain what is queued and exit.
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("notification worker panicked");
            }
        }
    }
}

fn run_worker(inner: Box<dyn NotifyTransport>, jobs: Receiver<PushJob>) {
    while let Ok(job) = jobs.recv() {
        match inner.send(&job.title, &job.message, job.severity) {
            Ok(()) => debug!("push delivered: '{}'", job.message),
            Err(NotifyError::MissingCredentials) => error!("no push tokens configured"),
            Err(err) => warn!("could not send push notification: {err}"),
        }
    }
    inner.close();
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Barrier, Mutex},
        time::Duration,
    };

    use super::*;
    use crate::notify::testing::RecordingTransport;

    #[test]
    fn close_delivers_everything_queued() {
        let recording = RecordingTransport::default();
        let queued = QueuedTransport::spawn(Box::new(recording.clone()), 4).unwrap();

        queued
            .send("OtherMill OK", "OtherMill monitor START", Severity::Ok)
            .unwrap();
        queued
            .send(
                "OtherMill !WARN!",
                "OtherMill monitor STOPPED (signal)",
                Severity::Warn,
            )
            .unwrap();
        Box::new(queued).close();

        let messages: Vec<String> = recording
            .messages()
            .into_iter()
            .map(|sent| sent.message)
            .collect();
        assert_eq!(
            messages,
            vec![
                "OtherMill monitor START".to_string(),
                "OtherMill monitor STOPPED (signal)".to_string()
            ]
        );
    }

    struct GatedTransport {
        gate: Arc<Barrier>,
        delivered: Arc<Mutex<u32>>,
    }

    impl NotifyTransport for GatedTransport {
        fn send(&self, _: &str, _: &str, _: Severity) -> Result<(), NotifyError> {
            self.gate.wait();
            *self.delivered.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn full_queue_rejects_instead_of_blocking() {
        let gate = Arc::new(Barrier::new(2));
        let delivered = Arc::new(Mutex::new(0));
        let queued = QueuedTransport::spawn(
            Box::new(GatedTransport {
                gate: gate.clone(),
                delivered: delivered.clone(),
            }),
            1,
        )
        .unwrap();

        // First job is taken by the worker and parks on the gate.
        queued.send("t", "one", Severity::Ok).unwrap();
        let mut queued_second = false;
        for _ in 0..200 {
            if queued.send("t", "two", Severity::Ok).is_ok() {
                queued_second = true;
                break;
            }
            thread::sleep(Duration::from_millis(5));
        }
        assert!(queued_second);
        assert!(matches!(
            queued.send("t", "three", Severity::Ok),
            Err(NotifyError::QueueFull)
        ));

        gate.wait();
        gate.wait();
        Box::new(queued).close();
        assert_eq!(*delivered.lock().unwrap(), 2);
    }
}
