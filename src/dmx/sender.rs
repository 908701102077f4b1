// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{error, info, span, trace, Level};

use super::output::DmxOutput;
use super::universe::Universe;
use crate::cancel::CancelHandle;

/// Hands universes to a dedicated output thread. At most one frame waits in the
/// channel; frames submitted while it is full are dropped.
pub struct DmxSender {
    sender: Option<Sender<Universe>>,
    connected: Arc<AtomicBool>,
    cancel_handle: CancelHandle,
    join_handle: Option<JoinHandle<()>>,
}

impl DmxSender {
    /// Starts the output thread. The last frame is resent whenever no new frame
    /// arrives within the refresh interval.
    pub fn start(output: Box<dyn DmxOutput>, refresh: Duration) -> DmxSender {
        let (sender, receiver) = bounded::<Universe>(1);
        let connected = Arc::new(AtomicBool::new(true));
        let cancel_handle = CancelHandle::new();

        let join_handle = {
            let connected = connected.clone();
            let cancel_handle = cancel_handle.clone();
            thread::spawn(move || {
                DmxSender::output_thread(output, receiver, refresh, connected, cancel_handle)
            })
        };

        DmxSender {
            sender: Some(sender),
            connected,
            cancel_handle,
            join_handle: Some(join_handle),
        }
    }

    fn output_thread(
        mut output: Box<dyn DmxOutput>,
        receiver: Receiver<Universe>,
        refresh: Duration,
        connected: Arc<AtomicBool>,
        cancel_handle: CancelHandle,
    ) {
        let span = span!(Level::INFO, "dmx output");
        let _enter = span.enter();
        info!(output = output.describe(), "DMX output started");

        let mut last: Option<Universe> = None;
        loop {
            if cancel_handle.is_cancelled() {
                break;
            }

            match receiver.recv_timeout(refresh) {
                Ok(universe) => last = Some(universe),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            let Some(universe) = last.as_ref() else {
                continue;
            };
            match output.send(universe) {
                Ok(()) => {
                    if !connected.swap(true, Ordering::AcqRel) {
                        info!("DMX output recovered");
                    }
                }
                Err(e) => {
                    if connected.swap(false, Ordering::AcqRel) {
                        error!(err = e.to_string(), "Error sending DMX frame");
                    }
                }
            }
        }

        info!("DMX output stopped");
    }

    /// Queues a frame for output. Returns false if the frame was skipped.
    pub fn submit(&self, universe: &Universe) -> bool {
        let Some(sender) = self.sender.as_ref() else {
            return false;
        };
        match sender.try_send(universe.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("DMX output busy, skipping frame");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// True unless the most recent write failed.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Stops the output thread and waits for it to exit.
    pub fn stop(&mut self) {
        self.cancel_handle.cancel();
        self.sender.take();
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                error!("DMX output thread panicked");
            }
        }
    }
}

impl Drop for DmxSender {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use std::time::Instant;

    use super::*;
    use crate::dmx::output::MockOutput;

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_frames_reach_output() {
        let mock = MockOutput::new();
        let mut sender = DmxSender::start(Box::new(mock.clone()), Duration::from_secs(10));

        let mut universe = Universe::new();
        universe.update_channel(5, 99);
        assert!(wait_for(|| sender.submit(&universe)));
        assert!(wait_for(|| mock.packet_count() >= 1));
        assert_eq!(mock.last_packet().unwrap()[5], 99);

        sender.stop();
        assert!(!sender.submit(&universe));
    }

    #[test]
    fn test_resends_last_frame() {
        let mock = MockOutput::new();
        let _sender = {
            let sender = DmxSender::start(Box::new(mock.clone()), Duration::from_millis(10));
            let mut universe = Universe::new();
            universe.update_channel(1, 1);
            assert!(wait_for(|| sender.submit(&universe)));
            sender
        };

        assert!(wait_for(|| mock.packet_count() >= 3));
    }

    #[test]
    fn test_failures_mark_disconnected() {
        let mock = MockOutput::new();
        mock.fail(true);
        let sender = DmxSender::start(Box::new(mock.clone()), Duration::from_millis(10));
        assert!(wait_for(|| sender.submit(&Universe::new())));
        assert!(wait_for(|| !sender.is_connected()));

        mock.fail(false);
        assert!(wait_for(|| sender.is_connected()));
    }
}
