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

use std::error::Error;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{error, info, span, trace, Level};

use crate::cancel::CancelHandle;
use crate::config;
use crate::controller::Controller;
use crate::dmx::{self, DmxSender};
use crate::lighting::{Engine, State};

/// A running simulator: the engine, its tick loop and its outputs.
pub struct Simulator {
    engine: Arc<Mutex<Engine>>,
    snapshots: watch::Receiver<State>,
    cancel_handle: CancelHandle,
    tick_thread: Option<JoinHandle<()>>,
    controller: Arc<Mutex<Option<Controller>>>,
}

impl Simulator {
    /// Builds the engine, opens the configured outputs and starts ticking. Outputs
    /// that fail to open are disabled for the session.
    pub async fn start(config: &config::Simulator) -> Result<Simulator, Box<dyn Error>> {
        let engine = Arc::new(Mutex::new(Engine::new(config)?));

        let dmx = if config.dmx().enabled() {
            let refresh = config.dmx().timeout()?;
            match dmx::connect(config.dmx()) {
                Ok(output) => Some(DmxSender::start(output, refresh)),
                Err(e) => {
                    error!(err = e.to_string(), "Unable to open DMX output, DMX disabled");
                    None
                }
            }
        } else {
            None
        };

        let controller = if config.osc().enabled() {
            match Controller::start(config.osc(), engine.clone()).await {
                Ok(controller) => Some(controller),
                Err(e) => {
                    error!(err = e.to_string(), "Unable to start OSC, OSC disabled");
                    None
                }
            }
        } else {
            None
        };

        let osc_running = controller.is_some();
        let controller = Arc::new(Mutex::new(controller));
        let initial = {
            let mut engine = engine.lock();
            engine.set_output_status(dmx.is_some(), osc_running);
            engine.snapshot()
        };
        let (snapshot_tx, snapshots) = watch::channel(initial);

        let cancel_handle = CancelHandle::new();
        let tick_thread = {
            let engine = engine.clone();
            let controller = controller.clone();
            let cancel_handle = cancel_handle.clone();
            let interval = config.tick_interval();
            thread::spawn(move || {
                Simulator::tick_loop(engine, dmx, controller, interval, snapshot_tx, cancel_handle)
            })
        };

        info!(
            tick_rate = config.tick_rate(),
            dmx = config.dmx().enabled(),
            osc = osc_running,
            "Simulator started"
        );
        Ok(Simulator {
            engine,
            snapshots,
            cancel_handle,
            tick_thread: Some(tick_thread),
            controller,
        })
    }

    fn tick_loop(
        engine: Arc<Mutex<Engine>>,
        mut dmx: Option<DmxSender>,
        controller: Arc<Mutex<Option<Controller>>>,
        interval: Duration,
        snapshots: watch::Sender<State>,
        cancel_handle: CancelHandle,
    ) {
        let span = span!(Level::INFO, "tick loop");
        let _enter = span.enter();

        let mut next_tick = Instant::now();
        while !cancel_handle.is_cancelled() {
            let dmx_connected = dmx.as_ref().is_some_and(DmxSender::is_connected);
            let osc_running = controller.lock().as_ref().is_some_and(Controller::is_running);
            let (state, universe) = {
                let mut engine = engine.lock();
                engine.set_output_status(dmx_connected, osc_running);
                engine.tick(None);
                (engine.snapshot(), engine.universe().clone())
            };

            if let Some(sender) = dmx.as_ref() {
                sender.submit(&universe);
            }
            snapshots.send_replace(state);

            next_tick += interval;
            let now = Instant::now();
            if next_tick > now {
                spin_sleep::sleep(next_tick - now);
            } else {
                trace!("Tick loop behind schedule");
                next_tick = now;
            }
        }

        if let Some(sender) = dmx.as_mut() {
            sender.stop();
        }
        info!("Tick loop stopped.");
    }

    /// The shared engine. Locking it pauses the tick loop.
    pub fn engine(&self) -> Arc<Mutex<Engine>> {
        self.engine.clone()
    }

    /// The most recently published snapshot.
    pub fn snapshot(&self) -> State {
        self.snapshots.borrow().clone()
    }

    /// A receiver that is notified after every tick.
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.snapshots.clone()
    }

    pub fn is_running(&self) -> bool {
        self.tick_thread.is_some()
    }

    /// Stops the listener and the tick loop, then waits for the loop to exit.
    pub fn stop(&mut self) {
        if let Some(mut controller) = self.controller.lock().take() {
            controller.stop();
        }

        self.cancel_handle.cancel();
        if let Some(tick_thread) = self.tick_thread.take() {
            if tick_thread.join().is_err() {
                error!("Tick loop panicked");
            }
            info!("Simulator stopped.");
        }
    }
}

impl Drop for Simulator {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;
    use std::error::Error;
    use std::time::{Duration, Instant};

    use tokio::time::timeout;

    use super::Simulator;
    use crate::config;
    use crate::lighting::ControlValue;

    fn eventually(condition: impl Fn() -> bool, message: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("{}", message);
    }

    fn simulator_config(dmx: config::Dmx, osc: config::Osc) -> config::Simulator {
        config::Simulator::new(
            Some(100),
            Some(1),
            dmx,
            osc,
            BTreeMap::from([("visual_preset".to_string(), ControlValue::from("Cube"))]),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ticks_and_publishes() -> Result<(), Box<dyn Error>> {
        let config = simulator_config(config::Dmx::default(), config::Osc::default());
        let mut simulator = Simulator::start(&config).await?;

        eventually(
            || simulator.snapshot().stats.ticks >= 3,
            "Tick loop never published a snapshot",
        );
        let state = simulator.snapshot();
        assert_eq!(state.stats.active_lasers, 8);
        assert!(!state.stats.dmx_connected);
        assert!(!state.stats.osc_running);

        simulator
            .engine()
            .lock()
            .set_control("dimmer", &ControlValue::Int(0))?;
        eventually(
            || simulator.snapshot().stats.active_lasers == 0,
            "Dimmer change never reached a snapshot",
        );

        simulator.stop();
        assert!(!simulator.is_running());
        let ticks = simulator.engine().lock().snapshot().stats.ticks;
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(simulator.engine().lock().snapshot().stats.ticks, ticks);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_osc_status_follows_controller() -> Result<(), Box<dyn Error>> {
        let config = simulator_config(
            config::Dmx::default(),
            config::Osc::new(Some(true), Some(0), None, None, None),
        );
        let mut simulator = Simulator::start(&config).await?;

        let mut snapshots = simulator.subscribe();
        timeout(Duration::from_secs(5), snapshots.changed()).await??;
        assert!(snapshots.borrow_and_update().stats.osc_running);

        if let Some(controller) = simulator.controller.lock().as_mut() {
            controller.stop();
        }
        eventually(
            || !simulator.snapshot().stats.osc_running,
            "Stopped controller still reported as running",
        );

        simulator.stop();
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_outputs_failing_to_open_are_disabled() -> Result<(), Box<dyn Error>> {
        let taken = tokio::net::UdpSocket::bind("0.0.0.0:0").await?;
        let config = simulator_config(
            config::Dmx::new(
                Some(true),
                None,
                Some("/nonexistent/ttyDMX".to_string()),
                None,
                None,
            ),
            config::Osc::new(Some(true), Some(taken.local_addr()?.port()), None, None, None),
        );
        let mut simulator = Simulator::start(&config).await?;

        let state = simulator.snapshot();
        assert!(!state.stats.dmx_connected);
        assert!(!state.stats.osc_running);
        eventually(
            || simulator.snapshot().stats.ticks > 0,
            "Tick loop never ran",
        );

        simulator.stop();
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_serial_output_receives_frames() -> Result<(), Box<dyn Error>> {
        let device = tempfile::NamedTempFile::new()?;
        let config = simulator_config(
            config::Dmx::new(
                Some(true),
                None,
                Some(device.path().to_string_lossy().to_string()),
                None,
                Some(10),
            ),
            config::Osc::default(),
        );
        let mut simulator = Simulator::start(&config).await?;

        eventually(
            || std::fs::metadata(device.path()).map(|m| m.len() >= 514).unwrap_or(false),
            "No DMX frame written",
        );
        assert!(simulator.snapshot().stats.dmx_connected);

        simulator.stop();
        let written = std::fs::read(device.path())?;
        assert_eq!(written[0], 0x7E);
        assert_eq!(written[513], 0xE7);
        Ok(())
    }
}
