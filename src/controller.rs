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
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config;
use crate::lighting::Engine;

pub mod osc;

/// Drives the engine from OSC messages.
pub struct Controller {
    local_addr: SocketAddr,
    handles: Vec<JoinHandle<()>>,
}

impl Controller {
    /// Binds the listener and starts handling messages. Must be called from
    /// within a tokio runtime.
    pub async fn start(
        config: &config::Osc,
        engine: Arc<Mutex<Engine>>,
    ) -> Result<Controller, Box<dyn Error>> {
        let driver = osc::Driver::new(config, engine)?;
        let socket = driver.bind().await?;
        let local_addr = socket.local_addr()?;

        Ok(Controller {
            local_addr,
            handles: driver.spawn(socket),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// True until the controller is stopped or its tasks exit.
    pub fn is_running(&self) -> bool {
        !self.handles.is_empty() && self.handles.iter().all(|handle| !handle.is_finished())
    }

    pub fn stop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        info!("Controller closing.");
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}
