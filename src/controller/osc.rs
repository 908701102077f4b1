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

use std::{
    error::Error,
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
};

use parking_lot::Mutex;
use rosc::{
    address::{Matcher, OscAddress},
    OscMessage, OscPacket, OscType,
};
use tokio::{
    net::UdpSocket,
    select,
    sync::{
        broadcast::{self, error::RecvError},
        mpsc::{self, Receiver, Sender},
    },
};
use tracing::{debug, error, info, span, warn, Level};

use crate::{
    config,
    lighting::{
        controls::{EffectApplication, Labeled, ScrollDirection, VisualPreset},
        ControlChange, ControlValue, Engine,
    },
};

/// Fade toggle values for on and off.
const FADE_ON: i64 = 90;
const FADE_OFF: i64 = 20;

/// Phase toggle values for on and off.
const PHASE_ON: i64 = 35;
const PHASE_OFF: i64 = 0;

/// Toggle arguments above this are "on".
const TOGGLE_THRESHOLD: f64 = 0.5;

/// Errors raised while turning an OSC message into a control update.
#[derive(Debug, thiserror::Error)]
pub enum OscDecodeError {
    #[error("invalid OSC address {address}: {message}")]
    Address { address: String, message: String },

    #[error("{0} requires an argument")]
    MissingArgument(String),

    #[error("{address} cannot use argument {argument}")]
    InvalidArgument { address: String, argument: String },
}

/// A decoded control change.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlUpdate {
    pub name: String,
    pub value: ControlValue,
}

impl ControlUpdate {
    fn new(name: &str, value: impl Into<ControlValue>) -> ControlUpdate {
        ControlUpdate {
            name: name.to_string(),
            value: value.into(),
        }
    }
}

/// How the first argument of a matched message becomes a control value.
enum Handler {
    /// 0..1 scaled to 0..100, truncated.
    Percent(&'static str),
    /// A threshold toggle between two fixed values.
    Toggle {
        control: &'static str,
        on: i64,
        off: i64,
    },
    /// A threshold toggle of a boolean control.
    Flag(&'static str),
    /// An option label. Unknown labels fall back to the default option.
    Label {
        control: &'static str,
        labels: Vec<&'static str>,
        fallback: &'static str,
    },
    /// A whole number.
    Integer(&'static str),
}

impl Handler {
    fn label<T: Labeled>(control: &'static str) -> Handler {
        Handler::Label {
            control,
            labels: T::labels(),
            fallback: T::default().label(),
        }
    }
}

/// Maps the OSC namespace under a prefix onto control updates.
pub struct OscAdapter {
    prefix: String,
    handlers: Vec<(Matcher, Handler)>,
    catch_all: Matcher,
}

impl OscAdapter {
    pub fn new(prefix: &str) -> Result<OscAdapter, OscDecodeError> {
        let prefix = prefix.trim_end_matches('/').to_string();
        let matcher = |leaf: &str| {
            let pattern = format!("{}/{}", prefix, leaf);
            Matcher::new(&pattern).map_err(|e| OscDecodeError::Address {
                address: pattern.clone(),
                message: e.to_string(),
            })
        };

        let handlers = vec![
            (matcher("dimmer")?, Handler::Percent("dimmer")),
            (matcher("strobe")?, Handler::Percent("strobe")),
            (matcher("pulse")?, Handler::Percent("pulse")),
            (matcher("speed")?, Handler::Percent("laser_move_speed")),
            (
                matcher("fade")?,
                Handler::Toggle {
                    control: "scroll_fade",
                    on: FADE_ON,
                    off: FADE_OFF,
                },
            ),
            (
                matcher("phase")?,
                Handler::Toggle {
                    control: "scroll_phase",
                    on: PHASE_ON,
                    off: PHASE_OFF,
                },
            ),
            (matcher("loop")?, Handler::Flag("loop_effect")),
            (matcher("build")?, Handler::Flag("scroll_build_effect")),
            (matcher("beat_sync")?, Handler::Flag("beat_sync_enabled")),
            (
                matcher("preset")?,
                Handler::label::<VisualPreset>("visual_preset"),
            ),
            (
                matcher("direction")?,
                Handler::label::<ScrollDirection>("scroll_direction"),
            ),
            (
                matcher("effect_mode")?,
                Handler::label::<EffectApplication>("effect_application"),
            ),
            (matcher("laser_count")?, Handler::Integer("scroll_laser_count")),
            (matcher("bpm")?, Handler::Integer("bpm")),
        ];

        Ok(OscAdapter {
            catch_all: matcher("*")?,
            prefix,
            handlers,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Decodes every message in a packet. Messages that fail to decode are logged
    /// and skipped.
    pub fn decode_packet(&self, packet: &OscPacket) -> Vec<ControlUpdate> {
        match packet {
            OscPacket::Message(msg) => match self.decode(msg) {
                Ok(update) => update.into_iter().collect(),
                Err(e) => {
                    warn!(err = e.to_string(), "Ignoring OSC message");
                    vec![]
                }
            },
            OscPacket::Bundle(bundle) => bundle
                .content
                .iter()
                .flat_map(|packet| self.decode_packet(packet))
                .collect(),
        }
    }

    /// Decodes a single message. Addresses outside of the namespace yield nothing.
    pub fn decode(&self, msg: &OscMessage) -> Result<Option<ControlUpdate>, OscDecodeError> {
        let address =
            OscAddress::new(msg.addr.clone()).map_err(|e| OscDecodeError::Address {
                address: msg.addr.clone(),
                message: e.to_string(),
            })?;

        for (matcher, handler) in self.handlers.iter() {
            if matcher.match_address(&address) {
                return self.apply_handler(handler, msg).map(Some);
            }
        }

        if self.catch_all.match_address(&address) {
            let leaf = &msg.addr[self.prefix.len() + 1..];
            let arg = first_arg(msg)?;
            let value = match arg {
                OscType::Bool(value) => ControlValue::Bool(*value),
                OscType::Int(value) => ControlValue::Int(i64::from(*value)),
                OscType::Long(value) => ControlValue::Int(*value),
                OscType::Float(value) => ControlValue::Float(f64::from(*value)),
                OscType::Double(value) => ControlValue::Float(*value),
                OscType::String(value) => ControlValue::Text(value.clone()),
                _ => return Err(invalid_argument(msg, arg)),
            };
            return Ok(Some(ControlUpdate::new(leaf, value)));
        }

        debug!(address = msg.addr, "OSC address outside of namespace");
        Ok(None)
    }

    fn apply_handler(
        &self,
        handler: &Handler,
        msg: &OscMessage,
    ) -> Result<ControlUpdate, OscDecodeError> {
        Ok(match handler {
            Handler::Percent(control) => {
                ControlUpdate::new(control, (number_arg(msg)? * 100.0).trunc() as i64)
            }
            Handler::Toggle { control, on, off } => ControlUpdate::new(
                control,
                if number_arg(msg)? > TOGGLE_THRESHOLD {
                    *on
                } else {
                    *off
                },
            ),
            Handler::Flag(control) => {
                ControlUpdate::new(control, number_arg(msg)? > TOGGLE_THRESHOLD)
            }
            Handler::Label {
                control,
                labels,
                fallback,
            } => {
                let arg = first_arg(msg)?;
                let OscType::String(label) = arg else {
                    return Err(invalid_argument(msg, arg));
                };
                if labels.iter().any(|known| *known == label.as_str()) {
                    ControlUpdate::new(control, label.as_str())
                } else {
                    warn!(
                        control,
                        label = label.as_str(),
                        fallback,
                        "Unknown label, using default"
                    );
                    ControlUpdate::new(control, *fallback)
                }
            }
            Handler::Integer(control) => {
                ControlUpdate::new(control, number_arg(msg)?.trunc() as i64)
            }
        })
    }

    /// The status message published after a control changes.
    pub fn control_update(&self, name: &str, value: &ControlValue) -> OscMessage {
        let arg = match value {
            ControlValue::Bool(value) => OscType::Bool(*value),
            ControlValue::Int(value) => {
                OscType::Int((*value).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
            }
            ControlValue::Float(value) => OscType::Float(*value as f32),
            ControlValue::Text(value) => OscType::String(value.clone()),
        };
        OscMessage {
            addr: format!("{}/status/{}", self.prefix, name),
            args: vec![arg],
        }
    }
}

fn first_arg(msg: &OscMessage) -> Result<&OscType, OscDecodeError> {
    msg.args
        .first()
        .ok_or_else(|| OscDecodeError::MissingArgument(msg.addr.clone()))
}

fn number_arg(msg: &OscMessage) -> Result<f64, OscDecodeError> {
    let arg = first_arg(msg)?;
    match arg {
        OscType::Float(value) => Ok(f64::from(*value)),
        OscType::Double(value) => Ok(*value),
        OscType::Int(value) => Ok(f64::from(*value)),
        OscType::Long(value) => Ok(*value as f64),
        OscType::Bool(value) => Ok(if *value { 1.0 } else { 0.0 }),
        _ => Err(invalid_argument(msg, arg)),
    }
}

fn invalid_argument(msg: &OscMessage, arg: &OscType) -> OscDecodeError {
    OscDecodeError::InvalidArgument {
        address: msg.addr.clone(),
        argument: format!("{:?}", arg),
    }
}

/// Listens for OSC control messages and applies them to the engine.
pub struct Driver {
    /// The socket address to host the OSC server on.
    addr: SocketAddr,
    /// Where status messages are sent.
    status_host: String,
    status_port: u16,
    adapter: Arc<OscAdapter>,
    engine: Arc<Mutex<Engine>>,
}

impl Driver {
    pub fn new(config: &config::Osc, engine: Arc<Mutex<Engine>>) -> Result<Driver, Box<dyn Error>> {
        Ok(Driver {
            addr: SocketAddr::V4(SocketAddrV4::new(
                Ipv4Addr::UNSPECIFIED,
                config.listen_port(),
            )),
            status_host: config.send_host().to_string(),
            status_port: config.send_port(),
            adapter: Arc::new(OscAdapter::new(config.address_prefix())?),
            engine,
        })
    }

    /// Binds the listening socket.
    pub async fn bind(&self) -> Result<UdpSocket, std::io::Error> {
        let socket = UdpSocket::bind(self.addr).await?;
        info!(addr = socket.local_addr()?.to_string(), "OSC listener bound");
        Ok(socket)
    }

    /// Spawns the UDP task, the control task and the status task.
    pub fn spawn(self, socket: UdpSocket) -> Vec<tokio::task::JoinHandle<()>> {
        let (rx_sender, rx_receiver) = mpsc::channel::<OscPacket>(10);
        let (tx_sender, tx_receiver) = mpsc::channel::<OscPacket>(10);
        let changes = self.engine.lock().subscribe_changes();

        let comms = tokio::spawn(Self::handle_udp_comms(
            socket,
            self.status_host.clone(),
            self.status_port,
            rx_sender,
            tx_receiver,
        ));
        let status = tokio::spawn(Self::handle_status(
            self.adapter.clone(),
            changes,
            tx_sender,
        ));
        let controls = tokio::spawn(self.handle_controls(rx_receiver));
        vec![comms, controls, status]
    }

    /// Handles UDP sending/receiving.
    async fn handle_udp_comms(
        socket: UdpSocket,
        status_host: String,
        status_port: u16,
        rx_sender: Sender<OscPacket>,
        mut tx_receiver: Receiver<OscPacket>,
    ) {
        let mut buf = [0u8; rosc::decoder::MTU];

        // Errors are logged and the loop carries on.
        loop {
            select! {
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((size, _)) => match rosc::decoder::decode_udp(&buf[..size]) {
                            Ok((_, packet)) => {
                                if let Err(e) = rx_sender.send(packet).await {
                                    error!(err = e.to_string(), "Error sending packet on channel.");
                                    return;
                                }
                            }
                            Err(e) => error!(err = e.to_string(), "Error decoding OSC message"),
                        },
                        Err(e) => error!(err = e.to_string(), "Error receiving UDP."),
                    }
                }
                packet = tx_receiver.recv() => {
                    let Some(packet) = packet else {
                        return;
                    };
                    match rosc::encoder::encode(&packet) {
                        Ok(buf) => {
                            if let Err(e) = socket.send_to(&buf, (status_host.as_str(), status_port)).await {
                                error!(err = e.to_string(), "Error sending UDP data.");
                            }
                        }
                        Err(e) => error!(err = e.to_string(), "Error encoding OSC message"),
                    }
                }
            }
        }
    }

    /// Applies decoded updates to the engine.
    async fn handle_controls(self, mut rx_receiver: Receiver<OscPacket>) {
        let span = span!(Level::INFO, "OSC driver");
        let _enter = span.enter();
        info!(prefix = self.adapter.prefix(), "OSC driver started.");

        while let Some(packet) = rx_receiver.recv().await {
            for update in self.adapter.decode_packet(&packet) {
                self.apply(&update);
            }
        }

        info!("OSC driver stopped.");
    }

    /// Publishes every accepted control change, wherever it came from, as status.
    async fn handle_status(
        adapter: Arc<OscAdapter>,
        mut changes: broadcast::Receiver<ControlChange>,
        tx_sender: Sender<OscPacket>,
    ) {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    let status = adapter.control_update(&change.name, &change.value);
                    if let Err(e) = tx_sender.send(OscPacket::Message(status)).await {
                        error!(err = e.to_string(), "Error queueing OSC status");
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "OSC status fell behind, control changes dropped");
                }
                Err(RecvError::Closed) => return,
            }
        }
    }

    fn apply(&self, update: &ControlUpdate) {
        if let Err(e) = self.engine.lock().set_control(&update.name, &update.value) {
            warn!(
                control = update.name,
                value = update.value.to_string(),
                err = e.to_string(),
                "Rejected OSC control"
            );
        }
    }
}
