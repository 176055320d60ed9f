use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};

use crate::compositor::{self, EffectParams};
use crate::effects::Effect;
use crate::particles::{MIRROR_CAPACITY, Particle, ShapeRegistry, SpawnProfile};
use crate::surface::{Rgb, Surface};

const MAX_DATAGRAM: usize = 2048;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MirrorMessage {
    Clear,
    Effect {
        effect: Effect,
    },
    Strobe {
        show: bool,
        #[serde(with = "hex_color")]
        color: Rgb,
    },
}

impl MirrorMessage {
    pub fn encode(&self) -> Vec<u8> {
        // Serializing these variants cannot fail: no maps, no non-string keys.
        serde_json::to_vec(self).unwrap_or_default()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

mod hex_color {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::surface::Rgb;

    pub fn serialize<S: Serializer>(color: &Rgb, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&color.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Rgb, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Sending half of a mirror link. Must never block and never report failure.
pub trait MirrorTransport {
    fn send(&mut self, payload: &[u8]);
    fn describe(&self) -> String;
}

pub trait MirrorSource {
    fn try_recv(&mut self) -> Option<Vec<u8>>;
}

pub struct UdpTransport {
    socket: UdpSocket,
    target: SocketAddr,
}

impl UdpTransport {
    pub fn connect(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0))?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            target: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port)),
        })
    }
}

impl MirrorTransport for UdpTransport {
    fn send(&mut self, payload: &[u8]) {
        if let Err(err) = self.socket.send_to(payload, self.target) {
            tracing::trace!(%err, target = %self.target, "mirror datagram dropped");
        }
    }

    fn describe(&self) -> String {
        format!("udp {}", self.target)
    }
}

pub struct UdpListener {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl UdpListener {
    pub fn bind(port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            buf: vec![0; MAX_DATAGRAM],
        })
    }

    pub fn local_port(&self) -> io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }
}

impl MirrorSource for UdpListener {
    fn try_recv(&mut self) -> Option<Vec<u8>> {
        match self.socket.recv_from(&mut self.buf) {
            Ok((n, _)) => Some(self.buf[..n].to_vec()),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => None,
            Err(err) => {
                tracing::debug!(%err, "mirror receive failed");
                None
            }
        }
    }
}

pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
}

impl MirrorTransport for ChannelTransport {
    fn send(&mut self, payload: &[u8]) {
        match self.tx.try_send(payload.to_vec()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => tracing::trace!("mirror queue full, message dropped"),
            Err(TrySendError::Disconnected(_)) => tracing::trace!("mirror gone, message dropped"),
        }
    }

    fn describe(&self) -> String {
        "in-process".to_string()
    }
}

pub struct ChannelListener {
    rx: Receiver<Vec<u8>>,
}

impl MirrorSource for ChannelListener {
    fn try_recv(&mut self) -> Option<Vec<u8>> {
        match self.rx.try_recv() {
            Ok(v) => Some(v),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

pub fn channel(capacity: usize) -> (ChannelTransport, ChannelListener) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    (ChannelTransport { tx }, ChannelListener { rx })
}

#[derive(Default)]
pub struct MirrorChannel {
    transport: Option<Box<dyn MirrorTransport>>,
    published: u64,
}

impl MirrorChannel {
    pub fn attach(&mut self, transport: Box<dyn MirrorTransport>) {
        tracing::info!(target = %transport.describe(), "mirror attached");
        self.transport = Some(transport);
    }

    pub fn detach(&mut self) {
        self.transport = None;
    }

    pub fn is_attached(&self) -> bool {
        self.transport.is_some()
    }

    pub fn describe(&self) -> Option<String> {
        self.transport.as_ref().map(|t| t.describe())
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn publish(&mut self, msg: &MirrorMessage) {
        let Some(transport) = self.transport.as_mut() else {
            return;
        };
        transport.send(&msg.encode());
        self.published += 1;
    }
}

pub fn drain(source: &mut dyn MirrorSource) -> Vec<MirrorMessage> {
    let mut out = Vec::new();
    while let Some(bytes) = source.try_recv() {
        match MirrorMessage::decode(&bytes) {
            Ok(msg) => out.push(msg),
            Err(err) => tracing::warn!(%err, "ignoring malformed mirror message"),
        }
    }
    out
}

pub struct MirrorSurface {
    surface: Surface,
    params: EffectParams,
    shapes: ShapeRegistry,
    rng: fastrand::Rng,
}

impl MirrorSurface {
    pub fn new(width: usize, height: usize, params: EffectParams, rng: fastrand::Rng) -> Self {
        Self {
            surface: Surface::new(width, height),
            params,
            shapes: ShapeRegistry::new(MIRROR_CAPACITY),
            rng,
        }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn shapes(&self) -> &ShapeRegistry {
        &self.shapes
    }

    pub fn is_animating(&self) -> bool {
        !self.shapes.is_empty()
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.surface.resize(width, height);
    }

    pub fn handle(&mut self, msg: &MirrorMessage) {
        match msg {
            MirrorMessage::Clear => {
                self.shapes.clear();
                self.surface.clear();
            }
            MirrorMessage::Effect { effect: Effect::Abstract } => {
                let p = Particle::spawn(
                    &mut self.rng,
                    self.surface.width(),
                    self.surface.height(),
                    &SpawnProfile::MIRROR,
                );
                self.shapes.push(p);
            }
            MirrorMessage::Effect { effect } => {
                compositor::apply_once(&mut self.surface, *effect, &self.params, &mut self.rng);
            }
            MirrorMessage::Strobe { show: true, color } => self.surface.flood(*color),
            MirrorMessage::Strobe { show: false, .. } => self.surface.clear(),
        }
    }

    pub fn tick(&mut self) {
        if self.shapes.is_empty() || self.surface.is_empty() {
            return;
        }
        compositor::apply_fade(&mut self.surface, self.params.abstract_fade);
        self.shapes
            .step_all(self.surface.width(), self.surface.height());
        self.shapes.draw_all(&mut self.surface);
    }
}
