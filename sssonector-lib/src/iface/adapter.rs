use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use tun::{AsyncDevice, Configuration};

use crate::config::{InterfaceConfig, RetryConfig};
use crate::error::{Result, TunnelError};

use super::state::{InterfaceState, StateMachine};

/// Platform limitations surfaced at adapter-creation time rather than as
/// runtime failures (spec §4.1 "Platform abstraction").
#[derive(Debug, Clone, Copy)]
pub struct PlatformCapabilities {
    pub name: &'static str,
    pub max_mtu: u16,
    pub supports_multi_queue: bool,
}

impl PlatformCapabilities {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            // utun historically caps around 16384; keep a conservative ceiling.
            Self { name: "macos-utun", max_mtu: 16384, supports_multi_queue: false }
        } else if cfg!(target_os = "windows") {
            Self { name: "windows-tap", max_mtu: 9000, supports_multi_queue: false }
        } else {
            Self { name: "linux-tun", max_mtu: 65535, supports_multi_queue: true }
        }
    }
}

/// The common façade every platform backend presents (spec §9 "Platform
/// adapters as a capability set"): open, configure, read, write, close.
#[async_trait]
pub trait VirtualInterfaceAdapter: Send + Sync {
    /// Read exactly one IP packet into `buf`, returning its length. Returns
    /// `Ok(0)` on EOF (the interface was brought down).
    async fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write exactly one IP packet. A short write is a fatal error.
    async fn write_packet(&mut self, packet: &[u8]) -> Result<()>;

    /// Current lifecycle state, readable without locking.
    fn state(&self) -> InterfaceState;

    /// Tear the interface down within `cleanup_timeout`, or transition to
    /// `Error` and surface `CleanupTimeout`.
    async fn cleanup(&mut self, cleanup_timeout: Duration) -> Result<()>;

    /// System-visible device name.
    fn name(&self) -> &str;

    /// Split into independent read/write halves so the Transfer Engine's two
    /// directions (spec §4.5) can make independent progress without either
    /// side locking the other out -- mirrors the corpus's own
    /// `tokio::io::split(tun_dev)` idiom for TUN devices. The returned
    /// [`AdapterCleanup`] retains the shared lifecycle state so the engine
    /// can still drive Stopping -> Stopped after both halves are dropped.
    fn split(self: Box<Self>) -> (AdapterReadHalf, AdapterWriteHalf, AdapterCleanup);
}

/// The read half of a split adapter. Reads one packet at a time; concurrent
/// with [`AdapterWriteHalf`] on the same underlying device without a shared
/// lock (spec §5 "neither starves the other").
pub struct AdapterReadHalf(ReadHalf<AsyncDevice>);

impl AdapterReadHalf {
    /// Read exactly one IP packet into `buf`, returning its length. Returns
    /// `Ok(0)` on EOF (the interface was brought down).
    pub async fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.0.read(buf).await {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
            Err(e) => Err(TunnelError::AdapterIo(e)),
        }
    }
}

/// The write half of a split adapter.
pub struct AdapterWriteHalf(WriteHalf<AsyncDevice>);

impl AdapterWriteHalf {
    /// Write exactly one IP packet. A short write is a fatal error.
    pub async fn write_packet(&mut self, packet: &[u8]) -> Result<()> {
        let n = self.0.write(packet).await.map_err(TunnelError::AdapterIo)?;
        if n != packet.len() {
            return Err(TunnelError::AdapterIo(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short write: wrote {n} of {} bytes", packet.len()),
            )));
        }
        Ok(())
    }
}

/// What remains of a split adapter once both I/O halves have been handed
/// to the Transfer Engine's two directions: just enough to drive the
/// lifecycle state machine through its final transitions.
pub struct AdapterCleanup {
    name: String,
    state: Arc<StateMachine>,
}

impl AdapterCleanup {
    /// Transition Ready->Stopping (already done by [`split`]), wait for the
    /// caller to drop both I/O halves (releasing the kernel handle), then
    /// transition Stopping->Stopped -- or, on timeout, force `Error` and
    /// surface `CleanupTimeout` (spec §4.1 "bounded cleanup").
    ///
    /// `release` is a caller-supplied future that completes once both
    /// halves are dropped; splitting the drop from the state transition
    /// keeps this type decoupled from exactly how the engine sequences its
    /// two directions' shutdown.
    pub async fn finish<F>(self, cleanup_timeout: Duration, release: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send,
    {
        let name = self.name;
        match timeout(cleanup_timeout, release).await {
            Ok(()) => {
                self.state.transition(InterfaceState::Stopped)?;
                debug!(%name, "virtual interface torn down");
                Ok(())
            }
            Err(_) => {
                self.state.force_error();
                warn!(%name, "adapter cleanup exceeded timeout");
                Err(TunnelError::CleanupTimeout)
            }
        }
    }

    pub fn state(&self) -> InterfaceState {
        self.state.current()
    }
}

/// The `tun`-crate-backed adapter used on Linux (TUN), macOS (utun) and
/// Windows (TAP, given a pre-installed kernel driver) — grounded on
/// `other_examples/…ghost_tunnel…main.rs`, which wires `tun::Configuration`
/// + `tun::create_as_async` the same way.
pub struct TunAdapter {
    name: String,
    device: Option<AsyncDevice>,
    state: Arc<StateMachine>,
    caps: PlatformCapabilities,
}

impl TunAdapter {
    /// Create and bring up the kernel TUN device, transitioning
    /// Uninitialized -> Initializing -> Ready.
    ///
    /// Polls for the device's appearance with exponential backoff starting
    /// at `retry.initial_backoff_ms` for up to `retry.retry_attempts`
    /// iterations before declaring failure -- this tolerates the netlink
    /// announcement race observed on Linux (spec §4.1 "Retry policy").
    pub async fn create(iface: &InterfaceConfig, retry: &RetryConfig) -> Result<Self> {
        let caps = PlatformCapabilities::current();
        if iface.mtu > caps.max_mtu {
            return Err(TunnelError::AdapterCreate(format!(
                "mtu {} exceeds {} platform ceiling of {}",
                iface.mtu, caps.name, caps.max_mtu
            )));
        }

        let net: ipnet::IpNet = iface
            .cidr
            .parse()
            .map_err(|e| TunnelError::AdapterCreate(format!("invalid cidr {}: {e}", iface.cidr)))?;
        let address = net.addr();
        let netmask = net.netmask();

        let state = Arc::new(StateMachine::new());
        state.transition(InterfaceState::Initializing)?;

        let mut config = Configuration::default();
        config.address(address).netmask(netmask).mtu(iface.mtu as i32).up();
        if !iface.name.is_empty() {
            config.name(&iface.name);
        }
        #[cfg(target_os = "linux")]
        config.platform_config(|p| {
            p.ensure_root_privileges(true);
        });

        let mut last_err = None;
        let mut backoff = Duration::from_millis(retry.initial_backoff_ms);
        let mut device = None;
        for attempt in 0..retry.retry_attempts.max(1) {
            match tun::create_as_async(&config) {
                Ok(dev) => {
                    device = Some(dev);
                    break;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "tun device creation attempt failed, retrying");
                    last_err = Some(e);
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }

        let device = match device {
            Some(d) => d,
            None => {
                state.force_error();
                return Err(TunnelError::AdapterCreate(format!(
                    "failed to create tun device after {} attempts: {}",
                    retry.retry_attempts,
                    last_err.map(|e| e.to_string()).unwrap_or_default()
                )));
            }
        };

        let name = device
            .get_ref()
            .name()
            .map(str::to_string)
            .unwrap_or_else(|_| iface.name.clone());

        state.transition(InterfaceState::Ready)?;
        info!(%name, mtu = iface.mtu, cidr = %iface.cidr, "virtual interface ready");

        Ok(Self { name, device: Some(device), state, caps })
    }

    pub fn capabilities(&self) -> PlatformCapabilities {
        self.caps
    }
}

#[async_trait]
impl VirtualInterfaceAdapter for TunAdapter {
    async fn read_packet(&mut self, buf: &mut [u8]) -> Result<usize> {
        let device = self.device.as_mut().ok_or_else(|| {
            TunnelError::AdapterIo(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "adapter already cleaned up",
            ))
        })?;
        match device.read(buf).await {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(0),
            Err(e) => Err(TunnelError::AdapterIo(e)),
        }
    }

    async fn write_packet(&mut self, packet: &[u8]) -> Result<()> {
        let device = self.device.as_mut().ok_or_else(|| {
            TunnelError::AdapterIo(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "adapter already cleaned up",
            ))
        })?;
        let n = device.write(packet).await.map_err(TunnelError::AdapterIo)?;
        if n != packet.len() {
            return Err(TunnelError::AdapterIo(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short write: wrote {n} of {} bytes", packet.len()),
            )));
        }
        Ok(())
    }

    fn state(&self) -> InterfaceState {
        self.state.current()
    }

    async fn cleanup(&mut self, cleanup_timeout: Duration) -> Result<()> {
        self.state.transition(InterfaceState::Stopping)?;

        let name = self.name.clone();
        let result = timeout(cleanup_timeout, async {
            // Dropping the device brings the interface down and closes the
            // kernel handle; the `tun` crate does not expose a separate
            // "down" step distinct from close.
            self.device.take();
            debug!(%name, "virtual interface torn down");
        })
        .await;

        match result {
            Ok(()) => {
                self.state.transition(InterfaceState::Stopped)?;
                Ok(())
            }
            Err(_) => {
                self.state.force_error();
                warn!(%name, "adapter cleanup exceeded timeout");
                Err(TunnelError::CleanupTimeout)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn split(mut self: Box<Self>) -> (AdapterReadHalf, AdapterWriteHalf, AdapterCleanup) {
        let device = self
            .device
            .take()
            .expect("split called on an adapter that was already cleaned up");
        // Transition eagerly: the moment the engine calls split(), the
        // adapter is committed to shutting down once both halves are
        // dropped, per the Ready -> Stopping -> Stopped invariant.
        self.state
            .transition(InterfaceState::Stopping)
            .expect("split is only called from Ready");
        let (read_half, write_half) = tokio::io::split(device);
        (
            AdapterReadHalf(read_half),
            AdapterWriteHalf(write_half),
            AdapterCleanup { name: self.name.clone(), state: self.state.clone() },
        )
    }
}
