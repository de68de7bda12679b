// Packwatch - Battery pack telemetry monitor
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! TCP accept loop
//!
//! Connections are served one at a time, in arrival order. The listening
//! socket is polled so that cancellation is noticed within one poll
//! interval even when nobody connects.

use crate::error::{PackwatchError, Result};
use crate::protocol::FrameProtocol;
use crate::session::{IngestionSession, Monitor, SessionObserver};
use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Totals over the lifetime of a listener
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServeSummary {
    /// Connections served
    pub sessions: u64,
    /// Frames received across all sessions
    pub frames: u64,
}

/// Listening endpoint for telemetry senders
///
/// Only one sender is served at a time. The listen backlog is the OS
/// default rather than one, so further senders may complete their
/// handshake and wait in the queue until the current session ends.
#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    protocol: FrameProtocol,
    poll_interval: Duration,
}

impl Listener {
    /// Bind to `addr`
    ///
    /// Failure here is the one fatal error of the monitor.
    pub fn bind(
        addr: SocketAddr,
        protocol: FrameProtocol,
        poll_interval: Duration,
    ) -> Result<Self> {
        let bind_error = |source| PackwatchError::Bind {
            addr: addr.to_string(),
            source,
        };
        let inner = TcpListener::bind(addr).map_err(bind_error)?;
        inner.set_nonblocking(true).map_err(bind_error)?;

        Ok(Self {
            inner,
            protocol,
            poll_interval,
        })
    }

    /// Address actually bound, useful with port 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(|source| PackwatchError::Bind {
            addr: "listener".to_string(),
            source,
        })
    }

    /// Accept and serve connections until `cancel` fires
    pub fn serve(
        &self,
        monitor: &mut Monitor,
        observer: &mut dyn SessionObserver,
        cancel: &CancellationToken,
    ) -> ServeSummary {
        let mut totals = ServeSummary::default();
        info!(
            "Listening for {} frames on {}",
            self.protocol,
            self.local_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown address".to_string())
        );

        while !cancel.is_cancelled() {
            match self.inner.accept() {
                Ok((stream, peer)) => {
                    info!("Client connected from {}", peer);
                    if let Err(e) = self.prepare(&stream) {
                        error!("Failed to configure connection from {}: {}", peer, e);
                        continue;
                    }
                    let session =
                        IngestionSession::new(stream, self.protocol, monitor, cancel.clone());
                    let summary = session.with_peer(peer.to_string()).run(observer);
                    info!(
                        "Session with {} ended: {} frames, {} accepted, {} rejected",
                        peer, summary.frames, summary.accepted, summary.rejected
                    );
                    totals.sessions += 1;
                    totals.frames += summary.frames;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(self.poll_interval),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    error!("Accept failed: {}", e);
                    thread::sleep(self.poll_interval);
                }
            }
        }

        info!("Listener stopped after {} sessions", totals.sessions);
        totals
    }

    fn prepare(&self, stream: &TcpStream) -> std::io::Result<()> {
        // Accepted sockets may inherit non-blocking mode on some platforms
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.poll_interval))
    }
}
