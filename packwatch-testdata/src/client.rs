// Packwatch Testdata - TCP test client
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Streams scenario readings to a running monitor.

use crate::scenario::ScenarioGenerator;
use packwatch::{FrameProtocol, Reading};
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::Duration;
use thiserror::Error;

/// Test client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Send failed after {frames_sent} frames: {source}")]
    Send {
        frames_sent: u64,
        #[source]
        source: io::Error,
    },
}

/// Streaming run parameters
#[derive(Debug, Clone, Copy)]
pub struct StreamPlan {
    /// Elapsed scenario time covered, in seconds
    pub duration_secs: f32,
    /// Scenario time between groups, in seconds
    pub step_secs: f32,
    /// Wall-clock pause between groups
    pub pause: Duration,
}

impl Default for StreamPlan {
    fn default() -> Self {
        Self {
            duration_secs: 30.0,
            step_secs: 1.0,
            pause: Duration::from_secs(1),
        }
    }
}

impl StreamPlan {
    /// Scenario timestamps, `0, step, 2 step, ...` strictly below the duration
    pub fn timestamps(&self) -> impl Iterator<Item = f32> {
        let step = self.step_secs.max(f32::EPSILON);
        let count = (self.duration_secs / step).ceil().max(0.0) as usize;
        (0..count).map(move |i| i as f32 * step)
    }
}

/// Connected test client
pub struct TestClient {
    stream: TcpStream,
    protocol: FrameProtocol,
    frames_sent: u64,
}

impl TestClient {
    /// Connect to a monitor
    pub fn connect(addr: SocketAddr, protocol: FrameProtocol) -> Result<Self, ClientError> {
        let stream =
            TcpStream::connect(addr).map_err(|source| ClientError::Connect { addr, source })?;
        stream
            .set_nodelay(true)
            .map_err(|source| ClientError::Connect { addr, source })?;
        Ok(Self {
            stream,
            protocol,
            frames_sent: 0,
        })
    }

    pub fn protocol(&self) -> FrameProtocol {
        self.protocol
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Send readings back to back, one frame each
    pub fn send(&mut self, readings: &[Reading]) -> Result<(), ClientError> {
        let bytes: Vec<u8> = readings.iter().flat_map(|r| r.encode()).collect();
        self.stream
            .write_all(&bytes)
            .and_then(|_| self.stream.flush())
            .map_err(|source| ClientError::Send {
                frames_sent: self.frames_sent,
                source,
            })?;
        self.frames_sent += readings.len() as u64;
        Ok(())
    }

    /// Send one frame group generated at `t`
    ///
    /// Single-reading mode sends one frame; batch mode sends the module
    /// frame followed by one frame per sub-pack.
    pub fn send_group(
        &mut self,
        generator: &mut ScenarioGenerator,
        t: f32,
    ) -> Result<Vec<Reading>, ClientError> {
        let group = match self.protocol {
            FrameProtocol::SingleReading => vec![generator.reading_at(t)],
            FrameProtocol::ModuleBatch { frames } => {
                generator.group_at(t, frames.saturating_sub(1))
            }
        };
        self.send(&group)?;
        Ok(group)
    }

    /// Run a whole scenario, calling `on_sent` after each group
    pub fn stream<F>(
        &mut self,
        generator: &mut ScenarioGenerator,
        plan: &StreamPlan,
        mut on_sent: F,
    ) -> Result<u64, ClientError>
    where
        F: FnMut(&[Reading]),
    {
        for t in plan.timestamps() {
            let group = self.send_group(generator, t)?;
            on_sent(&group);
            if !plan.pause.is_zero() {
                thread::sleep(plan.pause);
            }
        }
        Ok(self.frames_sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::Scenario;
    use packwatch::FRAME_SIZE;
    use std::io::Read;
    use std::net::TcpListener;

    fn plan(duration_secs: f32) -> StreamPlan {
        StreamPlan {
            duration_secs,
            step_secs: 1.0,
            pause: Duration::ZERO,
        }
    }

    #[test]
    fn test_plan_timestamps() {
        let stamps: Vec<_> = plan(3.0).timestamps().collect();
        assert_eq!(stamps, vec![0.0, 1.0, 2.0]);
        assert_eq!(plan(0.0).timestamps().count(), 0);
    }

    #[test]
    fn test_batch_stream_bytes() {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = server.local_addr().unwrap();

        let receiver = thread::spawn(move || {
            let (mut socket, _) = server.accept().unwrap();
            let mut bytes = Vec::new();
            socket.read_to_end(&mut bytes).unwrap();
            bytes
        });

        let mut client = TestClient::connect(addr, FrameProtocol::module_batch()).unwrap();
        let mut generator = ScenarioGenerator::with_seed(Scenario::Normal, 11);
        let mut groups = 0;
        let sent = client
            .stream(&mut generator, &plan(3.0), |group| {
                assert_eq!(group.len(), 4);
                groups += 1;
            })
            .unwrap();
        drop(client);

        let bytes = receiver.join().unwrap();
        assert_eq!(groups, 3);
        assert_eq!(sent, 12);
        assert_eq!(bytes.len(), 12 * FRAME_SIZE);

        let mut frame = [0u8; FRAME_SIZE];
        frame.copy_from_slice(&bytes[4 * FRAME_SIZE..5 * FRAME_SIZE]);
        assert_eq!(Reading::decode(&frame).timestamp, 1.0);
    }

    #[test]
    fn test_connect_refused() {
        let addr = {
            let server = TcpListener::bind("127.0.0.1:0").unwrap();
            server.local_addr().unwrap()
        };
        let result = TestClient::connect(addr, FrameProtocol::SingleReading);
        assert!(matches!(result, Err(ClientError::Connect { .. })));
    }
}
