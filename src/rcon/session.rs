// src/rcon/session.rs
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::error::RconError;
use crate::rcon::packet::{
    Packet, AUTH_FAILED_ID, SERVERDATA_AUTH, SERVERDATA_AUTH_RESPONSE, SERVERDATA_EXECCOMMAND,
    SERVERDATA_RESPONSE_VALUE,
};

// Servers may emit an empty RESPONSE_VALUE ahead of the auth verdict.
const MAX_AUTH_FRAMES: usize = 4;

/// Runs one command on `endpoint` and returns the raw response text.
///
/// A fresh connection is opened and authenticated for every call and is
/// always closed before returning. `timeout` bounds name resolution, the
/// connect and each read independently. Nothing is retried.
pub fn execute(
    endpoint: &str,
    credential: &str,
    command: &str,
    timeout: Duration,
) -> Result<String, RconError> {
    if endpoint.trim().is_empty() {
        return Err(RconError::Configuration("endpoint is empty".to_string()));
    }
    if credential.is_empty() {
        return Err(RconError::Configuration(format!("no password configured for {}", endpoint)));
    }
    if timeout.is_zero() {
        return Err(RconError::Configuration("timeout must be non-zero".to_string()));
    }

    let mut session = Session::connect(endpoint, timeout)?;
    session.authenticate(credential)?;
    session.run(command)
}

struct Session {
    endpoint: String,
    stream: TcpStream,
}

impl Session {
    fn connect(endpoint: &str, timeout: Duration) -> Result<Self, RconError> {
        let addrs = resolve(endpoint, timeout)?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(timeout))
                        .and_then(|_| stream.set_write_timeout(Some(timeout)))
                        .map_err(|e| RconError::from_io(endpoint, e))?;
                    debug!("Opened rcon session to {} ({})", endpoint, addr);
                    return Ok(Self {
                        endpoint: endpoint.to_string(),
                        stream,
                    });
                }
                Err(e) => {
                    debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => RconError::from_io(endpoint, e),
            None => RconError::Connection(format!("{} resolved to no addresses", endpoint)),
        })
    }

    fn authenticate(&mut self, credential: &str) -> Result<(), RconError> {
        let id = next_request_id();
        self.send(&Packet::new(id, SERVERDATA_AUTH, credential))?;

        for _ in 0..MAX_AUTH_FRAMES {
            let reply = self.receive()?;
            match reply.kind {
                SERVERDATA_AUTH_RESPONSE if reply.id == AUTH_FAILED_ID => {
                    return Err(RconError::Connection(format!(
                        "{}: authentication rejected",
                        self.endpoint
                    )));
                }
                SERVERDATA_AUTH_RESPONSE if reply.id == id => return Ok(()),
                SERVERDATA_AUTH_RESPONSE => {
                    return Err(RconError::Protocol(format!(
                        "{}: auth reply for id {} (expected {})",
                        self.endpoint, reply.id, id
                    )));
                }
                SERVERDATA_RESPONSE_VALUE => continue,
                other => {
                    return Err(RconError::Protocol(format!(
                        "{}: unexpected packet type {} during auth",
                        self.endpoint, other
                    )));
                }
            }
        }

        Err(RconError::Protocol(format!(
            "{}: no auth verdict after {} frames",
            self.endpoint, MAX_AUTH_FRAMES
        )))
    }

    fn run(&mut self, command: &str) -> Result<String, RconError> {
        let id = next_request_id();
        self.send(&Packet::new(id, SERVERDATA_EXECCOMMAND, command))?;

        let reply = self.receive()?;
        if reply.kind != SERVERDATA_RESPONSE_VALUE {
            return Err(RconError::Protocol(format!(
                "{}: unexpected packet type {} in response to '{}'",
                self.endpoint, reply.kind, command
            )));
        }
        if reply.id != id {
            warn!(
                "{}: response id {} does not match request id {}",
                self.endpoint, reply.id, id
            );
        }
        Ok(reply.body)
    }

    fn send(&mut self, packet: &Packet) -> Result<(), RconError> {
        packet
            .write_to(&mut self.stream)
            .map_err(|e| RconError::from_io(&self.endpoint, e))
    }

    fn receive(&mut self) -> Result<Packet, RconError> {
        Packet::read_from(&mut self.stream).map_err(|e| RconError::from_io(&self.endpoint, e))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            debug!("Closing rcon session to {}: {}", self.endpoint, e);
        }
    }
}

/// Resolves `endpoint`, giving up after `timeout`. Literal socket addresses
/// skip the lookup. A lookup that outlives the deadline finishes on its own
/// thread and is discarded.
fn resolve(endpoint: &str, timeout: Duration) -> Result<Vec<SocketAddr>, RconError> {
    if let Ok(addr) = endpoint.parse::<SocketAddr>() {
        return Ok(vec![addr]);
    }

    let (tx, rx) = mpsc::channel();
    let host = endpoint.to_string();
    thread::spawn(move || {
        let _ = tx.send(host.to_socket_addrs().map(|addrs| addrs.collect::<Vec<_>>()));
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(addrs)) => Ok(addrs),
        Ok(Err(e)) => Err(RconError::Connection(format!("cannot resolve {}: {}", endpoint, e))),
        Err(RecvTimeoutError::Timeout) => Err(RconError::Timeout(format!(
            "{}: name resolution took longer than {:?}",
            endpoint, timeout
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(RconError::Connection(format!(
            "cannot resolve {}: lookup aborted",
            endpoint
        ))),
    }
}

fn next_request_id() -> i32 {
    rand::thread_rng().gen_range(1..i32::MAX)
}
