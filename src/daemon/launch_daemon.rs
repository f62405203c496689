// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Daemon launch and lifecycle management
//!
//! This module starts the Modbus slave in the background, either on a serial line
//! (RTU) or on a TCP listener, and coordinates its graceful shutdown.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_modbus::server::rtu;
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};
use tokio_serial::SerialStream;

use crate::config::Config;
use crate::modbus::EpeverModbusServer;

/// Interval at which server tasks look at the running flag
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time granted to a server task to stop once aborted
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Main daemon structure that manages the simulator's background tasks
///
/// The `Daemon` owns the task serving Modbus requests, either over RTU or over
/// TCP, and the atomic flag used to stop it.
///
/// # Fields
///
/// * `tasks` - Collection of handles to running tasks for management and cleanup
/// * `running` - Atomic flag shared between tasks to coordinate shutdown
/// * `modbus_server` - The service answering requests, once launched
/// * `tcp_local_addr` - Address the TCP listener is bound to, in TCP mode
///
/// # Thread Safety
///
/// The `running` flag is wrapped in an `Arc` to allow safe sharing across
/// multiple asynchronous tasks. A server task that stops on its own, for instance
/// after a serial line failure, clears the flag as well.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    modbus_server: Option<EpeverModbusServer>,
    tcp_local_addr: Option<SocketAddr>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// Initializes a new daemon with an empty task list and the running flag set
    /// to `true`.
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            modbus_server: None,
            tcp_local_addr: None,
        }
    }

    /// Launch the Modbus slave
    ///
    /// Builds the register map from the configured device state, then serves it
    /// over TCP when `config.modbus.tcp.enabled` is set, or over the serial port
    /// named by `config.serial.port` otherwise.
    ///
    /// # Errors
    ///
    /// This function can fail if:
    /// * The register map cannot be built (overlap or unencodable value)
    /// * No serial port is configured in RTU mode, or it cannot be opened
    /// * The TCP listener fails to bind to the configured address
    ///
    /// Nothing is served when an error is returned.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use epever_simulator::config::Config;
    /// use epever_simulator::daemon::launch_daemon::Daemon;
    ///
    /// async fn start_daemon() -> anyhow::Result<Daemon> {
    ///     let mut config = Config::default();
    ///     config.serial.port = Some("/dev/ttyUSB0".to_string());
    ///     let mut daemon = Daemon::new();
    ///     daemon.launch(&config).await?;
    ///     Ok(daemon)
    /// }
    /// ```
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let server = EpeverModbusServer::from_config(config)
            .context("Refusing to start with an invalid register map")?;
        info!(
            "Register map ready: {} registers, write policy {:?}",
            server.register_map().len(),
            config.modbus.write_policy
        );
        self.modbus_server = Some(server.clone());

        if config.modbus.tcp.enabled {
            self.start_tcp_server(config, server).await
        } else {
            self.start_rtu_server(config, server)
        }
    }

    /// Serve the register map on the configured serial port
    ///
    /// The port is opened before the task is spawned so that a missing or busy
    /// device is reported by [`Daemon::launch`].
    fn start_rtu_server(&mut self, config: &Config, service: EpeverModbusServer) -> Result<()> {
        let path = config
            .serial
            .port
            .clone()
            .ok_or_else(|| anyhow!("No serial port given, pass one or use --tcp"))?;
        let builder = config.serial.port_builder(&path)?;
        let serial = SerialStream::open(&builder)
            .with_context(|| format!("Failed to open serial port {}", path))?;

        info!(
            "Starting Modbus RTU server on {} at {} baud",
            path, config.serial.baud_rate
        );
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            let server = rtu::Server::new(serial);
            let server_handle = tokio::spawn(async move {
                if let Err(e) = server.serve_forever(service).await {
                    error!("Modbus RTU server error: {}", e);
                }
            });

            Self::supervise(running, server_handle, "RTU").await;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Serve the register map on the configured TCP address
    ///
    /// Every connection shares the same register map.
    async fn start_tcp_server(
        &mut self,
        config: &Config,
        service: EpeverModbusServer,
    ) -> Result<()> {
        let tcp = &config.modbus.tcp;
        let listener = TcpListener::bind((tcp.address.as_str(), tcp.port))
            .await
            .with_context(|| format!("Failed to bind Modbus TCP on {}:{}", tcp.address, tcp.port))?;
        let local_addr = listener.local_addr()?;
        self.tcp_local_addr = Some(local_addr);

        info!("Starting Modbus TCP server on {}", local_addr);
        let running = self.running.clone();

        let task = tokio::spawn(async move {
            let server = Server::new(listener);

            let on_connected = move |stream, socket_addr| {
                let service = service.clone();
                async move {
                    accept_tcp_connection(stream, socket_addr, move |peer: SocketAddr| {
                        debug!("Modbus TCP client connected from {}", peer);
                        Ok(Some(service.clone()))
                    })
                }
            };

            let on_process_error = |err| {
                error!("Modbus TCP server error: {err}");
            };

            let server_handle = tokio::spawn(async move {
                if let Err(e) = server.serve(&on_connected, on_process_error).await {
                    error!("Modbus TCP server error: {}", e);
                }
            });

            Self::supervise(running, server_handle, "TCP").await;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Wait until shutdown is requested or the server stops, then abort it.
    async fn supervise(running: Arc<AtomicBool>, server_handle: JoinHandle<()>, transport: &str) {
        while running.load(Ordering::SeqCst) && !server_handle.is_finished() {
            time::sleep(POLL_INTERVAL).await;
        }

        if running.swap(false, Ordering::SeqCst) {
            warn!("Modbus {} server stopped unexpectedly", transport);
        } else {
            info!("Shutting down Modbus {} server...", transport);
        }

        server_handle.abort();
        match time::timeout(SHUTDOWN_TIMEOUT, server_handle).await {
            Ok(_) => info!("Modbus {} server shut down successfully", transport),
            Err(_) => warn!(
                "Modbus {} server shutdown timed out, forcing termination",
                transport
            ),
        }
    }

    /// The service answering requests, available once the daemon is launched.
    pub fn modbus_server(&self) -> Option<&EpeverModbusServer> {
        self.modbus_server.as_ref()
    }

    /// Address of the TCP listener, available once launched in TCP mode.
    ///
    /// Useful when the configured port is 0 and the system picks one.
    pub fn tcp_local_addr(&self) -> Option<SocketAddr> {
        self.tcp_local_addr
    }

    /// Whether the daemon is still serving.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Resolve once the daemon stops serving, either after [`Daemon::shutdown`]
    /// or because the server task ended on its own.
    pub async fn stopped(&self) {
        while self.is_running() {
            time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Signal all tasks to stop
    ///
    /// Sets the running flag to `false`, which causes the server task to abort its
    /// Modbus server and terminate. This method doesn't wait for the tasks to
    /// complete; use [`Daemon::join`] for that.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for all tasks to complete
    ///
    /// Consumes the daemon and waits for every spawned task to finish, giving each
    /// one a timeout. Task panics are logged and do not fail the join; an error
    /// returned by a task is propagated.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use epever_simulator::daemon::launch_daemon::Daemon;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// # let daemon = Daemon::new();
    /// daemon.shutdown();
    /// daemon.join().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match time::timeout(SHUTDOWN_TIMEOUT * 2, task).await {
                Ok(Ok(result)) => result?,
                Ok(Err(e)) => error!("Task panicked: {}", e),
                Err(_) => warn!("Task did not complete within timeout period, may be hung"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rtu_mode_requires_a_port() {
        let mut daemon = Daemon::new();
        let err = daemon.launch(&Config::default()).await.unwrap_err();
        assert!(err.to_string().contains("No serial port"));
        assert!(daemon.tcp_local_addr().is_none());
    }

    #[tokio::test]
    async fn test_invalid_device_state_is_fatal() {
        let mut config = Config::default();
        config.modbus.tcp.enabled = true;
        config.modbus.tcp.address = "127.0.0.1".to_string();
        config.modbus.tcp.port = 0;
        config.device.battery_rated_voltage = 1000.0;

        let mut daemon = Daemon::new();
        assert!(daemon.launch(&config).await.is_err());
        assert!(daemon.tcp_local_addr().is_none());
    }

    #[tokio::test]
    async fn test_tcp_launch_and_shutdown() {
        let mut config = Config::default();
        config.modbus.tcp.enabled = true;
        config.modbus.tcp.address = "127.0.0.1".to_string();
        config.modbus.tcp.port = 0;

        let mut daemon = Daemon::new();
        daemon.launch(&config).await.unwrap();
        assert!(daemon.is_running());
        assert_ne!(daemon.tcp_local_addr().unwrap().port(), 0);
        assert_eq!(
            daemon.modbus_server().unwrap().register_map().read(0x3000, 1).unwrap(),
            vec![0x1770]
        );

        daemon.shutdown();
        daemon.stopped().await;
        daemon.join().await.unwrap();
    }
}
