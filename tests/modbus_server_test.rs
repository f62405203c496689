// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the EpeverModbusServer implementation
//!
//! These tests start the simulator behind a Modbus TCP server and talk to it with
//! the `tokio-modbus` client, the way a monitoring tool would talk to the real
//! charge controller.

use std::borrow::Cow;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time;
use tokio_modbus::{
    prelude::*,
    server::tcp::{accept_tcp_connection, Server},
};

use epever_simulator::config::{Config, WritePolicy};
use epever_simulator::daemon::launch_daemon::Daemon;
use epever_simulator::modbus::EpeverModbusServer;

/// Test utility function to start a Modbus server in the background
async fn start_test_server(
    config: Config,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), Box<dyn std::error::Error>> {
    // Use port 0 to let the OS assign an available port
    let socket_addr = SocketAddr::from_str("127.0.0.1:0")?;
    let listener = TcpListener::bind(socket_addr).await?;
    let socket_addr = listener.local_addr()?;

    let service = EpeverModbusServer::from_config(&config)?;
    let server = Server::new(listener);

    let on_connected = move |stream, socket_addr| {
        let service = service.clone();
        async move {
            accept_tcp_connection(stream, socket_addr, move |_| Ok(Some(service.clone())))
        }
    };

    let on_process_error = |err| {
        eprintln!("Server error: {}", err);
    };

    let handle = tokio::spawn(async move {
        if let Err(e) = server.serve(&on_connected, on_process_error).await {
            eprintln!("Server error: {}", e);
        }
    });

    // Give the server a moment to start
    time::sleep(Duration::from_millis(100)).await;

    Ok((socket_addr, handle))
}

#[tokio::test]
async fn test_read_rated_data() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server_handle) = start_test_server(Config::default()).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let data = ctx.read_input_registers(0x3000, 2).await??;
    assert_eq!(data, vec![0x1770, 3000]);

    // 1800 W spans two registers, high word first
    let data = ctx.read_input_registers(0x3002, 2).await??;
    assert_eq!(data, vec![0x0002, 0xBF20]);

    // The same map is served through every function
    let data = ctx.read_holding_registers(0x3000, 1).await??;
    assert_eq!(data, vec![0x1770]);

    ctx.disconnect().await?;
    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_read_settings_block() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server_handle) = start_test_server(Config::default()).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let data = ctx.read_holding_registers(0x9000, 15).await??;
    assert_eq!(
        data,
        vec![3, 7, 300, 1500, 1450, 1450, 1400, 1100, 1400, 1380, 1070, 1100, 1090, 1060, 1100]
    );

    ctx.disconnect().await?;
    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_unmapped_addresses_fault() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server_handle) = start_test_server(Config::default()).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let result = ctx.read_input_registers(0x9999, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalDataAddress));

    // 0x3009 is a gap right after the rated data block
    let result = ctx.read_input_registers(0x3008, 2).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalDataAddress));

    // The connection stays usable after an exception
    let data = ctx.read_input_registers(0x3008, 1).await??;
    assert_eq!(data, vec![2]);

    ctx.disconnect().await?;
    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_writes_are_rejected_by_default() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server_handle) = start_test_server(Config::default()).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let result = ctx.write_single_register(0x9000, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalFunction));

    let result = ctx.write_single_coil(0x0002, true).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalFunction));

    ctx.disconnect().await?;
    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_discarded_writes_do_not_change_values() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::default();
    config.modbus.write_policy = WritePolicy::Discard;
    let (socket_addr, server_handle) = start_test_server(config).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    ctx.write_multiple_registers(0x9000, &[1, 2]).await??;
    let data = ctx.read_holding_registers(0x9000, 2).await??;
    assert_eq!(data, vec![3, 7]);

    let result = ctx.write_single_register(0x9999, 1).await?;
    assert_eq!(result, Err(ExceptionCode::IllegalDataAddress));

    ctx.disconnect().await?;
    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_device_identification() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, server_handle) = start_test_server(Config::default()).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let response = ctx
        .call(Request::Custom(0x2B, Cow::Borrowed(&[0x0E, 0x04, 0x00])))
        .await??;
    match response {
        Response::Custom(function, data) => {
            assert_eq!(function, 0x2B);
            assert_eq!(&data[..6], &[0x0E, 0x04, 0x81, 0x00, 0x00, 1]);
            assert_eq!(&data[8..], b"Fake EPever");
        }
        other => panic!("Unexpected response: {:?}", other),
    }

    ctx.disconnect().await?;
    server_handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_daemon_serves_configured_state() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::default();
    config.device.is_night = true;
    config.device.battery_soc = 55.5;
    config.apply_args(None, None, None, Some("127.0.0.1:0".parse()?));

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;
    let socket_addr = daemon.tcp_local_addr().ok_or("TCP listener not bound")?;
    time::sleep(Duration::from_millis(100)).await;

    // Any unit identifier is answered
    let mut ctx = tcp::connect_slave(socket_addr, Slave(7)).await?;

    let flags = ctx.read_discrete_inputs(0x200C, 1).await??;
    assert_eq!(flags, vec![true]);
    let flags = ctx.read_coils(0x2000, 1).await??;
    assert_eq!(flags, vec![false]);

    let data = ctx.read_input_registers(0x311A, 1).await??;
    assert_eq!(data, vec![5550]);

    ctx.disconnect().await?;
    daemon.shutdown();
    daemon.join().await?;
    Ok(())
}
