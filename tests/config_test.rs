// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use epever_simulator::config::{Config, WritePolicy};
use epever_simulator::device::DeviceState;
use epever_simulator::modbus::EpeverModbusServer;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_and_save() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let mut config = Config::default();
    config.serial.baud_rate = 9600;
    config.modbus.write_policy = WritePolicy::Discard;
    config.identity.product_code = "TRACER".to_string();
    config.save_to_file(&config_path)?;

    let loaded_config = Config::from_file(&config_path)?;
    assert_eq!(loaded_config.serial.baud_rate, 9600);
    assert_eq!(loaded_config.modbus.write_policy, WritePolicy::Discard);
    assert_eq!(loaded_config.identity.product_code, "TRACER");
    assert_eq!(loaded_config.device, DeviceState::default());

    // Test loading default config for non-existent file
    let non_existent_path = temp_dir.path().join("non_existent.yaml");
    let default_config = Config::from_file(&non_existent_path)?;

    assert!(non_existent_path.exists());
    assert_eq!(default_config.serial.baud_rate, 115_200);
    assert_eq!(default_config.modbus.write_policy, WritePolicy::Reject);

    Ok(())
}

#[test]
fn test_device_overrides_reach_the_register_map() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        &config_path,
        r#"
device:
  battery_rated_voltage: 24.0
  battery_type: 2
  is_night: true
"#,
    )?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.device.battery_rated_voltage, 24.0);
    // Derived defaults are not recomputed from overrides
    assert_eq!(config.device.battery_soc, DeviceState::default().battery_soc);

    let server = EpeverModbusServer::from_config(&config)?;
    let map = server.register_map();
    assert_eq!(map.read(0x3004, 1)?, vec![2400]);
    assert_eq!(map.read(0x9000, 1)?, vec![2]);
    assert_eq!(map.read(0x200C, 1)?, vec![1]);

    Ok(())
}

#[test]
fn test_empty_file_uses_defaults() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, "")?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.device, DeviceState::default());
    assert!(!config.modbus.tcp.enabled);

    Ok(())
}
