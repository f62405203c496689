// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server implementation for the simulated charge controller
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the simulated device that
//! provides data, while the client is the software under test that requests data.
//!
//! ## Address Space
//!
//! The real controller multiplexes coils, discrete inputs, holding registers and
//! input registers onto one register file. All four resource classes therefore read
//! the same [`RegisterMap`], with zero-based addresses:
//!
//! | Function | Resource | Served from |
//! |----------|----------|-------------|
//! | 0x01 | Coils | `word != 0` for each address |
//! | 0x02 | Discrete inputs | `word != 0` for each address |
//! | 0x03 | Holding registers | words verbatim |
//! | 0x04 | Input registers | words verbatim |
//! | 0x2B | Device identification | [`DeviceIdentification`] |
//!
//! A request touching any address without a backing value is answered with an
//! `IllegalDataAddress` exception. Writes are handled according to the configured
//! [`WritePolicy`] and never change the served values.

use std::{future, sync::Arc};

use log::{debug, error, warn};

use tokio_modbus::prelude::*;

use crate::config::{Config, WritePolicy};
use crate::device::DeviceState;
use crate::modbus::identification::{DeviceIdentification, READ_DEVICE_IDENTIFICATION};
use crate::modbus::register_map::{ConfigurationError, RegisterMap, RegisterSpec};

/// Protocol limits on the quantity field of each request kind.
const MAX_READ_REGISTERS: u16 = 125;
const MAX_READ_BITS: u16 = 2000;
const MAX_WRITE_REGISTERS: u16 = 123;
const MAX_WRITE_COILS: u16 = 1968;
const MAX_READ_WRITE_REGISTERS: u16 = 121;

/// A Modbus server answering requests from a fixed register map.
///
/// The server holds no state besides the shared, immutable register map and its
/// answering policy, so it is cheap to clone for every TCP connection and needs
/// no locking.
#[derive(Debug, Clone)]
pub struct EpeverModbusServer {
    register_map: Arc<RegisterMap>,
    write_policy: WritePolicy,
    identification: Arc<DeviceIdentification>,
}

impl tokio_modbus::server::Service for EpeverModbusServer {
    type Request = SlaveRequest<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request and provide a response
    ///
    /// Every unit identifier is answered. Any function code not listed in the
    /// module documentation, or a write under [`WritePolicy::Reject`], returns an
    /// `IllegalFunction` exception.
    fn call(&self, req: Self::Request) -> Self::Future {
        let SlaveRequest { slave, request } = req;
        debug!("Received Modbus request for unit {}: {:?}", slave, request);

        let res = self.handle(request);
        match &res {
            Ok(response) => debug!("Modbus response: {:?}", response),
            Err(e) => error!("Modbus request error: {:?}", e),
        }

        future::ready(res)
    }
}

impl EpeverModbusServer {
    /// Create a server around an already built register map.
    pub fn new(
        register_map: Arc<RegisterMap>,
        write_policy: WritePolicy,
        identification: DeviceIdentification,
    ) -> Self {
        Self {
            register_map,
            write_policy,
            identification: Arc::new(identification),
        }
    }

    /// Build the register map for `state` and wrap it in a server.
    ///
    /// ### Errors
    ///
    /// Returns the [`ConfigurationError`] of the register map build; the server
    /// must not be started in that case.
    pub fn build(
        specs: &[RegisterSpec],
        state: &DeviceState,
        write_policy: WritePolicy,
        identification: DeviceIdentification,
    ) -> Result<Self, ConfigurationError> {
        let register_map = RegisterMap::build(specs, state)?;
        Ok(Self::new(
            Arc::new(register_map),
            write_policy,
            identification,
        ))
    }

    /// Build a server for the EPEver register table from the configuration.
    pub fn from_config(config: &Config) -> Result<Self, ConfigurationError> {
        Self::build(
            &super::epever_register_table(),
            &config.device,
            config.modbus.write_policy,
            DeviceIdentification::from(&config.identity),
        )
    }

    /// The register map served by this instance.
    pub fn register_map(&self) -> &RegisterMap {
        &self.register_map
    }

    fn handle(&self, request: Request<'_>) -> Result<Response, ExceptionCode> {
        match request {
            Request::ReadCoils(addr, cnt) => {
                debug!("Reading {} coils starting from address {}", cnt, addr);
                bit_read(&self.register_map, addr, cnt).map(Response::ReadCoils)
            }
            Request::ReadDiscreteInputs(addr, cnt) => {
                debug!(
                    "Reading {} discrete inputs starting from address {}",
                    cnt, addr
                );
                bit_read(&self.register_map, addr, cnt).map(Response::ReadDiscreteInputs)
            }
            Request::ReadHoldingRegisters(addr, cnt) => {
                debug!(
                    "Reading {} holding registers starting from address {}",
                    cnt, addr
                );
                register_read(&self.register_map, addr, cnt).map(Response::ReadHoldingRegisters)
            }
            Request::ReadInputRegisters(addr, cnt) => {
                debug!(
                    "Reading {} input registers starting from address {}",
                    cnt, addr
                );
                register_read(&self.register_map, addr, cnt).map(Response::ReadInputRegisters)
            }
            Request::WriteSingleCoil(addr, value) => {
                debug!("Writing value {} to coil {}", value, addr);
                self.register_write(addr, 1)
                    .map(|_| Response::WriteSingleCoil(addr, value))
            }
            Request::WriteMultipleCoils(addr, values) => {
                debug!(
                    "Writing {} values to coils starting from address {}",
                    values.len(),
                    addr
                );
                let cnt = quantity(values.len(), MAX_WRITE_COILS)?;
                self.register_write(addr, cnt)
                    .map(|_| Response::WriteMultipleCoils(addr, cnt))
            }
            Request::WriteSingleRegister(addr, value) => {
                debug!("Writing value {} to holding register {}", value, addr);
                self.register_write(addr, 1)
                    .map(|_| Response::WriteSingleRegister(addr, value))
            }
            Request::WriteMultipleRegisters(addr, values) => {
                debug!(
                    "Writing {} values to holding registers starting from address {}",
                    values.len(),
                    addr
                );
                let cnt = quantity(values.len(), MAX_WRITE_REGISTERS)?;
                self.register_write(addr, cnt)
                    .map(|_| Response::WriteMultipleRegisters(addr, cnt))
            }
            Request::MaskWriteRegister(addr, and_mask, or_mask) => {
                debug!(
                    "Masking holding register {} with AND {:#06X} OR {:#06X}",
                    addr, and_mask, or_mask
                );
                self.register_write(addr, 1)
                    .map(|_| Response::MaskWriteRegister(addr, and_mask, or_mask))
            }
            Request::ReadWriteMultipleRegisters(read_addr, read_cnt, write_addr, values) => {
                debug!(
                    "Writing {} values at {} then reading {} registers from {}",
                    values.len(),
                    write_addr,
                    read_cnt,
                    read_addr
                );
                let write_cnt = quantity(values.len(), MAX_READ_WRITE_REGISTERS)?;
                self.register_write(write_addr, write_cnt)?;
                register_read(&self.register_map, read_addr, read_cnt)
                    .map(Response::ReadWriteMultipleRegisters)
            }
            Request::Custom(READ_DEVICE_IDENTIFICATION, data) => self
                .identification
                .respond(&data)
                .map(|payload| Response::Custom(READ_DEVICE_IDENTIFICATION, payload.into())),
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {request:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }

    /// Apply the write policy to a write of `cnt` registers at `addr`.
    ///
    /// Under [`WritePolicy::Discard`] the target range must still be mapped; the
    /// values themselves are dropped.
    fn register_write(&self, addr: u16, cnt: u16) -> Result<(), ExceptionCode> {
        match self.write_policy {
            WritePolicy::Reject => {
                warn!(
                    "Exception::IllegalFunction - Write of {} registers at {} rejected, the device is read-only",
                    cnt, addr
                );
                Err(ExceptionCode::IllegalFunction)
            }
            WritePolicy::Discard => {
                check_range(addr, cnt)?;
                if !self.register_map.covers(addr, cnt) {
                    error!(
                        "Exception::IllegalDataAddress - Write target {}..{} not mapped",
                        addr,
                        u32::from(addr) + u32::from(cnt)
                    );
                    return Err(ExceptionCode::IllegalDataAddress);
                }
                debug!("Discarded write of {} registers at {}", cnt, addr);
                Ok(())
            }
        }
    }
}

/// Convert a request length into a protocol quantity, checking its limit.
fn quantity(len: usize, max: u16) -> Result<u16, ExceptionCode> {
    match u16::try_from(len) {
        Ok(cnt) if (1..=max).contains(&cnt) => Ok(cnt),
        _ => {
            error!("Exception::IllegalDataValue - Quantity {} out of 1..={}", len, max);
            Err(ExceptionCode::IllegalDataValue)
        }
    }
}

/// Reject ranges that would run past the last register address.
fn check_range(addr: u16, cnt: u16) -> Result<(), ExceptionCode> {
    if u32::from(addr) + u32::from(cnt) > 0x1_0000 {
        error!(
            "Exception::IllegalDataAddress - Range {} + {} exceeds the address space",
            addr, cnt
        );
        return Err(ExceptionCode::IllegalDataAddress);
    }
    Ok(())
}

/// Helper function for reading registers from the register map
///
/// ### Errors
///
/// Returns `ExceptionCode::IllegalDataValue` for a quantity outside 1..=125 and
/// `ExceptionCode::IllegalDataAddress` if any requested register is not mapped.
fn register_read(
    registers: &RegisterMap,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    quantity(usize::from(cnt), MAX_READ_REGISTERS)?;
    check_range(addr, cnt)?;

    let response_values = registers.read(addr, cnt).map_err(|not_mapped| {
        error!(
            "Exception::IllegalDataAddress - Register {} not found",
            not_mapped.address
        );
        ExceptionCode::IllegalDataAddress
    })?;

    debug!("Successfully read {} registers from address {}", cnt, addr);
    Ok(response_values)
}

/// Helper function for reading coils and discrete inputs from the register map
///
/// Each bit is set when the register at the same address is non-zero.
fn bit_read(registers: &RegisterMap, addr: u16, cnt: u16) -> Result<Vec<bool>, ExceptionCode> {
    quantity(usize::from(cnt), MAX_READ_BITS)?;
    check_range(addr, cnt)?;

    let bits = registers
        .read(addr, cnt)
        .map_err(|not_mapped| {
            error!(
                "Exception::IllegalDataAddress - Register {} not found",
                not_mapped.address
            );
            ExceptionCode::IllegalDataAddress
        })?
        .into_iter()
        .map(|word| word != 0)
        .collect();

    debug!("Successfully read {} bits from address {}", cnt, addr);
    Ok(bits)
}
