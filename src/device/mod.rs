// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated device state
//!
//! This module holds the physical quantities and configuration parameters of the
//! simulated EPEver solar charge controller. The state is a plain record built once
//! at startup, either from the built-in defaults or from the `device` section of the
//! configuration file, and never mutated afterwards.
//!
//! ## Field Classes
//!
//! - Analog quantities (`f64`): voltages, currents, powers, energies, temperatures
//!   and percentages, served as fixed-point values scaled by 100.
//! - Codes and bitfields (`u16`): status words and mode selectors, served raw.
//! - Flags (`bool`): served as `0` or `1`.
//! - Clock and timing triples (`[u16; 3]`): one register per component.

use serde::{Deserialize, Serialize};

/// Fixed snapshot of the simulated charge controller.
///
/// The default values reproduce a small 12 V installation in MPPT charging mode
/// on a sunny afternoon. Several defaults are derived from others (rated power,
/// energy totals, battery current); when a field is overridden from the
/// configuration file the derived fields keep their default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceState {
    // Rated data
    pub array_rated_voltage: f64,
    pub array_rated_current: f64,
    pub array_rated_power: f64,
    pub battery_rated_voltage: f64,
    pub battery_rated_current: f64,
    pub battery_rated_power: f64,
    /// 0 connect/disconnect, 1 PWM, 2 MPPT
    pub charging_mode: u16,
    pub rated_current_load: f64,

    // Real-time data
    pub pv_array_input_voltage: f64,
    pub pv_array_input_current: f64,
    pub pv_array_input_power: f64,
    pub load_voltage: f64,
    pub load_current: f64,
    pub load_power: f64,
    pub battery_charging_power: f64,
    pub battery_temperature: f64,
    pub temperature_inside_equipment: f64,
    /// Percent
    pub battery_soc: f64,
    pub battery_remote_temperature: f64,
    pub battery_real_rated_power: u16,

    // Real-time status
    pub battery_status: u16,
    pub charging_equipment_status: u16,
    pub discharging_equipment_status: u16,

    // Statistical parameters
    pub max_pv_voltage_today: f64,
    pub min_pv_voltage_today: f64,
    pub max_battery_voltage_today: f64,
    pub min_battery_voltage_today: f64,
    /// kWh
    pub consumed_energy_today: f64,
    pub consumed_energy_month: f64,
    pub consumed_energy_year: f64,
    pub total_consumed_energy: f64,
    /// kWh
    pub generated_energy_today: f64,
    pub generated_energy_month: f64,
    pub generated_energy_year: f64,
    pub total_generated_energy: f64,
    pub battery_voltage: f64,
    pub battery_current: f64,

    // Setting parameters
    /// 0 user defined, 1 sealed, 2 GEL, 3 flooded
    pub battery_type: u16,
    /// Ah
    pub battery_capacity: u16,
    pub temperature_compensation_coefficient: f64,
    pub high_voltage_disconnect: f64,
    pub charging_limit_voltage: f64,
    pub over_voltage_reconnect: f64,
    pub equalization_voltage: f64,
    pub boost_voltage: f64,
    pub float_voltage: f64,
    pub boost_reconnect_voltage: f64,
    pub low_voltage_reconnect: f64,
    pub under_voltage_recover: f64,
    pub under_voltage_warning: f64,
    pub low_voltage_disconnect: f64,
    pub discharging_limit_voltage: f64,
    pub real_time_clock: [u16; 3],
    pub battery_temperature_warning_upper_limit: f64,
    pub battery_temperature_warning_lower_limit: f64,
    /// Not exposed by the register map.
    pub battery_temperature_upper_limit_recover: f64,
    pub controller_temperature_upper_limit: f64,
    pub controller_temperature_upper_limit_recover: f64,
    pub sundown_threshold_volts: f64,
    /// Minutes
    pub sundown_threshold_delay: u16,
    pub sunup_threshold_volts: f64,
    /// Minutes
    pub sunup_threshold_delay: u16,
    pub load_controlling_modes: u16,
    pub working_time_length_1: u16,
    pub working_time_length_2: u16,
    pub turn_on_timing_1: [u16; 3],
    pub turn_off_timing_1: [u16; 3],
    pub turn_on_timing_2: [u16; 3],
    pub turn_off_timing_2: [u16; 3],
    /// Seconds
    pub backlight_time: u16,
    pub length_of_night: u16,
    /// 0 auto recognize, 1 12 V, 2 24 V
    pub battery_rated_voltage_code: u16,

    // Switch values
    pub over_temp: bool,
    pub is_night: bool,
}

impl Default for DeviceState {
    fn default() -> Self {
        let array_rated_voltage = 60.0;
        let array_rated_current = 30.0;
        let battery_rated_voltage = 12.0;
        let battery_rated_current = 10.0;

        let pv_array_input_voltage = 50.0;
        let pv_array_input_current = 6.0;
        let pv_array_input_power = pv_array_input_voltage * pv_array_input_current;
        let load_voltage = 11.8;
        let load_current = 0.8;
        let load_power = load_voltage * load_current;
        let battery_temperature = 23.0;

        let consumed_energy_today = 2.1;
        let consumed_energy_month = consumed_energy_today * 30.0;
        let consumed_energy_year = consumed_energy_month * 12.0;
        let generated_energy_today = 1.9;
        let generated_energy_month = generated_energy_today * 30.0;
        let generated_energy_year = generated_energy_month * 12.0;

        // The battery sits at the load terminal voltage
        let battery_voltage = load_voltage;

        Self {
            array_rated_voltage,
            array_rated_current,
            array_rated_power: array_rated_voltage * array_rated_current,
            battery_rated_voltage,
            battery_rated_current,
            battery_rated_power: battery_rated_voltage * battery_rated_current,
            charging_mode: 2,
            rated_current_load: 2.0,

            pv_array_input_voltage,
            pv_array_input_current,
            pv_array_input_power,
            load_voltage,
            load_current,
            load_power,
            battery_charging_power: pv_array_input_power - load_power,
            battery_temperature,
            temperature_inside_equipment: 35.0,
            battery_soc: (load_voltage / battery_rated_voltage) * 100.0,
            battery_remote_temperature: battery_temperature,
            battery_real_rated_power: 1200,

            battery_status: 0b0000_0000_0000_0000,
            charging_equipment_status: 0b0000_0000_0000_0000,
            discharging_equipment_status: 0x0000,

            max_pv_voltage_today: 53.0,
            min_pv_voltage_today: 5.0,
            max_battery_voltage_today: 14.5,
            min_battery_voltage_today: 10.7,
            consumed_energy_today,
            consumed_energy_month,
            consumed_energy_year,
            total_consumed_energy: consumed_energy_year * 1.2,
            generated_energy_today,
            generated_energy_month,
            generated_energy_year,
            total_generated_energy: generated_energy_year * 1.2,
            battery_voltage,
            battery_current: (pv_array_input_power - load_power) / battery_voltage,

            battery_type: 0x0003,
            battery_capacity: 7,
            temperature_compensation_coefficient: 3.0,
            high_voltage_disconnect: 15.0,
            charging_limit_voltage: 14.5,
            over_voltage_reconnect: 14.5,
            equalization_voltage: 14.0,
            boost_voltage: 11.0,
            float_voltage: 14.0,
            boost_reconnect_voltage: 13.8,
            low_voltage_reconnect: 10.7,
            under_voltage_recover: 11.0,
            under_voltage_warning: 10.9,
            low_voltage_disconnect: 10.6,
            discharging_limit_voltage: 11.0,
            real_time_clock: [0, 0, 0],
            battery_temperature_warning_upper_limit: 50.0,
            battery_temperature_warning_lower_limit: 5.0,
            battery_temperature_upper_limit_recover: 45.0,
            controller_temperature_upper_limit: 60.0,
            controller_temperature_upper_limit_recover: 55.0,
            sundown_threshold_volts: 10.0,
            sundown_threshold_delay: 30,
            sunup_threshold_volts: 15.0,
            sunup_threshold_delay: 30,
            load_controlling_modes: 0b0000_0000_0000_0000,
            working_time_length_1: 0,
            working_time_length_2: 0,
            turn_on_timing_1: [0, 0, 0],
            turn_off_timing_1: [0, 0, 0],
            turn_on_timing_2: [0, 0, 0],
            turn_off_timing_2: [0, 0, 0],
            backlight_time: 5,
            length_of_night: 0,
            battery_rated_voltage_code: 0,

            over_temp: false,
            is_night: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_derived_values() {
        let state = DeviceState::default();
        assert_eq!(state.array_rated_power, 1800.0);
        assert_eq!(state.battery_rated_power, 120.0);
        assert_eq!(state.pv_array_input_power, 300.0);
        assert_eq!(state.battery_voltage, state.load_voltage);
        assert_eq!(state.battery_remote_temperature, state.battery_temperature);
        assert!(state.battery_soc > 98.0 && state.battery_soc < 99.0);
    }

    #[test]
    fn test_partial_deserialization_keeps_defaults() {
        let yaml = "array_rated_voltage: 48\nis_night: true\nreal_time_clock: [1, 2, 3]\n";
        let state: DeviceState = serde_yml::from_str(yaml).unwrap();

        assert_eq!(state.array_rated_voltage, 48.0);
        assert!(state.is_night);
        assert_eq!(state.real_time_clock, [1, 2, 3]);
        // Derived values are not recomputed
        assert_eq!(state.array_rated_power, 1800.0);
        assert_eq!(state.battery_type, 3);
    }
}
