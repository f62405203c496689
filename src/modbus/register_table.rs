// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the epever-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! EPEver register address table
//!
//! Addresses follow the vendor's Modbus map, including its gaps. Every entry is
//! unsigned; the vendor documents a few values (battery current, temperatures) as
//! signed but the simulated state never goes negative.
//!
//! | Range | Block |
//! |-------|-------|
//! | 0x2000-0x200C | Switch values |
//! | 0x3000-0x300E | Rated data |
//! | 0x3100-0x311D | Real-time data |
//! | 0x3200-0x3202 | Real-time status |
//! | 0x3300-0x331C | Statistical parameters |
//! | 0x9000-0x9067 | Setting parameters |
//!
//! Some simulators serve the PV input current at 0x3102 and the rated voltage in
//! volts (12) at 0x9067. This table follows the vendor map instead: 0x3102 is PV
//! input power and 0x9067 is the rated voltage code (0, auto recognition).

use super::register_map::RegisterSpec;

fn flag(value: bool) -> f64 {
    f64::from(u8::from(value))
}

/// The full register table of the simulated charge controller.
pub fn epever_register_table() -> Vec<RegisterSpec> {
    vec![
        // Rated data
        RegisterSpec::centi(0x3000, "array_rated_voltage", |s| s.array_rated_voltage),
        RegisterSpec::centi(0x3001, "array_rated_current", |s| s.array_rated_current),
        RegisterSpec::centi_double(0x3002, "array_rated_power", |s| s.array_rated_power),
        RegisterSpec::centi(0x3004, "battery_rated_voltage", |s| s.battery_rated_voltage),
        RegisterSpec::centi(0x3005, "battery_rated_current", |s| s.battery_rated_current),
        RegisterSpec::centi_double(0x3006, "battery_rated_power", |s| s.battery_rated_power),
        RegisterSpec::raw(0x3008, "charging_mode", |s| s.charging_mode.into()),
        RegisterSpec::centi(0x300E, "rated_current_load", |s| s.rated_current_load),
        // Real-time data
        RegisterSpec::centi(0x3100, "pv_array_input_voltage", |s| s.pv_array_input_voltage),
        RegisterSpec::centi(0x3101, "pv_array_input_current", |s| s.pv_array_input_current),
        RegisterSpec::centi_double(0x3102, "pv_array_input_power", |s| s.pv_array_input_power),
        RegisterSpec::centi_double(0x3106, "battery_charging_power", |s| {
            s.battery_charging_power
        }),
        RegisterSpec::centi(0x310C, "load_voltage", |s| s.load_voltage),
        RegisterSpec::centi(0x310D, "load_current", |s| s.load_current),
        RegisterSpec::centi_double(0x310E, "load_power", |s| s.load_power),
        RegisterSpec::centi(0x3110, "battery_temperature", |s| s.battery_temperature),
        RegisterSpec::centi(0x3111, "temperature_inside_equipment", |s| {
            s.temperature_inside_equipment
        }),
        RegisterSpec::centi(0x311A, "battery_soc", |s| s.battery_soc),
        RegisterSpec::centi(0x311B, "battery_remote_temperature", |s| {
            s.battery_remote_temperature
        }),
        RegisterSpec::raw(0x311D, "battery_real_rated_power", |s| {
            s.battery_real_rated_power.into()
        }),
        // Real-time status
        RegisterSpec::raw(0x3200, "battery_status", |s| s.battery_status.into()),
        RegisterSpec::raw(0x3201, "charging_equipment_status", |s| {
            s.charging_equipment_status.into()
        }),
        RegisterSpec::raw(0x3202, "discharging_equipment_status", |s| {
            s.discharging_equipment_status.into()
        }),
        // Statistical parameters
        RegisterSpec::centi(0x3300, "max_pv_voltage_today", |s| s.max_pv_voltage_today),
        RegisterSpec::centi(0x3301, "min_pv_voltage_today", |s| s.min_pv_voltage_today),
        RegisterSpec::centi(0x3302, "max_battery_voltage_today", |s| {
            s.max_battery_voltage_today
        }),
        RegisterSpec::centi(0x3303, "min_battery_voltage_today", |s| {
            s.min_battery_voltage_today
        }),
        RegisterSpec::centi_double(0x3304, "consumed_energy_today", |s| s.consumed_energy_today),
        RegisterSpec::centi_double(0x3306, "consumed_energy_month", |s| s.consumed_energy_month),
        RegisterSpec::centi_double(0x3308, "consumed_energy_year", |s| s.consumed_energy_year),
        RegisterSpec::centi_double(0x330A, "total_consumed_energy", |s| s.total_consumed_energy),
        RegisterSpec::centi_double(0x330C, "generated_energy_today", |s| {
            s.generated_energy_today
        }),
        RegisterSpec::centi_double(0x330E, "generated_energy_month", |s| {
            s.generated_energy_month
        }),
        RegisterSpec::centi_double(0x3310, "generated_energy_year", |s| s.generated_energy_year),
        RegisterSpec::centi_double(0x3312, "total_generated_energy", |s| {
            s.total_generated_energy
        }),
        RegisterSpec::centi(0x331A, "battery_voltage", |s| s.battery_voltage),
        RegisterSpec::centi_double(0x331B, "battery_current", |s| s.battery_current),
        // Setting parameters
        RegisterSpec::raw(0x9000, "battery_type", |s| s.battery_type.into()),
        RegisterSpec::raw(0x9001, "battery_capacity", |s| s.battery_capacity.into()),
        RegisterSpec::centi(0x9002, "temperature_compensation_coefficient", |s| {
            s.temperature_compensation_coefficient
        }),
        RegisterSpec::centi(0x9003, "high_voltage_disconnect", |s| s.high_voltage_disconnect),
        RegisterSpec::centi(0x9004, "charging_limit_voltage", |s| s.charging_limit_voltage),
        RegisterSpec::centi(0x9005, "over_voltage_reconnect", |s| s.over_voltage_reconnect),
        RegisterSpec::centi(0x9006, "equalization_voltage", |s| s.equalization_voltage),
        RegisterSpec::centi(0x9007, "boost_voltage", |s| s.boost_voltage),
        RegisterSpec::centi(0x9008, "float_voltage", |s| s.float_voltage),
        RegisterSpec::centi(0x9009, "boost_reconnect_voltage", |s| s.boost_reconnect_voltage),
        RegisterSpec::centi(0x900A, "low_voltage_reconnect", |s| s.low_voltage_reconnect),
        RegisterSpec::centi(0x900B, "under_voltage_recover", |s| s.under_voltage_recover),
        RegisterSpec::centi(0x900C, "under_voltage_warning", |s| s.under_voltage_warning),
        RegisterSpec::centi(0x900D, "low_voltage_disconnect", |s| s.low_voltage_disconnect),
        RegisterSpec::centi(0x900E, "discharging_limit_voltage", |s| {
            s.discharging_limit_voltage
        }),
        RegisterSpec::raw(0x9013, "real_time_clock[0]", |s| s.real_time_clock[0].into()),
        RegisterSpec::raw(0x9014, "real_time_clock[1]", |s| s.real_time_clock[1].into()),
        RegisterSpec::raw(0x9015, "real_time_clock[2]", |s| s.real_time_clock[2].into()),
        RegisterSpec::centi(0x9017, "battery_temperature_warning_upper_limit", |s| {
            s.battery_temperature_warning_upper_limit
        }),
        RegisterSpec::centi(0x9018, "battery_temperature_warning_lower_limit", |s| {
            s.battery_temperature_warning_lower_limit
        }),
        RegisterSpec::centi(0x9019, "controller_temperature_upper_limit", |s| {
            s.controller_temperature_upper_limit
        }),
        RegisterSpec::centi(0x901A, "controller_temperature_upper_limit_recover", |s| {
            s.controller_temperature_upper_limit_recover
        }),
        RegisterSpec::centi(0x901E, "sundown_threshold_volts", |s| s.sundown_threshold_volts),
        RegisterSpec::raw(0x901F, "sundown_threshold_delay", |s| {
            s.sundown_threshold_delay.into()
        }),
        RegisterSpec::centi(0x9020, "sunup_threshold_volts", |s| s.sunup_threshold_volts),
        RegisterSpec::raw(0x9021, "sunup_threshold_delay", |s| s.sunup_threshold_delay.into()),
        RegisterSpec::raw(0x903D, "load_controlling_modes", |s| {
            s.load_controlling_modes.into()
        }),
        RegisterSpec::raw(0x903E, "working_time_length_1", |s| s.working_time_length_1.into()),
        RegisterSpec::raw(0x903F, "working_time_length_2", |s| s.working_time_length_2.into()),
        RegisterSpec::raw(0x9042, "turn_on_timing_1[0]", |s| s.turn_on_timing_1[0].into()),
        RegisterSpec::raw(0x9043, "turn_on_timing_1[1]", |s| s.turn_on_timing_1[1].into()),
        RegisterSpec::raw(0x9044, "turn_on_timing_1[2]", |s| s.turn_on_timing_1[2].into()),
        RegisterSpec::raw(0x9045, "turn_off_timing_1[0]", |s| s.turn_off_timing_1[0].into()),
        RegisterSpec::raw(0x9046, "turn_off_timing_1[1]", |s| s.turn_off_timing_1[1].into()),
        RegisterSpec::raw(0x9047, "turn_off_timing_1[2]", |s| s.turn_off_timing_1[2].into()),
        RegisterSpec::raw(0x9048, "turn_on_timing_2[0]", |s| s.turn_on_timing_2[0].into()),
        RegisterSpec::raw(0x9049, "turn_on_timing_2[1]", |s| s.turn_on_timing_2[1].into()),
        RegisterSpec::raw(0x904A, "turn_on_timing_2[2]", |s| s.turn_on_timing_2[2].into()),
        RegisterSpec::raw(0x904B, "turn_off_timing_2[0]", |s| s.turn_off_timing_2[0].into()),
        RegisterSpec::raw(0x904C, "turn_off_timing_2[1]", |s| s.turn_off_timing_2[1].into()),
        RegisterSpec::raw(0x904D, "turn_off_timing_2[2]", |s| s.turn_off_timing_2[2].into()),
        RegisterSpec::raw(0x9063, "backlight_time", |s| s.backlight_time.into()),
        RegisterSpec::raw(0x9065, "length_of_night", |s| s.length_of_night.into()),
        RegisterSpec::raw(0x9067, "battery_rated_voltage_code", |s| {
            s.battery_rated_voltage_code.into()
        }),
        // Switch values
        RegisterSpec::raw(0x2000, "over_temp", |s| flag(s.over_temp)),
        RegisterSpec::raw(0x200C, "is_night", |s| flag(s.is_night)),
    ]
}
