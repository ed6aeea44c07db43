//! The vehicle's known signals
//!
//! [`VehicleSignals`] owns one [`Parameter`] per signal. Create it once at
//! startup, wrap it in an `Arc`, and hand clones to the ingestion loop (the
//! only writer) and to every display consumer.

use crate::parameter::{Parameter, ParameterSpec, KPH_TO_MPH};
use std::fmt;

/// Kelvin offset used by the temperature parameters
const ZERO_CELSIUS: f32 = 273.15;

/// Fahrenheit offset of absolute zero
const ZERO_RANKINE: f32 = 459.67;

const TEMPERATURE: ParameterSpec = ParameterSpec::new("", "", "")
    .units("C", "F")
    .raw(1.0, ZERO_CELSIUS)
    .metric(-ZERO_CELSIUS)
    .imperial(9.0 / 5.0, -ZERO_RANKINE)
    .format(true, 3, 0);

const WHEEL_SPEED: ParameterSpec = ParameterSpec::new("", "", "")
    .units("kph", "mph")
    .raw(0.01, 0.0)
    .imperial(KPH_TO_MPH, 0.0)
    .format(true, 3, 2);

const STATE_OF_CHARGE: ParameterSpec = ParameterSpec::new("", "", "")
    .units("%", "%")
    .raw(0.5, 0.0)
    .format(false, 3, 1);

const fn named(
    base: ParameterSpec,
    name: &'static str,
    short_name: &'static str,
    abbreviation: &'static str,
) -> ParameterSpec {
    ParameterSpec {
        name,
        short_name,
        abbreviation,
        ..base
    }
}

pub const BRAKE_PEDAL: ParameterSpec = ParameterSpec::new("Brake pedal position", "Brake", "BRK")
    .units("%", "%")
    .raw(100.0 / 127.0, 0.0)
    .format(false, 3, 0);

pub const ACCELERATOR_POSITION: ParameterSpec =
    ParameterSpec::new("Accelerator position", "Accel", "ACC")
        .units("?", "?")
        .format(false, 3, 0);

pub const BATTERY_CURRENT: ParameterSpec =
    ParameterSpec::new("Traction battery current", "Batt current", "I")
        .units("A", "A")
        .raw(0.1, 0.0)
        .format(true, 3, 1);

pub const BATTERY_VOLTAGE: ParameterSpec =
    ParameterSpec::new("Traction battery voltage", "Batt voltage", "V")
        .units("V", "V")
        .format(false, 3, 0);

pub const BATTERY_SOC: ParameterSpec =
    named(STATE_OF_CHARGE, "Battery state of charge", "SoC", "SOC");

/// Charge difference between the most- and least-charged battery modules
pub const BATTERY_DELTA_SOC: ParameterSpec =
    named(STATE_OF_CHARGE, "Battery delta state of charge", "dSoC", "DSOC");

pub const BATTERY_TEMP_LOWEST: ParameterSpec =
    named(TEMPERATURE, "Battery lowest temperature", "Batt min", "TMIN");

pub const BATTERY_TEMP_HIGHEST: ParameterSpec =
    named(TEMPERATURE, "Battery highest temperature", "Batt max", "TMAX");

pub const BATTERY_DISCHARGE_LIMIT: ParameterSpec =
    ParameterSpec::new("Battery discharge current limit", "Max out", "IOUT")
        .units("A", "A")
        .format(false, 3, 0);

pub const BATTERY_CHARGE_LIMIT: ParameterSpec =
    ParameterSpec::new("Battery charge current limit", "Max in", "IIN")
        .units("A", "A")
        .format(false, 3, 0);

pub const WHEEL_FRONT_LEFT: ParameterSpec =
    named(WHEEL_SPEED, "Front left wheel speed", "FL wheel", "FL");

pub const WHEEL_FRONT_RIGHT: ParameterSpec =
    named(WHEEL_SPEED, "Front right wheel speed", "FR wheel", "FR");

pub const WHEEL_REAR_LEFT: ParameterSpec =
    named(WHEEL_SPEED, "Rear left wheel speed", "RL wheel", "RL");

pub const WHEEL_REAR_RIGHT: ParameterSpec =
    named(WHEEL_SPEED, "Rear right wheel speed", "RR wheel", "RR");

pub const SPEED: ParameterSpec = named(WHEEL_SPEED, "Vehicle speed", "Speed", "SPD");

/// Coolant is reported in half degrees Celsius
pub const ENGINE_COOLANT_TEMP: ParameterSpec = named(
    TEMPERATURE.raw(0.5, ZERO_CELSIUS),
    "Engine coolant temperature",
    "Coolant",
    "ECT",
);

/// Identifies one signal in [`VehicleSignals`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Signal {
    BrakePedal,
    AcceleratorPosition,
    BatteryCurrent,
    BatteryVoltage,
    BatterySoc,
    BatteryDeltaSoc,
    BatteryTempLowest,
    BatteryTempHighest,
    BatteryDischargeLimit,
    BatteryChargeLimit,
    WheelFrontLeft,
    WheelFrontRight,
    WheelRearLeft,
    WheelRearRight,
    Speed,
    EngineCoolantTemp,
}

impl Signal {
    /// Every signal, in display order
    pub const ALL: [Signal; 16] = [
        Signal::Speed,
        Signal::WheelFrontLeft,
        Signal::WheelFrontRight,
        Signal::WheelRearLeft,
        Signal::WheelRearRight,
        Signal::BatteryVoltage,
        Signal::BatteryCurrent,
        Signal::BatterySoc,
        Signal::BatteryDeltaSoc,
        Signal::BatteryTempLowest,
        Signal::BatteryTempHighest,
        Signal::BatteryDischargeLimit,
        Signal::BatteryChargeLimit,
        Signal::BrakePedal,
        Signal::AcceleratorPosition,
        Signal::EngineCoolantTemp,
    ];

    /// Stable snake_case key, used in configuration and JSON output
    pub fn key(&self) -> &'static str {
        match self {
            Signal::BrakePedal => "brake_pedal",
            Signal::AcceleratorPosition => "accelerator_position",
            Signal::BatteryCurrent => "battery_current",
            Signal::BatteryVoltage => "battery_voltage",
            Signal::BatterySoc => "battery_soc",
            Signal::BatteryDeltaSoc => "battery_delta_soc",
            Signal::BatteryTempLowest => "battery_temp_lowest",
            Signal::BatteryTempHighest => "battery_temp_highest",
            Signal::BatteryDischargeLimit => "battery_discharge_limit",
            Signal::BatteryChargeLimit => "battery_charge_limit",
            Signal::WheelFrontLeft => "wheel_front_left",
            Signal::WheelFrontRight => "wheel_front_right",
            Signal::WheelRearLeft => "wheel_rear_left",
            Signal::WheelRearRight => "wheel_rear_right",
            Signal::Speed => "speed",
            Signal::EngineCoolantTemp => "engine_coolant_temp",
        }
    }

    /// Look a signal up by its [`Signal::key`]
    pub fn from_key(key: &str) -> Option<Signal> {
        Signal::ALL.iter().copied().find(|signal| signal.key() == key)
    }

    pub fn spec(&self) -> ParameterSpec {
        match self {
            Signal::BrakePedal => BRAKE_PEDAL,
            Signal::AcceleratorPosition => ACCELERATOR_POSITION,
            Signal::BatteryCurrent => BATTERY_CURRENT,
            Signal::BatteryVoltage => BATTERY_VOLTAGE,
            Signal::BatterySoc => BATTERY_SOC,
            Signal::BatteryDeltaSoc => BATTERY_DELTA_SOC,
            Signal::BatteryTempLowest => BATTERY_TEMP_LOWEST,
            Signal::BatteryTempHighest => BATTERY_TEMP_HIGHEST,
            Signal::BatteryDischargeLimit => BATTERY_DISCHARGE_LIMIT,
            Signal::BatteryChargeLimit => BATTERY_CHARGE_LIMIT,
            Signal::WheelFrontLeft => WHEEL_FRONT_LEFT,
            Signal::WheelFrontRight => WHEEL_FRONT_RIGHT,
            Signal::WheelRearLeft => WHEEL_REAR_LEFT,
            Signal::WheelRearRight => WHEEL_REAR_RIGHT,
            Signal::Speed => SPEED,
            Signal::EngineCoolantTemp => ENGINE_COOLANT_TEMP,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// All decoded vehicle parameters, one per [`Signal`]
#[derive(Debug)]
pub struct VehicleSignals {
    pub brake_pedal: Parameter,
    pub accelerator_position: Parameter,
    pub battery_current: Parameter,
    pub battery_voltage: Parameter,
    pub battery_soc: Parameter,
    pub battery_delta_soc: Parameter,
    pub battery_temp_lowest: Parameter,
    pub battery_temp_highest: Parameter,
    pub battery_discharge_limit: Parameter,
    pub battery_charge_limit: Parameter,
    pub wheel_front_left: Parameter,
    pub wheel_front_right: Parameter,
    pub wheel_rear_left: Parameter,
    pub wheel_rear_right: Parameter,
    pub speed: Parameter,
    pub engine_coolant_temp: Parameter,
}

impl VehicleSignals {
    pub fn new() -> Self {
        Self {
            brake_pedal: Parameter::new(BRAKE_PEDAL),
            accelerator_position: Parameter::new(ACCELERATOR_POSITION),
            battery_current: Parameter::new(BATTERY_CURRENT),
            battery_voltage: Parameter::new(BATTERY_VOLTAGE),
            battery_soc: Parameter::new(BATTERY_SOC),
            battery_delta_soc: Parameter::new(BATTERY_DELTA_SOC),
            battery_temp_lowest: Parameter::new(BATTERY_TEMP_LOWEST),
            battery_temp_highest: Parameter::new(BATTERY_TEMP_HIGHEST),
            battery_discharge_limit: Parameter::new(BATTERY_DISCHARGE_LIMIT),
            battery_charge_limit: Parameter::new(BATTERY_CHARGE_LIMIT),
            wheel_front_left: Parameter::new(WHEEL_FRONT_LEFT),
            wheel_front_right: Parameter::new(WHEEL_FRONT_RIGHT),
            wheel_rear_left: Parameter::new(WHEEL_REAR_LEFT),
            wheel_rear_right: Parameter::new(WHEEL_REAR_RIGHT),
            speed: Parameter::new(SPEED),
            engine_coolant_temp: Parameter::new(ENGINE_COOLANT_TEMP),
        }
    }

    pub fn get(&self, signal: Signal) -> &Parameter {
        match signal {
            Signal::BrakePedal => &self.brake_pedal,
            Signal::AcceleratorPosition => &self.accelerator_position,
            Signal::BatteryCurrent => &self.battery_current,
            Signal::BatteryVoltage => &self.battery_voltage,
            Signal::BatterySoc => &self.battery_soc,
            Signal::BatteryDeltaSoc => &self.battery_delta_soc,
            Signal::BatteryTempLowest => &self.battery_temp_lowest,
            Signal::BatteryTempHighest => &self.battery_temp_highest,
            Signal::BatteryDischargeLimit => &self.battery_discharge_limit,
            Signal::BatteryChargeLimit => &self.battery_charge_limit,
            Signal::WheelFrontLeft => &self.wheel_front_left,
            Signal::WheelFrontRight => &self.wheel_front_right,
            Signal::WheelRearLeft => &self.wheel_rear_left,
            Signal::WheelRearRight => &self.wheel_rear_right,
            Signal::Speed => &self.speed,
            Signal::EngineCoolantTemp => &self.engine_coolant_temp,
        }
    }

    /// Iterate over every signal and its parameter, in display order
    pub fn iter(&self) -> impl Iterator<Item = (Signal, &Parameter)> + '_ {
        Signal::ALL.iter().map(move |&signal| (signal, self.get(signal)))
    }
}

impl Default for VehicleSignals {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_signal_has_a_unique_key() {
        let mut keys: Vec<_> = Signal::ALL.iter().map(|s| s.key()).collect();
        keys.sort();
        keys.dedup();
        assert_eq!(keys.len(), Signal::ALL.len());

        for signal in Signal::ALL {
            assert_eq!(Signal::from_key(signal.key()), Some(signal));
        }
        assert_eq!(Signal::from_key("warp_factor"), None);
    }

    #[test]
    fn test_registry_matches_specs() {
        let signals = VehicleSignals::new();
        for (signal, param) in signals.iter() {
            assert_eq!(*param.spec(), signal.spec());
            assert!(!param.name().is_empty(), "{} has no name", signal);
            assert!(!param.has_value());
        }
    }

    #[test]
    fn test_coolant_reports_half_degrees() {
        let signals = VehicleSignals::new();
        signals.engine_coolant_temp.update(180);
        assert!((signals.engine_coolant_temp.value() - 90.0).abs() < 0.01);
        assert!((signals.engine_coolant_temp.value_imperial() - 194.0).abs() < 0.05);
        assert_eq!(signals.engine_coolant_temp.string().as_str(), " +90");
    }

    #[test]
    fn test_wheel_speed_imperial() {
        let signals = VehicleSignals::new();
        signals.wheel_rear_left.update(16093);
        assert_eq!(signals.wheel_rear_left.units_imperial(), "mph");
        assert!((signals.wheel_rear_left.value_imperial() - 100.0).abs() < 0.01);
    }
}
