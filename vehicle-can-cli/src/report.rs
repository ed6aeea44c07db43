//! Snapshot reports of the live vehicle parameters

use crate::config::{DisplayConfig, OutputFormat};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use vehicle_can::{IngestStatsSnapshot, Signal, UnitSystem, VehicleSignals};

/// One parameter as shown in a report
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    pub key: &'static str,
    pub name: &'static str,
    /// None until the first frame carrying the signal arrives
    pub value: Option<f32>,
    pub text: String,
    pub units: &'static str,
}

/// Every selected parameter at one point in time
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub units: UnitSystem,
    pub readings: Vec<Reading>,
    /// Battery current times voltage, in watts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_power_w: Option<f32>,
    pub stats: IngestStatsSnapshot,
}

impl Snapshot {
    pub fn capture(
        signals: &VehicleSignals,
        selected: &[Signal],
        display: &DisplayConfig,
        stats: IngestStatsSnapshot,
        now: DateTime<Utc>,
    ) -> Self {
        let units = display.units;
        let readings = selected
            .iter()
            .map(|&signal| {
                let param = signals.get(signal);
                let (snapshot, text) = param.reading(units);
                Reading {
                    key: signal.key(),
                    name: param.name(),
                    value: snapshot.has_value().then(|| snapshot.value(units)),
                    text: text.to_string(),
                    units: param.units_in(units),
                }
            })
            .collect();

        let battery_power_w = if display.show_power {
            battery_power(signals)
        } else {
            None
        };

        Self {
            timestamp: now.to_rfc3339(),
            units,
            readings,
            battery_power_w,
            stats,
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Text => Ok(self.to_text()),
            OutputFormat::Json => Ok(serde_json::to_string(self)?),
        }
    }

    fn to_text(&self) -> String {
        let mut out = format!(
            "── {} ({} frames, {} decoded) ──\n",
            self.timestamp, self.stats.frames_received, self.stats.frames_decoded
        );
        for reading in &self.readings {
            out.push_str(&format!(
                "  {:<32} {:>8} {}\n",
                reading.name, reading.text, reading.units
            ));
        }
        if let Some(power) = self.battery_power_w {
            out.push_str(&format!(
                "  {:<32} {:>8.1} kW\n",
                "Traction battery power",
                power / 1000.0
            ));
        }
        out
    }
}

/// Instantaneous battery power in watts, once both current and voltage
/// are known
pub fn battery_power(signals: &VehicleSignals) -> Option<f32> {
    let current = signals.battery_current.snapshot();
    let voltage = signals.battery_voltage.snapshot();
    if current.has_value() && voltage.has_value() {
        Some(current.si * voltage.si)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_power_needs_current_and_voltage() {
        let signals = VehicleSignals::new();
        assert!(battery_power(&signals).is_none());

        signals.battery_current.update(-250);
        assert!(battery_power(&signals).is_none());

        signals.battery_voltage.update(360);
        let power = battery_power(&signals).unwrap();
        assert!((power + 9000.0).abs() < 0.5);
    }

    #[test]
    fn test_text_report() {
        let signals = VehicleSignals::new();
        signals.speed.update(5000);

        let display = DisplayConfig::default();
        let snapshot = Snapshot::capture(
            &signals,
            &[Signal::Speed, Signal::BatterySoc],
            &display,
            IngestStatsSnapshot::default(),
            at_noon(),
        );

        let text = snapshot.render(OutputFormat::Text).unwrap();
        assert!(text.contains("2024-05-01T12:00:00+00:00"));
        assert!(text.contains("Vehicle speed"));
        assert!(text.contains(" +50.00 kph"));
        assert!(text.contains("(noval) %"));
        assert!(!text.contains("Traction battery power"));
    }

    #[test]
    fn test_power_line_follows_display_setting() {
        let signals = VehicleSignals::new();
        signals.battery_current.update(100);
        signals.battery_voltage.update(200);

        let shown = Snapshot::capture(
            &signals,
            &[Signal::Speed],
            &DisplayConfig::default(),
            IngestStatsSnapshot::default(),
            at_noon(),
        );
        assert!(shown.battery_power_w.is_some());
        let text = shown.render(OutputFormat::Text).unwrap();
        assert!(text.contains("Traction battery power"));
        assert!(text.contains("2.0 kW"));

        let display = DisplayConfig {
            show_power: false,
            ..DisplayConfig::default()
        };
        let hidden = Snapshot::capture(
            &signals,
            &[Signal::Speed],
            &display,
            IngestStatsSnapshot::default(),
            at_noon(),
        );
        assert!(hidden.battery_power_w.is_none());
        assert!(!hidden
            .render(OutputFormat::Text)
            .unwrap()
            .contains("Traction battery power"));
        let json = hidden.render(OutputFormat::Json).unwrap();
        assert!(!json.contains("battery_power_w"));
    }

    #[test]
    fn test_json_report() {
        let signals = VehicleSignals::new();
        signals.speed.update(5000);
        signals.battery_current.update(100);
        signals.battery_voltage.update(200);

        let display = DisplayConfig {
            units: UnitSystem::Imperial,
            ..DisplayConfig::default()
        };
        let snapshot = Snapshot::capture(
            &signals,
            &[Signal::Speed, Signal::EngineCoolantTemp],
            &display,
            IngestStatsSnapshot::default(),
            at_noon(),
        );

        let json: serde_json::Value =
            serde_json::from_str(&snapshot.render(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["units"], "imperial");
        assert_eq!(json["readings"][0]["key"], "speed");
        assert_eq!(json["readings"][0]["text"], " +31.07");
        assert_eq!(json["readings"][0]["units"], "mph");
        assert!(json["readings"][1]["value"].is_null());
        assert!((json["battery_power_w"].as_f64().unwrap() - 2000.0).abs() < 0.1);
        assert_eq!(json["stats"]["frames_received"], 0);
    }
}
