// Decoding known vehicle frames into parameters
use vehicle_can::{CanFrame, DecoderTable, VehicleSignals, PLACEHOLDER};

fn decode(table: &DecoderTable, signals: &VehicleSignals, id: u32, data: &[u8]) -> bool {
    let frame = CanFrame::new(id, data).unwrap();
    table.dispatch(&frame, signals)
}

#[test]
fn test_battery_frame() {
    let table = DecoderTable::vehicle();
    let signals = VehicleSignals::new();

    assert!(decode(&table, &signals, 0x03B, &[0x00, 0x64, 0x00, 0xC8]));

    assert_eq!(signals.battery_current.raw_value(), 100);
    assert!((signals.battery_current.value() - 10.0).abs() < 1e-4);
    assert_eq!(signals.battery_current.string().as_str(), " +10.0");

    assert_eq!(signals.battery_voltage.raw_value(), 200);
    assert_eq!(signals.battery_voltage.string().as_str(), "200");
}

#[test]
fn test_battery_current_is_sign_extended() {
    let table = DecoderTable::vehicle();
    let signals = VehicleSignals::new();

    decode(&table, &signals, 0x03B, &[0x0F, 0xFF, 0x00, 0x00]);
    assert_eq!(signals.battery_current.raw_value(), -1);
    assert_eq!(signals.battery_current.string().as_str(), "  -0.1");

    decode(&table, &signals, 0x03B, &[0x08, 0x00, 0x00, 0x00]);
    assert_eq!(signals.battery_current.raw_value(), -2048);
    assert_eq!(signals.battery_current.string().as_str(), "-204.8");

    // upper nibble is not part of the field
    decode(&table, &signals, 0x03B, &[0xF0, 0x10, 0x00, 0x00]);
    assert_eq!(signals.battery_current.raw_value(), 16);
}

#[test]
fn test_brake_and_accelerator() {
    let table = DecoderTable::vehicle();
    let signals = VehicleSignals::new();

    decode(&table, &signals, 0x030, &[0, 0, 0, 0, 127, 0, 0, 0]);
    assert_eq!(signals.brake_pedal.string().as_str(), "100");

    decode(&table, &signals, 0x030, &[0, 0, 0, 0, 64, 0, 0, 0]);
    assert_eq!(signals.brake_pedal.string().as_str(), " 50");

    decode(&table, &signals, 0x03A, &[0, 0, 0, 0, 0, 42, 0, 0]);
    assert_eq!(signals.accelerator_position.raw_value(), 42);
    assert_eq!(signals.accelerator_position.units(), "?");
}

#[test]
fn test_wheel_and_vehicle_speed() {
    let table = DecoderTable::vehicle();
    let signals = VehicleSignals::new();

    decode(&table, &signals, 0x0B1, &[0x03, 0xE8, 0x07, 0xD0, 0, 0, 0, 0]);
    assert_eq!(signals.wheel_front_right.string().as_str(), " +10.00");
    assert_eq!(signals.wheel_front_left.string().as_str(), " +20.00");

    decode(&table, &signals, 0x0B3, &[0x00, 0x64, 0x00, 0xC8, 0, 0, 0, 0]);
    assert_eq!(signals.wheel_rear_right.raw_value(), 100);
    assert_eq!(signals.wheel_rear_left.raw_value(), 200);

    decode(&table, &signals, 0x0B4, &[0, 0, 0, 0, 0, 0x13, 0x88, 0]);
    assert_eq!(signals.speed.string().as_str(), " +50.00");
    assert_eq!(signals.speed.string_imperial().as_str(), " +31.07");
    assert_eq!(signals.speed.units_imperial(), "mph");
}

#[test]
fn test_battery_health_frame() {
    let table = DecoderTable::vehicle();
    let signals = VehicleSignals::new();

    decode(&table, &signals, 0x3CB, &[0x64, 0x32, 0x04, 0xA0, 0x14, 0x1E, 0, 0]);

    assert_eq!(signals.battery_discharge_limit.string().as_str(), "100");
    assert_eq!(signals.battery_charge_limit.string().as_str(), " 50");
    assert_eq!(signals.battery_delta_soc.string().as_str(), "  2.0");
    assert_eq!(signals.battery_soc.string().as_str(), " 80.0");
    assert_eq!(signals.battery_temp_lowest.string().as_str(), " +20");
    assert_eq!(signals.battery_temp_highest.string().as_str(), " +30");
    assert_eq!(signals.battery_temp_highest.string_imperial().as_str(), " +86");
}

#[test]
fn test_coolant_frame() {
    let table = DecoderTable::vehicle();
    let signals = VehicleSignals::new();

    decode(&table, &signals, 0x52C, &[0x00, 0x50, 0, 0, 0, 0, 0, 0]);
    assert_eq!(signals.engine_coolant_temp.string().as_str(), " +40");
    assert_eq!(signals.engine_coolant_temp.string_imperial().as_str(), "+104");
}

#[test]
fn test_short_frame_reads_zero_padding() {
    let table = DecoderTable::vehicle();
    let signals = VehicleSignals::new();

    assert!(decode(&table, &signals, 0x0B4, &[0x01, 0x02]));
    assert!(signals.speed.has_value());
    assert_eq!(signals.speed.raw_value(), 0);
    assert_eq!(signals.speed.string().as_str(), "  +0.00");
}

#[test]
fn test_unknown_id_changes_nothing() {
    let table = DecoderTable::vehicle();
    let signals = VehicleSignals::new();

    assert!(!decode(&table, &signals, 0x123, &[0xFF; 8]));
    assert!(!decode(&table, &signals, 0x7FF, &[]));

    for (signal, param) in signals.iter() {
        assert!(!param.has_value(), "{} was updated", signal);
        assert_eq!(param.string().as_str(), PLACEHOLDER);
    }
}

#[test]
fn test_redispatch_is_idempotent() {
    let table = DecoderTable::vehicle();
    let signals = VehicleSignals::new();

    decode(&table, &signals, 0x0B4, &[0, 0, 0, 0, 0, 0x27, 0x10, 0]);
    let first = signals.speed.string();
    let first_value = signals.speed.value();

    decode(&table, &signals, 0x0B4, &[0, 0, 0, 0, 0, 0x27, 0x10, 0]);
    assert_eq!(signals.speed.string(), first);
    assert_eq!(signals.speed.value(), first_value);
    assert_eq!(first.as_str(), "+100.00");
}

#[test]
fn test_frame_flags_do_not_affect_lookup() {
    let table = DecoderTable::vehicle();
    let signals = VehicleSignals::new();

    let frame = CanFrame::new_extended(0x030, &[0, 0, 0, 0, 127]).unwrap();
    assert!(table.dispatch(&frame, &signals));
    assert_eq!(signals.brake_pedal.raw_value(), 127);
}
