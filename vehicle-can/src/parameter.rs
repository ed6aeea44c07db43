//! Decoded vehicle parameters
//!
//! A [`Parameter`] holds the latest raw value of one vehicle signal together
//! with the coefficients that turn it into metric and imperial engineering
//! values. Display strings are rendered lazily and cached until the next
//! update.
//!
//! # Concurrency
//!
//! One writer (the ingestion loop) calls [`Parameter::update`]; any number of
//! readers call the accessors concurrently. The raw value and its update
//! sequence number live in a single `AtomicU64`, so a reader always sees a
//! complete value from exactly one update. The string caches are guarded by
//! mutexes that only readers take; the writer never blocks.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

/// Longest display string a parameter renders
pub const MAX_STRING_LENGTH: usize = 15;

/// Returned by the string accessors until the first update
pub const PLACEHOLDER: &str = "(noval)";

/// Rendered when a value does not fit in [`MAX_STRING_LENGTH`] characters
pub const OVERFLOW: &str = "(ovf)";

/// Fixed-capacity display string; rendering never allocates
pub type DisplayString = heapless::String<MAX_STRING_LENGTH>;

/// 0.01 km/h expressed in mph is `0.01 * KPH_TO_MPH`
pub const KPH_TO_MPH: f32 = 0.621_371;

/// Which unit system a consumer wants to display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    #[default]
    Metric,
    Imperial,
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitSystem::Metric => write!(f, "metric"),
            UnitSystem::Imperial => write!(f, "imperial"),
        }
    }
}

/// Static description of one parameter: names, units, conversion
/// coefficients and display format.
///
/// Conversions:
/// - `si = raw * raw_scale + raw_offset`
/// - `metric = si + metric_offset`
/// - `imperial = si * imperial_scale + imperial_offset`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    /// Long human-readable name, e.g. "Battery current"
    pub name: &'static str,
    /// Short name for narrow layouts, e.g. "Batt current"
    pub short_name: &'static str,
    /// Abbreviation for gauges, e.g. "I"
    pub abbreviation: &'static str,
    /// Metric display units, e.g. "kph"
    pub units: &'static str,
    /// Imperial display units, e.g. "mph"
    pub imperial_units: &'static str,
    pub raw_scale: f32,
    pub raw_offset: f32,
    pub metric_offset: f32,
    pub imperial_scale: f32,
    pub imperial_offset: f32,
    /// True if the displayed number reserves a sign slot
    pub is_signed: bool,
    /// Number of digits to show before the decimal point
    pub integer_digits: u8,
    /// Number of digits to show after the decimal point
    pub fractional_digits: u8,
}

impl ParameterSpec {
    /// A parameter with identity conversions and a `+NN.N` display format
    pub const fn new(
        name: &'static str,
        short_name: &'static str,
        abbreviation: &'static str,
    ) -> Self {
        Self {
            name,
            short_name,
            abbreviation,
            units: "units",
            imperial_units: "units",
            raw_scale: 1.0,
            raw_offset: 0.0,
            metric_offset: 0.0,
            imperial_scale: 1.0,
            imperial_offset: 0.0,
            is_signed: true,
            integer_digits: 2,
            fractional_digits: 1,
        }
    }

    pub const fn units(self, units: &'static str, imperial_units: &'static str) -> Self {
        Self {
            units,
            imperial_units,
            ..self
        }
    }

    /// Raw to SI conversion
    pub const fn raw(self, raw_scale: f32, raw_offset: f32) -> Self {
        Self {
            raw_scale,
            raw_offset,
            ..self
        }
    }

    /// SI to metric display offset (e.g. kelvins to degrees Celsius)
    pub const fn metric(self, metric_offset: f32) -> Self {
        Self {
            metric_offset,
            ..self
        }
    }

    /// SI to imperial display conversion
    pub const fn imperial(self, imperial_scale: f32, imperial_offset: f32) -> Self {
        Self {
            imperial_scale,
            imperial_offset,
            ..self
        }
    }

    pub const fn format(self, is_signed: bool, integer_digits: u8, fractional_digits: u8) -> Self {
        Self {
            is_signed,
            integer_digits,
            fractional_digits,
            ..self
        }
    }

    /// Total width of the displayed number, including sign and decimal point
    pub const fn total_width(&self) -> usize {
        let fraction = if self.fractional_digits > 0 {
            self.fractional_digits as usize + 1
        } else {
            0
        };
        self.integer_digits as usize + fraction + self.is_signed as usize
    }

    /// Convert a raw value to SI units
    pub fn si(&self, raw: i32) -> f32 {
        raw as f32 * self.raw_scale + self.raw_offset
    }
}

/// A consistent view of one parameter at one update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    /// Update sequence number; 0 means the parameter was never updated
    pub sequence: u32,
    pub raw: i32,
    pub si: f32,
    pub metric: f32,
    pub imperial: f32,
}

impl ParameterSnapshot {
    pub fn has_value(&self) -> bool {
        self.sequence != 0
    }

    /// The display value in the requested unit system
    pub fn value(&self, units: UnitSystem) -> f32 {
        match units {
            UnitSystem::Metric => self.metric,
            UnitSystem::Imperial => self.imperial,
        }
    }
}

#[derive(Debug)]
struct StringCache {
    /// Sequence number the text was rendered for
    sequence: u32,
    text: DisplayString,
}

impl StringCache {
    fn placeholder() -> Self {
        let mut text = DisplayString::new();
        let _ = text.push_str(PLACEHOLDER);
        Self { sequence: 0, text }
    }
}

/// One decoded vehicle signal
#[derive(Debug)]
pub struct Parameter {
    spec: ParameterSpec,
    /// High 32 bits: update sequence. Low 32 bits: raw value.
    state: AtomicU64,
    metric_cache: Mutex<StringCache>,
    imperial_cache: Mutex<StringCache>,
    format_count: AtomicU64,
}

fn pack(sequence: u32, raw: i32) -> u64 {
    ((sequence as u64) << 32) | (raw as u32 as u64)
}

fn unpack(state: u64) -> (u32, i32) {
    ((state >> 32) as u32, state as u32 as i32)
}

impl Parameter {
    pub fn new(spec: ParameterSpec) -> Self {
        Self {
            spec,
            state: AtomicU64::new(0),
            metric_cache: Mutex::new(StringCache::placeholder()),
            imperial_cache: Mutex::new(StringCache::placeholder()),
            format_count: AtomicU64::new(0),
        }
    }

    pub fn spec(&self) -> &ParameterSpec {
        &self.spec
    }

    /// Publish a new raw value, straight from a CAN frame.
    ///
    /// Both cached strings become stale. Meant to be called by frame
    /// decoders only.
    pub fn update(&self, raw: i32) {
        let _ = self
            .state
            .fetch_update(Ordering::Release, Ordering::Relaxed, |state| {
                let (sequence, _) = unpack(state);
                let next = match sequence.wrapping_add(1) {
                    0 => 1,
                    n => n,
                };
                Some(pack(next, raw))
            });
    }

    /// Consistent copy of the current value and its derived values
    pub fn snapshot(&self) -> ParameterSnapshot {
        let (sequence, raw) = unpack(self.state.load(Ordering::Acquire));
        let si = self.spec.si(raw);
        ParameterSnapshot {
            sequence,
            raw,
            si,
            metric: si + self.spec.metric_offset,
            imperial: si * self.spec.imperial_scale + self.spec.imperial_offset,
        }
    }

    /// True once the first update has been published
    pub fn has_value(&self) -> bool {
        self.snapshot().has_value()
    }

    pub fn raw_value(&self) -> i32 {
        self.snapshot().raw
    }

    pub fn raw_scale(&self) -> f32 {
        self.spec.raw_scale
    }

    pub fn si_value(&self) -> f32 {
        self.snapshot().si
    }

    /// Metric display value, in [`Parameter::units`]
    pub fn value(&self) -> f32 {
        self.snapshot().metric
    }

    /// Imperial display value, in [`Parameter::units_imperial`]
    pub fn value_imperial(&self) -> f32 {
        self.snapshot().imperial
    }

    pub fn value_in(&self, units: UnitSystem) -> f32 {
        self.snapshot().value(units)
    }

    pub fn units(&self) -> &'static str {
        self.spec.units
    }

    pub fn units_imperial(&self) -> &'static str {
        self.spec.imperial_units
    }

    pub fn units_in(&self, units: UnitSystem) -> &'static str {
        match units {
            UnitSystem::Metric => self.spec.units,
            UnitSystem::Imperial => self.spec.imperial_units,
        }
    }

    pub fn name(&self) -> &'static str {
        self.spec.name
    }

    pub fn short_name(&self) -> &'static str {
        self.spec.short_name
    }

    pub fn abbreviation(&self) -> &'static str {
        self.spec.abbreviation
    }

    pub fn is_signed(&self) -> bool {
        self.spec.is_signed
    }

    pub fn integer_digits(&self) -> u8 {
        self.spec.integer_digits
    }

    pub fn fractional_digits(&self) -> u8 {
        self.spec.fractional_digits
    }

    /// Metric display string, re-rendered only after an update
    pub fn string(&self) -> DisplayString {
        self.string_in(UnitSystem::Metric)
    }

    /// Imperial display string, re-rendered only after an update
    pub fn string_imperial(&self) -> DisplayString {
        self.string_in(UnitSystem::Imperial)
    }

    pub fn string_in(&self, units: UnitSystem) -> DisplayString {
        self.reading(units).1
    }

    /// The current value and its display string, both from the same update
    pub fn reading(&self, units: UnitSystem) -> (ParameterSnapshot, DisplayString) {
        let cache = match units {
            UnitSystem::Metric => &self.metric_cache,
            UnitSystem::Imperial => &self.imperial_cache,
        };

        // snapshot under the lock so the cache never moves back to an older update
        let mut cache = cache.lock();
        let snapshot = self.snapshot();
        if cache.sequence != snapshot.sequence {
            cache.text = self.render(snapshot.value(units));
            cache.sequence = snapshot.sequence;
        }
        (snapshot, cache.text.clone())
    }

    /// Number of times a display string has been rendered
    pub fn format_count(&self) -> u64 {
        self.format_count.load(Ordering::Relaxed)
    }

    fn render(&self, value: f32) -> DisplayString {
        self.format_count.fetch_add(1, Ordering::Relaxed);

        let width = self.spec.total_width();
        let precision = self.spec.fractional_digits as usize;
        let mut text = DisplayString::new();
        let written = if self.spec.is_signed {
            write!(text, "{:+width$.precision$}", value)
        } else {
            write!(text, "{:width$.precision$}", value)
        };

        if written.is_err() {
            text.clear();
            let _ = text.push_str(OVERFLOW);
        }
        text
    }
}
