//! Lock-free mirror of the robot's telemetry and control values
//!
//! Every field lives in its own atomic word. The MQTT event loop is the only
//! writer, the render loop and the status bar are readers. Fields are not
//! versioned together: reading two fields may observe them from different
//! messages, but a single field is never observed half-written.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Semantic type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Int,
}

/// One independently addressable piece of robot state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    LinearX,
    AngularZ,
    BatteryPercentage,
    BrushSpeed,
    BatteryIsCharging,
    EStop,
    Handbrake,
    DirectStatus,
    RobotMode,
    SafetyMode,
}

impl Field {
    pub const COUNT: usize = 10;

    pub const ALL: [Field; Field::COUNT] = [
        Field::LinearX,
        Field::AngularZ,
        Field::BatteryPercentage,
        Field::BrushSpeed,
        Field::BatteryIsCharging,
        Field::EStop,
        Field::Handbrake,
        Field::DirectStatus,
        Field::RobotMode,
        Field::SafetyMode,
    ];

    /// Payload key carrying this field
    pub fn key(self) -> &'static str {
        match self {
            Field::LinearX => "linear_x",
            Field::AngularZ => "angular_z",
            Field::BatteryPercentage => "battery_percentage",
            Field::BrushSpeed => "brush_speed",
            Field::BatteryIsCharging => "battery_is_charging",
            Field::EStop => "e_stop",
            Field::Handbrake => "handbrake",
            Field::DirectStatus => "direct_status",
            Field::RobotMode => "robot_mode",
            Field::SafetyMode => "safety_mode",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            Field::LinearX | Field::AngularZ | Field::BatteryPercentage => FieldKind::Float,
            _ => FieldKind::Int,
        }
    }

    fn slot(self) -> usize {
        self as usize
    }

    fn mask(self) -> u32 {
        1 << self.slot()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Typed value read back from the mirror
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f32),
    Int(i32),
}

impl FieldValue {
    pub fn as_f32(self) -> f32 {
        match self {
            FieldValue::Float(v) => v,
            FieldValue::Int(v) => v as f32,
        }
    }

    pub fn as_i32(self) -> i32 {
        match self {
            FieldValue::Float(v) => v as i32,
            FieldValue::Int(v) => v,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{:.2}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
        }
    }
}

/// Shared telemetry store, one atomic cell per [`Field`]
///
/// Float fields keep their IEEE-754 bits, integer fields their two's
/// complement bits. Both fit a single `u32`, so a store or a load is one
/// machine word and can never tear. All cells start at zero, which decodes
/// to `0` and `0.0`.
///
/// `applied` has one bit per field, set after the first store, so readers
/// can tell a real zero from a field the robot never reported.
#[derive(Debug, Default)]
pub struct StateMirror {
    cells: [AtomicU32; Field::COUNT],
    applied: AtomicU32,
}

impl StateMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `raw` into `field`, coerced to the field's type
    ///
    /// Integer fields truncate toward zero and saturate at the `i32` range;
    /// NaN becomes `0`.
    pub fn apply(&self, field: Field, raw: f64) {
        let bits = match field.kind() {
            FieldKind::Float => (raw as f32).to_bits(),
            FieldKind::Int => (raw as i32) as u32,
        };
        self.cells[field.slot()].store(bits, Ordering::Release);
        self.applied.fetch_or(field.mask(), Ordering::Release);
    }

    /// Whether `field` has been applied at least once
    pub fn is_applied(&self, field: Field) -> bool {
        self.applied.load(Ordering::Acquire) & field.mask() != 0
    }

    /// Last applied value of `field`
    pub fn read(&self, field: Field) -> FieldValue {
        let bits = self.cells[field.slot()].load(Ordering::Acquire);
        match field.kind() {
            FieldKind::Float => FieldValue::Float(f32::from_bits(bits)),
            FieldKind::Int => FieldValue::Int(bits as i32),
        }
    }

    /// Read surface for consumers outside the render path
    pub fn get_field(&self, field: Field) -> FieldValue {
        self.read(field)
    }

    /// Like [`read`](Self::read), but `None` until the first update
    pub fn read_applied(&self, field: Field) -> Option<FieldValue> {
        self.is_applied(field).then(|| self.read(field))
    }

    pub fn read_f32(&self, field: Field) -> f32 {
        self.read(field).as_f32()
    }

    pub fn read_i32(&self, field: Field) -> i32 {
        self.read(field).as_i32()
    }
}
