//! Tags: the stable identities of data blocks.
//!
//! A tag is a 4-byte code. The canonical (display) form is the big-endian
//! hex of that code; on the wire it is written little-endian like every
//! other integer, so encode and decode both go through plain `u32`
//! little-endian access and the reversal stays symmetric.
//!
//! The full appliance catalog has thousands of tags; this crate ships the
//! subset needed for authentication and the common read paths, and exposes
//! [`TagRegistry`] so callers can plug in a larger catalog. Codes absent
//! from the registry resolve to [`Tag::Unknown`] instead of failing the
//! parse.

use crate::wire_type::WireType;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Tag namespaces, one per appliance subsystem.
///
/// The namespace is carried in the high byte of the tag code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Rscp,
    Ems,
    Pvi,
    Bat,
    Dcdc,
    Pm,
    Db,
    Fms,
    Srv,
    Ha,
    Info,
    Ep,
    Sys,
    Um,
    Wb,
}

impl Namespace {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x00 => Some(Namespace::Rscp),
            0x01 => Some(Namespace::Ems),
            0x02 => Some(Namespace::Pvi),
            0x03 => Some(Namespace::Bat),
            0x04 => Some(Namespace::Dcdc),
            0x05 => Some(Namespace::Pm),
            0x06 => Some(Namespace::Db),
            0x07 => Some(Namespace::Fms),
            0x08 => Some(Namespace::Srv),
            0x09 => Some(Namespace::Ha),
            0x0A => Some(Namespace::Info),
            0x0B => Some(Namespace::Ep),
            0x0C => Some(Namespace::Sys),
            0x0D => Some(Namespace::Um),
            0x0E => Some(Namespace::Wb),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Namespace::Rscp => 0x00,
            Namespace::Ems => 0x01,
            Namespace::Pvi => 0x02,
            Namespace::Bat => 0x03,
            Namespace::Dcdc => 0x04,
            Namespace::Pm => 0x05,
            Namespace::Db => 0x06,
            Namespace::Fms => 0x07,
            Namespace::Srv => 0x08,
            Namespace::Ha => 0x09,
            Namespace::Info => 0x0A,
            Namespace::Ep => 0x0B,
            Namespace::Sys => 0x0C,
            Namespace::Um => 0x0D,
            Namespace::Wb => 0x0E,
        }
    }
}

/// Full definition of a known tag.
#[derive(Debug)]
pub struct TagDef {
    pub code: u32,
    pub name: &'static str,
    pub namespace: Namespace,
    /// Wire type the appliance documents for this tag. Used as the default
    /// when building blocks; decoding always trusts the type byte on the
    /// wire instead.
    pub wire_type: WireType,
}

/// Identity of a data block, compared by code.
#[derive(Debug, Clone, Copy)]
pub enum Tag {
    Known(&'static TagDef),
    /// A code the registry could not resolve; carries the raw value so the
    /// block round-trips unchanged.
    Unknown(u32),
}

impl Tag {
    pub fn code(&self) -> u32 {
        match self {
            Tag::Known(def) => def.code,
            Tag::Unknown(code) => *code,
        }
    }

    pub fn name(&self) -> Option<&'static str> {
        match self {
            Tag::Known(def) => Some(def.name),
            Tag::Unknown(_) => None,
        }
    }

    pub fn namespace(&self) -> Option<Namespace> {
        match self {
            Tag::Known(def) => Some(def.namespace),
            Tag::Unknown(_) => None,
        }
    }

    /// Declared wire type; `None` (zero-length) for unresolved tags.
    pub fn wire_type(&self) -> WireType {
        match self {
            Tag::Known(def) => def.wire_type,
            Tag::Unknown(_) => WireType::None,
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.code() == other.code()
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.code().hash(state);
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Known(def) => f.write_str(def.name),
            Tag::Unknown(code) => {
                write!(f, "UNKNOWN_{}", hex::encode_upper(code.to_be_bytes()))
            }
        }
    }
}

/// Code-to-tag lookup consulted during decode.
pub trait TagRegistry: Send + Sync {
    fn lookup(&self, code: u32) -> Option<&'static TagDef>;

    /// Resolves a code, falling back to [`Tag::Unknown`].
    fn resolve(&self, code: u32) -> Tag {
        match self.lookup(code) {
            Some(def) => Tag::Known(def),
            None => Tag::Unknown(code),
        }
    }
}

macro_rules! tag_table {
    ($( $ns:ident { $( $name:ident = ($code:expr, $wt:ident), )+ } )+) => {
        /// Static definitions backing the built-in registry.
        pub mod defs {
            use super::{Namespace, TagDef};
            use crate::wire_type::WireType;
            $( $(
                pub const $name: TagDef = TagDef {
                    code: $code,
                    name: stringify!($name),
                    namespace: Namespace::$ns,
                    wire_type: WireType::$wt,
                };
            )+ )+
        }

        /// Interned [`Tag`] constants for the built-in catalog subset.
        pub mod tags {
            use super::Tag;
            $( $(
                pub const $name: Tag = Tag::Known(&super::defs::$name);
            )+ )+
        }

        // Kept in ascending code order; `DefaultRegistry` binary-searches it.
        static TABLE: &[&TagDef] = &[
            $( $( &defs::$name, )+ )+
        ];
    };
}

tag_table! {
    Rscp {
        RSCP_REQ_AUTHENTICATION = (0x0000_0001, Container),
        RSCP_AUTHENTICATION_USER = (0x0000_0002, String),
        RSCP_AUTHENTICATION_PASSWORD = (0x0000_0003, String),
        RSCP_AUTHENTICATION = (0x0080_0001, UChar8),
        RSCP_GENERAL_ERROR = (0x00FF_FFFF, Error),
    }
    Ems {
        EMS_REQ_POWER_PV = (0x0100_0001, None),
        EMS_REQ_POWER_BAT = (0x0100_0002, None),
        EMS_REQ_POWER_HOME = (0x0100_0003, None),
        EMS_REQ_POWER_GRID = (0x0100_0004, None),
        EMS_REQ_POWER_ADD = (0x0100_0005, None),
        EMS_REQ_AUTARKY = (0x0100_0006, None),
        EMS_REQ_SELF_CONSUMPTION = (0x0100_0007, None),
        EMS_REQ_BAT_SOC = (0x0100_0008, None),
        EMS_POWER_PV = (0x0180_0001, Int32),
        EMS_POWER_BAT = (0x0180_0002, Int32),
        EMS_POWER_HOME = (0x0180_0003, Int32),
        EMS_POWER_GRID = (0x0180_0004, Int32),
        EMS_POWER_ADD = (0x0180_0005, Int32),
        EMS_AUTARKY = (0x0180_0006, Float32),
        EMS_SELF_CONSUMPTION = (0x0180_0007, Float32),
        EMS_BAT_SOC = (0x0180_0008, UChar8),
        EMS_GENERAL_ERROR = (0x01FF_FFFF, Error),
    }
    Bat {
        BAT_REQ_DATA = (0x0304_0000, Container),
        BAT_INDEX = (0x0304_0001, UInt16),
        BAT_RSOC = (0x0380_0001, Float32),
        BAT_MODULE_VOLTAGE = (0x0380_0002, Float32),
        BAT_CURRENT = (0x0380_0003, Float32),
        BAT_MAX_BAT_VOLTAGE = (0x0380_0004, Float32),
        BAT_MAX_CHARGE_CURRENT = (0x0380_0005, Float32),
        BAT_EOD_VOLTAGE = (0x0380_0006, Float32),
        BAT_MAX_DISCHARGE_CURRENT = (0x0380_0007, Float32),
        BAT_CHARGE_CYCLES = (0x0380_0008, UInt32),
        BAT_STATUS_CODE = (0x0380_0009, UInt32),
        BAT_ERROR_CODE = (0x0380_000A, UInt32),
        BAT_DEVICE_NAME = (0x0380_000B, String),
        BAT_DCB_COUNT = (0x0380_000C, UChar8),
        BAT_DATA = (0x0384_0000, Container),
        BAT_GENERAL_ERROR = (0x03FF_FFFF, Error),
    }
    Info {
        INFO_REQ_SERIAL_NUMBER = (0x0A00_0001, None),
        INFO_REQ_PRODUCTION_DATE = (0x0A00_0002, None),
        INFO_REQ_MAC_ADDRESS = (0x0A00_0004, None),
        INFO_REQ_TIME = (0x0A00_0005, None),
        INFO_REQ_UTC_TIME = (0x0A00_0006, None),
        INFO_REQ_TIME_ZONE = (0x0A00_0007, None),
        INFO_REQ_SW_RELEASE = (0x0A00_0008, None),
        INFO_SERIAL_NUMBER = (0x0A80_0001, String),
        INFO_PRODUCTION_DATE = (0x0A80_0002, String),
        INFO_MAC_ADDRESS = (0x0A80_0004, String),
        INFO_TIME = (0x0A80_0005, Timestamp),
        INFO_UTC_TIME = (0x0A80_0006, Timestamp),
        INFO_TIME_ZONE = (0x0A80_0007, String),
        INFO_SW_RELEASE = (0x0A80_0008, String),
        INFO_GENERAL_ERROR = (0x0AFF_FFFF, Error),
    }
    Wb {
        WB_REQ_DATA = (0x0E04_0000, Container),
        WB_INDEX = (0x0E04_0001, UChar8),
        WB_ENERGY_ALL = (0x0E80_0001, UInt32),
        WB_SOC = (0x0E80_0002, UChar8),
        WB_DATA = (0x0E84_0000, Container),
        WB_GENERAL_ERROR = (0x0EFF_FFFF, Error),
    }
}

/// The built-in registry over the shipped catalog subset.
pub struct DefaultRegistry;

impl TagRegistry for DefaultRegistry {
    fn lookup(&self, code: u32) -> Option<&'static TagDef> {
        TABLE
            .binary_search_by_key(&code, |def| def.code)
            .ok()
            .map(|idx| TABLE[idx])
    }
}

static DEFAULT_REGISTRY: DefaultRegistry = DefaultRegistry;

/// Registry used by the `decode` convenience entry points.
pub fn default_registry() -> &'static dyn TagRegistry {
    &DEFAULT_REGISTRY
}
