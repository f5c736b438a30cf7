//! FINS end codes (response codes).
//!
//! Every FINS response carries a 2-byte end code right after the echoed
//! command code. The first byte is the main response code (MRES), the second
//! the sub response code (SRES). Three bits are flags rather than part of the
//! code:
//!
//! | Bit | Meaning |
//! |-----|---------|
//! | MRES bit 7 (0x8000) | Network relay error |
//! | SRES bit 6 (0x0040) | Non-fatal CPU unit error |
//! | SRES bit 7 (0x0080) | Fatal CPU unit error |
//!
//! A response is successful when the code is zero once those flags are
//! masked out.
//!
//! # Example
//!
//! ```
//! use omron_fins_client::{EndCode, EndCodeCategory};
//!
//! let code = EndCode::from_u16(0x1103);
//! assert!(!code.is_success());
//! assert_eq!(code.category(), EndCodeCategory::ParameterError);
//! assert_eq!(code.description(), "address range error");
//!
//! // Non-fatal CPU error flag alone does not fail the command
//! assert!(EndCode::from_u16(0x0040).is_success());
//! ```

const RELAY_ERROR_FLAG: u8 = 0x80;
const NON_FATAL_CPU_FLAG: u8 = 0x40;
const FATAL_CPU_FLAG: u8 = 0x80;

/// Raw end code returned by the PLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EndCode {
    /// Main response code (MRES), flags included.
    pub main: u8,
    /// Sub response code (SRES), flags included.
    pub sub: u8,
}

/// Category of a FINS end code, following the main-code groups of the FINS
/// command reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EndCodeCategory {
    /// Normal completion.
    Success,
    /// The service was cancelled (0x0001).
    ServiceCancelled,
    /// Local node error (0x01xx).
    LocalNodeError,
    /// Destination node error (0x02xx).
    DestinationNodeError,
    /// Communications controller error (0x03xx).
    ControllerError,
    /// Service not supported by the unit or model (0x04xx).
    NotSupported,
    /// Routing table error (0x05xx).
    RoutingTableError,
    /// Command format error (0x10xx).
    CommandFormatError,
    /// Parameter error, including address range errors (0x11xx).
    ParameterError,
    /// Read not possible (0x20xx).
    ReadNotPossible,
    /// Write not possible (0x21xx).
    WriteNotPossible,
    /// Not executable in the current PLC mode (0x22xx).
    ModeError,
    /// No such device (0x23xx).
    NoSuchDevice,
    /// Cannot start or stop (0x24xx).
    CannotStartStop,
    /// Unit error (0x25xx).
    UnitError,
    /// Command error (0x26xx).
    CommandError,
    /// Access right error (0x30xx).
    AccessRightError,
    /// Service aborted (0x40xx).
    Abort,
    /// Code outside the documented table.
    Unknown,
}

impl EndCode {
    /// Creates an end code from its two wire bytes.
    pub fn new(main: u8, sub: u8) -> Self {
        Self { main, sub }
    }

    /// Creates an end code from its big-endian 16-bit value.
    pub fn from_u16(value: u16) -> Self {
        let [main, sub] = value.to_be_bytes();
        Self { main, sub }
    }

    /// Returns the raw 16-bit value, flags included.
    pub fn raw(self) -> u16 {
        u16::from_be_bytes([self.main, self.sub])
    }

    /// Main code with the relay error flag masked out.
    pub fn main_code(self) -> u8 {
        self.main & !RELAY_ERROR_FLAG
    }

    /// Sub code with the CPU error flags masked out.
    pub fn sub_code(self) -> u8 {
        self.sub & !(NON_FATAL_CPU_FLAG | FATAL_CPU_FLAG)
    }

    /// Returns whether the command completed normally.
    pub fn is_success(self) -> bool {
        self.main_code() == 0 && self.sub_code() == 0
    }

    /// Network relay error flag.
    pub fn relay_error(self) -> bool {
        self.main & RELAY_ERROR_FLAG != 0
    }

    /// Non-fatal CPU unit error flag.
    pub fn non_fatal_cpu_error(self) -> bool {
        self.sub & NON_FATAL_CPU_FLAG != 0
    }

    /// Fatal CPU unit error flag.
    pub fn fatal_cpu_error(self) -> bool {
        self.sub & FATAL_CPU_FLAG != 0
    }

    /// Maps the code to its category.
    pub fn category(self) -> EndCodeCategory {
        match (self.main_code(), self.sub_code()) {
            (0x00, 0x00) => EndCodeCategory::Success,
            (0x00, _) => EndCodeCategory::ServiceCancelled,
            (0x01, _) => EndCodeCategory::LocalNodeError,
            (0x02, _) => EndCodeCategory::DestinationNodeError,
            (0x03, _) => EndCodeCategory::ControllerError,
            (0x04, _) => EndCodeCategory::NotSupported,
            (0x05, _) => EndCodeCategory::RoutingTableError,
            (0x10, _) => EndCodeCategory::CommandFormatError,
            (0x11, _) => EndCodeCategory::ParameterError,
            (0x20, _) => EndCodeCategory::ReadNotPossible,
            (0x21, _) => EndCodeCategory::WriteNotPossible,
            (0x22, _) => EndCodeCategory::ModeError,
            (0x23, _) => EndCodeCategory::NoSuchDevice,
            (0x24, _) => EndCodeCategory::CannotStartStop,
            (0x25, _) => EndCodeCategory::UnitError,
            (0x26, _) => EndCodeCategory::CommandError,
            (0x30, _) => EndCodeCategory::AccessRightError,
            (0x40, _) => EndCodeCategory::Abort,
            _ => EndCodeCategory::Unknown,
        }
    }

    /// Human readable description from the FINS end-code table.
    pub fn description(self) -> &'static str {
        match (self.main_code(), self.sub_code()) {
            (0x00, 0x00) => "normal completion",
            (0x00, 0x01) => "service cancelled",

            (0x01, 0x01) => "local node not in network",
            (0x01, 0x02) => "token timeout",
            (0x01, 0x03) => "retries failed",
            (0x01, 0x04) => "too many send frames",
            (0x01, 0x05) => "node address range error",
            (0x01, 0x06) => "node address duplication",

            (0x02, 0x01) => "destination node not in network",
            (0x02, 0x02) => "unit missing",
            (0x02, 0x03) => "third node missing",
            (0x02, 0x04) => "destination node busy",
            (0x02, 0x05) => "response timeout",

            (0x03, 0x01) => "communications controller error",
            (0x03, 0x02) => "CPU unit error",
            (0x03, 0x03) => "controller error",
            (0x03, 0x04) => "unit number error",

            (0x04, 0x01) => "undefined command",
            (0x04, 0x02) => "not supported by model/version",

            (0x05, 0x01) => "destination address setting error",
            (0x05, 0x02) => "no routing tables",
            (0x05, 0x03) => "routing table error",
            (0x05, 0x04) => "too many relays",

            (0x10, 0x01) => "command too long",
            (0x10, 0x02) => "command too short",
            (0x10, 0x03) => "elements/data don't match",
            (0x10, 0x04) => "command format error",
            (0x10, 0x05) => "header error",

            (0x11, 0x01) => "area classification missing",
            (0x11, 0x02) => "access size error",
            (0x11, 0x03) => "address range error",
            (0x11, 0x04) => "address range exceeded",
            (0x11, 0x06) => "program missing",
            (0x11, 0x09) => "relational error",
            (0x11, 0x0A) => "duplicate data access",
            (0x11, 0x0B) => "response too long",
            (0x11, 0x0C) => "parameter error",

            (0x20, 0x02) => "read protected",
            (0x20, 0x03) => "table missing",
            (0x20, 0x04) => "data missing",
            (0x20, 0x05) => "program missing",
            (0x20, 0x06) => "file missing",
            (0x20, 0x07) => "data mismatch",

            (0x21, 0x01) => "read-only",
            (0x21, 0x02) => "write protected",
            (0x21, 0x03) => "cannot register",
            (0x21, 0x05) => "program missing",
            (0x21, 0x06) => "file missing",
            (0x21, 0x07) => "file name already exists",
            (0x21, 0x08) => "cannot change",

            (0x22, 0x01) => "not possible during execution",
            (0x22, 0x02) => "not possible while running",
            (0x22, 0x03) => "wrong PLC mode (program)",
            (0x22, 0x04) => "wrong PLC mode (debug)",
            (0x22, 0x05) => "wrong PLC mode (monitor)",
            (0x22, 0x06) => "wrong PLC mode (run)",
            (0x22, 0x07) => "specified node not polling node",
            (0x22, 0x08) => "step cannot be executed",

            (0x23, 0x01) => "file device missing",
            (0x23, 0x02) => "memory missing",
            (0x23, 0x03) => "clock missing",

            (0x24, 0x01) => "table missing",

            (0x25, 0x02) => "memory error",
            (0x25, 0x03) => "I/O setting error",
            (0x25, 0x04) => "too many I/O points",
            (0x25, 0x05) => "CPU bus error",
            (0x25, 0x06) => "I/O duplication",
            (0x25, 0x07) => "I/O bus error",
            (0x25, 0x09) => "SYSMAC BUS/2 error",
            (0x25, 0x0A) => "CPU bus unit error",
            (0x25, 0x0D) => "SYSMAC BUS number duplication",
            (0x25, 0x0F) => "memory error",
            (0x25, 0x10) => "SYSMAC BUS terminator missing",

            (0x26, 0x01) => "no protection",
            (0x26, 0x02) => "incorrect password",
            (0x26, 0x04) => "protected",
            (0x26, 0x05) => "service already executing",
            (0x26, 0x06) => "service stopped",
            (0x26, 0x07) => "no execution right",
            (0x26, 0x08) => "settings not complete",
            (0x26, 0x09) => "necessary items not set",
            (0x26, 0x0A) => "number already defined",
            (0x26, 0x0B) => "error will not clear",

            (0x30, 0x01) => "no access right",

            (0x40, 0x01) => "service aborted",

            _ => "unknown end code",
        }
    }
}

impl std::fmt::Display for EndCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X} ({})", self.raw(), self.description())
    }
}
