//! Controller services: run, stop, status and unit data.
//!
//! | Type | Code | Body | Output |
//! |------|------|------|--------|
//! | [`RunCommand`] | 0x0401 | 0xFFFF + mode | `()` |
//! | [`StopCommand`] | 0x0402 | none | `()` |
//! | [`ControllerDataReadCommand`] | 0x0501 | none | [`ControllerData`] |
//! | [`ControllerStatusReadCommand`] | 0x0601 | none | [`ControllerStatus`] |

use crate::command::{Command, CommandCode};
use crate::error::{FinsError, Result};

/// Program number meaning "the whole program".
const ALL_PROGRAMS: u16 = 0xFFFF;

const MODEL_LEN: usize = 20;
const VERSION_LEN: usize = 20;
const AREA_DATA_OFFSET: usize = 80;
const AREA_DATA_LEN: usize = 12;

const STATUS_LEN: usize = 10;
const ERROR_MESSAGE_LEN: usize = 16;

/// PLC operating mode for [`RunCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlcMode {
    /// Debug mode.
    Debug,
    /// Monitor mode: running, with online edits and forced bits allowed.
    Monitor,
    /// Run mode.
    Run,
}

impl PlcMode {
    /// Mode byte sent on the wire.
    pub fn code(self) -> u8 {
        match self {
            PlcMode::Debug => 0x01,
            PlcMode::Monitor => 0x02,
            PlcMode::Run => 0x04,
        }
    }
}

/// Puts the PLC into the given operating mode (0x0401).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunCommand {
    mode: PlcMode,
}

impl RunCommand {
    /// Creates a run command.
    pub fn new(mode: PlcMode) -> Self {
        Self { mode }
    }
}

impl Command for RunCommand {
    type Output = ();

    fn code(&self) -> CommandCode {
        CommandCode::Run
    }

    fn encode_body(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&ALL_PROGRAMS.to_be_bytes());
        buf.push(self.mode.code());
    }

    fn decode_data(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Puts the PLC into program mode (0x0402).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopCommand;

impl Command for StopCommand {
    type Output = ();

    fn code(&self) -> CommandCode {
        CommandCode::Stop
    }

    fn encode_body(&self, _buf: &mut Vec<u8>) {}

    fn decode_data(&self, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Run state reported by the controller status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RunState {
    /// Program stopped.
    Stop,
    /// Program executing.
    Run,
    /// CPU on standby.
    Standby,
    /// Any other status byte.
    Unknown(u8),
}

impl RunState {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => RunState::Stop,
            0x01 => RunState::Run,
            0x80 => RunState::Standby,
            other => RunState::Unknown(other),
        }
    }
}

/// Operating mode reported by the controller status read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperatingMode {
    /// Program mode.
    Program,
    /// Monitor mode.
    Monitor,
    /// Run mode.
    Run,
    /// Any other mode byte.
    Unknown(u8),
}

impl OperatingMode {
    fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => OperatingMode::Program,
            0x02 => OperatingMode::Monitor,
            0x04 => OperatingMode::Run,
            other => OperatingMode::Unknown(other),
        }
    }
}

/// Decoded controller status.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerStatus {
    /// Program execution state.
    pub run_state: RunState,
    /// Operating mode.
    pub mode: OperatingMode,
    /// Fatal error flags.
    pub fatal_errors: u16,
    /// Non-fatal error flags.
    pub non_fatal_errors: u16,
    /// Message flags (MSG instructions).
    pub message_flags: u16,
    /// Error code of the most serious current error.
    pub error_code: u16,
    /// Error message, empty when the PLC sent none.
    pub error_message: String,
}

impl ControllerStatus {
    /// Returns whether any fatal error flag is set.
    pub fn has_fatal_error(&self) -> bool {
        self.fatal_errors != 0
    }

    /// Returns whether any non-fatal error flag is set.
    pub fn has_non_fatal_error(&self) -> bool {
        self.non_fatal_errors != 0
    }

    /// Returns whether the program is executing.
    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Run
    }
}

/// Reads the controller status (0x0601).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerStatusReadCommand;

impl Command for ControllerStatusReadCommand {
    type Output = ControllerStatus;

    fn code(&self) -> CommandCode {
        CommandCode::ControllerStatusRead
    }

    fn encode_body(&self, _buf: &mut Vec<u8>) {}

    fn decode_data(&self, data: &[u8]) -> Result<ControllerStatus> {
        if data.len() < STATUS_LEN {
            return Err(FinsError::malformed_response(format!(
                "controller status needs {} bytes, got {}",
                STATUS_LEN,
                data.len()
            )));
        }

        let word = |offset: usize| u16::from_be_bytes([data[offset], data[offset + 1]]);
        let error_message = data
            .get(STATUS_LEN..STATUS_LEN + ERROR_MESSAGE_LEN)
            .map(ascii_field)
            .unwrap_or_default();

        Ok(ControllerStatus {
            run_state: RunState::from_byte(data[0]),
            mode: OperatingMode::from_byte(data[1]),
            fatal_errors: word(2),
            non_fatal_errors: word(4),
            message_flags: word(6),
            error_code: word(8),
            error_message,
        })
    }
}

/// Memory layout reported with the controller data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AreaData {
    /// User program area size, in Kwords.
    pub program_area_size: u16,
    /// I/O memory size, in Kbytes.
    pub iom_size: u8,
    /// Number of DM words.
    pub dm_words: u16,
    /// Timer/counter area size, in Kbits.
    pub timer_counter_size: u8,
    /// Number of EM banks (excluding file memory).
    pub em_banks: u8,
}

/// Decoded controller (CPU unit) data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerData {
    /// CPU unit model, e.g. `CJ2M-CPU31`.
    pub model: String,
    /// CPU unit version.
    pub version: String,
    /// Memory layout, when the PLC sent it.
    pub area_data: Option<AreaData>,
}

/// Reads the controller model, version and memory layout (0x0501).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerDataReadCommand;

impl Command for ControllerDataReadCommand {
    type Output = ControllerData;

    fn code(&self) -> CommandCode {
        CommandCode::ControllerDataRead
    }

    fn encode_body(&self, _buf: &mut Vec<u8>) {}

    fn decode_data(&self, data: &[u8]) -> Result<ControllerData> {
        if data.len() < MODEL_LEN + VERSION_LEN {
            return Err(FinsError::malformed_response(format!(
                "controller data needs {} bytes, got {}",
                MODEL_LEN + VERSION_LEN,
                data.len()
            )));
        }

        let area_data = data
            .get(AREA_DATA_OFFSET..AREA_DATA_OFFSET + AREA_DATA_LEN)
            .map(|area| AreaData {
                program_area_size: u16::from_be_bytes([area[0], area[1]]),
                iom_size: area[2],
                dm_words: u16::from_be_bytes([area[3], area[4]]),
                timer_counter_size: area[5],
                em_banks: area[6],
            });

        Ok(ControllerData {
            model: ascii_field(&data[..MODEL_LEN]),
            version: ascii_field(&data[MODEL_LEN..MODEL_LEN + VERSION_LEN]),
            area_data,
        })
    }
}

/// Decodes a fixed-width ASCII field padded with spaces or NULs.
fn ascii_field(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}
