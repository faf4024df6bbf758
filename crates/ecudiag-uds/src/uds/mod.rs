//! UDS (Unified Diagnostic Services) protocol layer
//!
//! Builds requests, runs the response wait loop and tracks routing and
//! security access state on top of a [`Transport`](crate::transport::Transport).

mod error;
mod nrc;
mod response;
mod session;
mod types;

pub use error::UdsError;
pub use nrc::NegativeResponseCode;
pub use response::{classify, Inbound};
pub use session::UdsSession;
pub use types::{ActiveState, DidValue, ResponseMode, ServiceRequest, SessionState};

/// Added to the request service id in a positive response
pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;

/// Service id of every negative response
pub const NEGATIVE_RESPONSE_SID: u8 = 0x7F;

/// Suppress-positive-response bit of a sub-function byte
pub const SUPPRESS_POSITIVE_RESPONSE: u8 = 0x80;

/// Supported service identifiers
pub mod service_id {
    pub const DIAGNOSTIC_SESSION_CONTROL: u8 = 0x10;
    pub const ECU_RESET: u8 = 0x11;
    pub const CLEAR_DIAGNOSTIC_INFORMATION: u8 = 0x14;
    pub const READ_DTC_INFORMATION: u8 = 0x19;
    pub const READ_DATA_BY_IDENTIFIER: u8 = 0x22;
    pub const SECURITY_ACCESS: u8 = 0x27;
    pub const COMMUNICATION_CONTROL: u8 = 0x28;
    pub const WRITE_DATA_BY_IDENTIFIER: u8 = 0x2E;
    pub const TESTER_PRESENT: u8 = 0x3E;
    pub const CONTROL_DTC_SETTING: u8 = 0x85;
}

/// DiagnosticSessionControl (0x10) session types
pub mod session_type {
    pub const DEFAULT: u8 = 0x01;
    pub const PROGRAMMING: u8 = 0x02;
    pub const EXTENDED: u8 = 0x03;
}

/// ECUReset (0x11) sub-functions
pub mod reset_type {
    /// Complete shutdown and restart
    pub const HARD_RESET: u8 = 0x01;
    /// Simulated ignition cycle
    pub const KEY_OFF_ON_RESET: u8 = 0x02;
    pub const SOFT_RESET: u8 = 0x03;
}

/// ReadDTCInformation (0x19) sub-functions
pub mod dtc_sub_function {
    pub const REPORT_NUMBER_OF_DTC_BY_STATUS_MASK: u8 = 0x01;
    pub const REPORT_DTC_BY_STATUS_MASK: u8 = 0x02;
}

/// DTC status bits (ISO 14229-1 D.2)
pub mod dtc_status_mask {
    pub const TEST_FAILED: u8 = 0x01;
    pub const TEST_FAILED_THIS_OPERATION_CYCLE: u8 = 0x02;
    pub const PENDING_DTC: u8 = 0x04;
    pub const CONFIRMED_DTC: u8 = 0x08;
    pub const TEST_NOT_COMPLETED_SINCE_LAST_CLEAR: u8 = 0x10;
    pub const TEST_FAILED_SINCE_LAST_CLEAR: u8 = 0x20;
    pub const TEST_NOT_COMPLETED_THIS_OPERATION_CYCLE: u8 = 0x40;
    pub const WARNING_INDICATOR_REQUESTED: u8 = 0x80;
    /// Mask sent when none is given
    pub const DEFAULT: u8 = 0xAF;
}

/// ClearDiagnosticInformation (0x14) groups
pub mod dtc_group {
    pub const ALL: u32 = 0x00FF_FFFF;
}

/// CommunicationControl (0x28) parameters
pub mod communication_control {
    pub const ENABLE_RX_AND_TX: u8 = 0x00;
    pub const ENABLE_RX_DISABLE_TX: u8 = 0x01;
    pub const DISABLE_RX_ENABLE_TX: u8 = 0x02;
    pub const DISABLE_RX_AND_TX: u8 = 0x03;
    /// Communication type: normal and network management messages
    pub const NORMAL_AND_NETWORK_MANAGEMENT: u8 = 0x03;
}

/// ControlDTCSetting (0x85) setting types
pub mod dtc_setting {
    pub const ON: u8 = 0x01;
    pub const OFF: u8 = 0x02;
}

/// Well-known data identifiers
pub mod common_did {
    pub const VIN: u16 = 0xF190;
    pub const HARDWARE_VERSION: u16 = 0xF191;
    pub const SOFTWARE_VERSION: u16 = 0xF194;
    pub const CALIBRATION_VERSION: u16 = 0xF195;
    pub const ECU_SERIAL_NUMBER: u16 = 0xF18C;
    pub const ECU_MANUFACTURING_DATE: u16 = 0xF18A;
    pub const ECU_INSTALLATION_DATE: u16 = 0xF18B;
}

/// SecurityAccess (0x27) sub-functions
pub mod security_level {
    pub const LEVEL1_SEED: u8 = 0x01;
    pub const LEVEL1_KEY: u8 = 0x02;
    pub const LEVEL2_SEED: u8 = 0x03;
    pub const LEVEL2_KEY: u8 = 0x04;
    pub const LEVEL3_SEED: u8 = 0x05;
    pub const LEVEL3_KEY: u8 = 0x06;
    pub const LEVEL4_SEED: u8 = 0x07;
    pub const LEVEL4_KEY: u8 = 0x08;
}
