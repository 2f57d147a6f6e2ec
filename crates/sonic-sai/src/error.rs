//! SAI error types and status handling.
//!
//! This module maps raw SAI status codes onto a closed Rust enum and
//! provides the error type returned when the driver channel itself fails.

use std::fmt;
use thiserror::Error;

/// Base of the `SAI_STATUS_ATTR_NOT_IMPLEMENTED_0` range.
const ATTR_NOT_IMPLEMENTED_BASE: i32 = -0x0005_0000;
/// Base of the `SAI_STATUS_ATTR_NOT_SUPPORTED_0` range.
const ATTR_NOT_SUPPORTED_BASE: i32 = -0x0006_0000;
/// Width of each attribute-indexed status range.
const ATTR_RANGE_WIDTH: i32 = 0x1_0000;

/// SAI status codes matching the SAI C API.
///
/// These values correspond to `sai_status_t` in the SAI header files. The
/// attribute-indexed ranges collapse to a single variant carrying the
/// attribute index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaiStatus {
    Success,
    Failure,
    NotSupported,
    NoMemory,
    InsufficientResources,
    InvalidParameter,
    ItemAlreadyExists,
    ItemNotFound,
    BufferOverflow,
    InvalidPortNumber,
    InvalidPortMember,
    InvalidVlanId,
    Uninitialized,
    TableFull,
    MandatoryAttributeMissing,
    NotImplemented,
    AddrNotFound,
    ObjectInUse,
    InvalidObjectType,
    InvalidObjectId,
    InvalidNifId,
    NifTableFull,
    HwTableFull,
    NotExecuted,
    AttrNotImplemented(u16),
    AttrNotSupported(u16),
}

impl SaiStatus {
    /// Creates a SaiStatus from a raw i32 value.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => SaiStatus::Success,
            -1 => SaiStatus::Failure,
            -2 => SaiStatus::NotSupported,
            -3 => SaiStatus::NoMemory,
            -4 => SaiStatus::InsufficientResources,
            -5 => SaiStatus::InvalidParameter,
            -6 => SaiStatus::ItemAlreadyExists,
            -7 => SaiStatus::ItemNotFound,
            -8 => SaiStatus::BufferOverflow,
            -9 => SaiStatus::InvalidPortNumber,
            -10 => SaiStatus::InvalidPortMember,
            -11 => SaiStatus::InvalidVlanId,
            -12 => SaiStatus::Uninitialized,
            -13 => SaiStatus::TableFull,
            -14 => SaiStatus::MandatoryAttributeMissing,
            -15 => SaiStatus::NotImplemented,
            -16 => SaiStatus::AddrNotFound,
            -17 => SaiStatus::ObjectInUse,
            -18 => SaiStatus::InvalidObjectType,
            -19 => SaiStatus::InvalidObjectId,
            -20 => SaiStatus::InvalidNifId,
            -21 => SaiStatus::NifTableFull,
            -22 => SaiStatus::HwTableFull,
            -23 => SaiStatus::NotExecuted,
            s if s <= ATTR_NOT_IMPLEMENTED_BASE && s > ATTR_NOT_IMPLEMENTED_BASE - ATTR_RANGE_WIDTH => {
                SaiStatus::AttrNotImplemented((ATTR_NOT_IMPLEMENTED_BASE - s) as u16)
            }
            s if s <= ATTR_NOT_SUPPORTED_BASE && s > ATTR_NOT_SUPPORTED_BASE - ATTR_RANGE_WIDTH => {
                SaiStatus::AttrNotSupported((ATTR_NOT_SUPPORTED_BASE - s) as u16)
            }
            _ => SaiStatus::Failure,
        }
    }

    /// Returns the raw `sai_status_t` value.
    pub fn to_raw(self) -> i32 {
        match self {
            SaiStatus::Success => 0,
            SaiStatus::Failure => -1,
            SaiStatus::NotSupported => -2,
            SaiStatus::NoMemory => -3,
            SaiStatus::InsufficientResources => -4,
            SaiStatus::InvalidParameter => -5,
            SaiStatus::ItemAlreadyExists => -6,
            SaiStatus::ItemNotFound => -7,
            SaiStatus::BufferOverflow => -8,
            SaiStatus::InvalidPortNumber => -9,
            SaiStatus::InvalidPortMember => -10,
            SaiStatus::InvalidVlanId => -11,
            SaiStatus::Uninitialized => -12,
            SaiStatus::TableFull => -13,
            SaiStatus::MandatoryAttributeMissing => -14,
            SaiStatus::NotImplemented => -15,
            SaiStatus::AddrNotFound => -16,
            SaiStatus::ObjectInUse => -17,
            SaiStatus::InvalidObjectType => -18,
            SaiStatus::InvalidObjectId => -19,
            SaiStatus::InvalidNifId => -20,
            SaiStatus::NifTableFull => -21,
            SaiStatus::HwTableFull => -22,
            SaiStatus::NotExecuted => -23,
            SaiStatus::AttrNotImplemented(idx) => ATTR_NOT_IMPLEMENTED_BASE - i32::from(idx),
            SaiStatus::AttrNotSupported(idx) => ATTR_NOT_SUPPORTED_BASE - i32::from(idx),
        }
    }

    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        *self == SaiStatus::Success
    }

    /// Returns true if the status indicates an error.
    pub fn is_error(&self) -> bool {
        *self != SaiStatus::Success
    }

    /// Returns true if the driver does not implement or support the
    /// queried object type or attribute.
    pub fn is_not_supported(&self) -> bool {
        matches!(
            self,
            SaiStatus::NotSupported
                | SaiStatus::NotImplemented
                | SaiStatus::AttrNotImplemented(_)
                | SaiStatus::AttrNotSupported(_)
        )
    }

    /// Returns true if the status reports hardware table exhaustion.
    pub fn is_table_full(&self) -> bool {
        matches!(
            self,
            SaiStatus::TableFull | SaiStatus::HwTableFull | SaiStatus::NifTableFull
        )
    }

    /// Converts to a Result, returning Ok(()) for success.
    pub fn into_result(self) -> SaiResult<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(SaiError::from_status(self))
        }
    }
}

impl fmt::Display for SaiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaiStatus::Success => "SAI_STATUS_SUCCESS",
            SaiStatus::Failure => "SAI_STATUS_FAILURE",
            SaiStatus::NotSupported => "SAI_STATUS_NOT_SUPPORTED",
            SaiStatus::NoMemory => "SAI_STATUS_NO_MEMORY",
            SaiStatus::InsufficientResources => "SAI_STATUS_INSUFFICIENT_RESOURCES",
            SaiStatus::InvalidParameter => "SAI_STATUS_INVALID_PARAMETER",
            SaiStatus::ItemAlreadyExists => "SAI_STATUS_ITEM_ALREADY_EXISTS",
            SaiStatus::ItemNotFound => "SAI_STATUS_ITEM_NOT_FOUND",
            SaiStatus::BufferOverflow => "SAI_STATUS_BUFFER_OVERFLOW",
            SaiStatus::InvalidPortNumber => "SAI_STATUS_INVALID_PORT_NUMBER",
            SaiStatus::InvalidPortMember => "SAI_STATUS_INVALID_PORT_MEMBER",
            SaiStatus::InvalidVlanId => "SAI_STATUS_INVALID_VLAN_ID",
            SaiStatus::Uninitialized => "SAI_STATUS_UNINITIALIZED",
            SaiStatus::TableFull => "SAI_STATUS_TABLE_FULL",
            SaiStatus::MandatoryAttributeMissing => "SAI_STATUS_MANDATORY_ATTRIBUTE_MISSING",
            SaiStatus::NotImplemented => "SAI_STATUS_NOT_IMPLEMENTED",
            SaiStatus::AddrNotFound => "SAI_STATUS_ADDR_NOT_FOUND",
            SaiStatus::ObjectInUse => "SAI_STATUS_OBJECT_IN_USE",
            SaiStatus::InvalidObjectType => "SAI_STATUS_INVALID_OBJECT_TYPE",
            SaiStatus::InvalidObjectId => "SAI_STATUS_INVALID_OBJECT_ID",
            SaiStatus::InvalidNifId => "SAI_STATUS_INVALID_NIF_ID",
            SaiStatus::NifTableFull => "SAI_STATUS_NIF_TABLE_FULL",
            SaiStatus::HwTableFull => "SAI_STATUS_HW_TABLE_FULL",
            SaiStatus::NotExecuted => "SAI_STATUS_NOT_EXECUTED",
            SaiStatus::AttrNotImplemented(idx) => {
                return write!(f, "SAI_STATUS_ATTR_NOT_IMPLEMENTED_{}", idx)
            }
            SaiStatus::AttrNotSupported(idx) => {
                return write!(f, "SAI_STATUS_ATTR_NOT_SUPPORTED_{}", idx)
            }
        };
        write!(f, "{}", s)
    }
}

/// Error type for SAI operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaiError {
    /// SAI API returned an error status.
    #[error("SAI operation failed: {status}")]
    Status { status: SaiStatus },

    /// The requested feature is not supported by the SAI implementation.
    #[error("Feature not supported: {feature}")]
    NotSupported { feature: String },

    /// Invalid parameter passed to SAI API.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Hardware table is full.
    #[error("Table full: {table}")]
    TableFull { table: String },

    /// The connection to the driver is gone. Nothing after this can be
    /// programmed, so callers treat it as fatal.
    #[error("SAI channel lost: {reason}")]
    ChannelLost { reason: String },
}

impl SaiError {
    /// Creates an error from a SAI status code.
    pub fn from_status(status: SaiStatus) -> Self {
        match status {
            s if s.is_not_supported() => SaiError::NotSupported {
                feature: s.to_string(),
            },
            s if s.is_table_full() => SaiError::TableFull {
                table: s.to_string(),
            },
            SaiStatus::InvalidParameter
            | SaiStatus::InvalidObjectType
            | SaiStatus::InvalidObjectId => SaiError::InvalidParameter {
                message: format!("SAI returned {}", status),
            },
            _ => SaiError::Status { status },
        }
    }

    /// Creates a channel-lost error.
    pub fn channel_lost(reason: impl Into<String>) -> Self {
        SaiError::ChannelLost {
            reason: reason.into(),
        }
    }

    /// Returns true if nothing further can be programmed after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SaiError::ChannelLost { .. })
    }
}

/// Result type for SAI operations.
pub type SaiResult<T> = Result<T, SaiError>;
