//! Error types for the DRM framebuffer core
//!
//! Every failure a framebuffer entry point can report is a variant of
//! [`DrmError`]. Variants carry the plane index or value that tripped the
//! check so that the debug channel and callers can tell rejections apart,
//! while [`DrmError::errno`] folds them back onto the numeric codes the
//! user/kernel boundary expects.

use core::fmt;

/// Negative errno values returned across the ioctl boundary.
pub mod errno {
    pub const ENOENT: i32 = -2;
    pub const EINVAL: i32 = -22;
    pub const ENOSPC: i32 = -28;
    pub const ENOSYS: i32 = -38;
    pub const EOPNOTSUPP: i32 = -95;
}

/// Main DRM error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrmError {
    /// Descriptor validation errors
    InvalidFlag {
        flags: u32,
    },
    UnknownFormat {
        format: u32,
    },
    BadDimensions {
        width: u32,
        height: u32,
    },
    MissingHandle {
        plane: usize,
    },
    HandleOnUnusedPlane {
        plane: usize,
    },
    PitchOnUnusedPlane {
        plane: usize,
    },
    OffsetOnUnusedPlane {
        plane: usize,
    },
    ModifierOnUnusedPlane {
        plane: usize,
    },
    ModifiersUnsupported,
    ModifierWithoutFlag {
        plane: usize,
        modifier: u64,
    },
    InconsistentModifiers {
        plane: usize,
    },
    UnsupportedModifier {
        format: u32,
        modifier: u64,
    },
    PitchTooSmall {
        plane: usize,
        pitch: u32,
        min_pitch: u64,
    },
    SizeOverflow {
        plane: usize,
    },

    /// Framebuffer object errors
    MisboundDevice,
    NoFormat,

    /// Registry errors
    NoSuchObject {
        resource: &'static str,
        id: u32,
    },
    IdSpaceExhausted,

    /// Generic errors
    InvalidArgument {
        name: &'static str,
        value: &'static str,
    },
    NotSupported {
        operation: &'static str,
    },
    OutOfSpace,
    NoHook {
        hook: &'static str,
    },

    /// Opaque failure reported by a driver callback, surfaced verbatim
    Driver {
        errno: i32,
    },
}

/// Taxonomy bucket of a [`DrmError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArg,
    NotSupported,
    OutOfSpace,
    NotFound,
    NotImplemented,
    Driver,
}

/// Result type alias for DRM operations
pub type DrmResult<T> = Result<T, DrmError>;

impl DrmError {
    /// Taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ModifiersUnsupported | Self::NotSupported { .. } => ErrorKind::NotSupported,
            Self::OutOfSpace | Self::IdSpaceExhausted => ErrorKind::OutOfSpace,
            Self::NoSuchObject { .. } => ErrorKind::NotFound,
            Self::NoHook { .. } => ErrorKind::NotImplemented,
            Self::Driver { .. } => ErrorKind::Driver,
            _ => ErrorKind::InvalidArg,
        }
    }

    /// Negative errno handed back to user space.
    pub fn errno(&self) -> i32 {
        match self {
            Self::Driver { errno } => *errno,
            _ => match self.kind() {
                ErrorKind::InvalidArg => errno::EINVAL,
                ErrorKind::NotSupported => errno::EOPNOTSUPP,
                ErrorKind::OutOfSpace => errno::ENOSPC,
                ErrorKind::NotFound => errno::ENOENT,
                ErrorKind::NotImplemented => errno::ENOSYS,
                ErrorKind::Driver => errno::EINVAL,
            },
        }
    }
}

impl fmt::Display for DrmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidFlag { flags } => write!(f, "bad framebuffer flags 0x{:08x}", flags),
            Self::UnknownFormat { format } => {
                write!(f, "bad framebuffer format {}", crate::fourcc::FourccName(*format))
            }
            Self::BadDimensions { width, height } => {
                write!(f, "bad framebuffer size {}x{}", width, height)
            }
            Self::MissingHandle { plane } => {
                write!(f, "no buffer object handle for plane {}", plane)
            }
            Self::HandleOnUnusedPlane { plane } => {
                write!(f, "buffer object handle for unused plane {}", plane)
            }
            Self::PitchOnUnusedPlane { plane } => {
                write!(f, "non-zero pitch for unused plane {}", plane)
            }
            Self::OffsetOnUnusedPlane { plane } => {
                write!(f, "non-zero offset for unused plane {}", plane)
            }
            Self::ModifierOnUnusedPlane { plane } => {
                write!(f, "non-zero modifier for unused plane {}", plane)
            }
            Self::ModifiersUnsupported => write!(f, "driver does not support fb modifiers"),
            Self::ModifierWithoutFlag { plane, modifier } => {
                write!(
                    f,
                    "fb modifier 0x{:x} for plane {} without the modifiers flag",
                    modifier, plane
                )
            }
            Self::InconsistentModifiers { plane } => {
                write!(f, "fb modifier for plane {} differs from plane 0", plane)
            }
            Self::UnsupportedModifier { format, modifier } => {
                write!(
                    f,
                    "modifier 0x{:x} not supported for format {}",
                    modifier,
                    crate::fourcc::FourccName(*format)
                )
            }
            Self::PitchTooSmall {
                plane,
                pitch,
                min_pitch,
            } => {
                write!(
                    f,
                    "bad pitch {} for plane {} (minimum {})",
                    pitch, plane, min_pitch
                )
            }
            Self::SizeOverflow { plane } => {
                write!(f, "plane {} extent does not fit its buffer", plane)
            }
            Self::MisboundDevice => write!(f, "framebuffer belongs to another device"),
            Self::NoFormat => write!(f, "framebuffer has no format"),
            Self::NoSuchObject { resource, id } => write!(f, "{} with id {} not found", resource, id),
            Self::IdSpaceExhausted => write!(f, "mode object id space exhausted"),
            Self::InvalidArgument { name, value } => {
                write!(f, "Invalid argument '{}': {}", name, value)
            }
            Self::NotSupported { operation } => write!(f, "Operation not supported: {}", operation),
            Self::OutOfSpace => write!(f, "source rectangle outside framebuffer"),
            Self::NoHook { hook } => write!(f, "driver does not implement {}", hook),
            Self::Driver { errno } => write!(f, "driver error {}", errno),
        }
    }
}
