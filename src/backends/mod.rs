//! Platform bindings.
//!
//! A binding turns raw input into the abstract device contracts.
//!
//! # Bindings
//! - [`virtual_input`] works everywhere: the host injects raw input. Tests and
//!   demos use it, and so can hosts that already own an input source.
//! - `windows` (feature **`win32`**, Windows only) decodes window messages and
//!   Raw Input forwarded from the host's window procedure, and polls XInput.

pub mod virtual_input;

#[cfg(all(feature = "win32", target_os = "windows"))]
#[cfg_attr(docsrs, doc(cfg(all(feature = "win32", target_os = "windows"))))]
pub mod windows;
