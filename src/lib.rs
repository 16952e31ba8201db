//! Input43D: device-independent keyboard, mouse and game controller input.
//!
//! Each device class is a trait ([`Keyboard`], [`Mouse`], [`GameController`],
//! [`Tablet`]) with a matching listener trait. Listeners are owned by the
//! application and registered on devices by shared handle; devices deliver
//! events to them synchronously, in registration order.
//!
//! Bindings live under [`backends`]: an in-memory one that works everywhere and
//! a Win32 one (feature `win32`, Windows only). A [`DeviceManager`] owns the
//! devices a binding creates.
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use input43d::{DeviceManager, EventLogger, InputConfig, Mouse};
//!
//! let mut devices = DeviceManager::with_virtual_devices(&InputConfig::default()).unwrap();
//! let logger = Rc::new(RefCell::new(EventLogger::new()));
//! let mouse = devices.mouse_mut(0).unwrap();
//! let id = mouse.add_listener(logger.clone());
//! mouse.remove_listener(id);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod backends;
pub mod config;
pub mod device;
pub mod error;
pub mod game_controller;
pub mod keyboard;
pub mod keymap;
pub mod logger;
pub mod manager;
pub mod mouse;
pub mod registry;
pub mod tablet;

pub use config::InputConfig;
pub use device::{Device, DeviceInfo, DeviceKind};
pub use error::{InputError, Result};
pub use game_controller::{
    AxisPosition, AxisRange, ControllerLayout, ControllerState, GameController,
    GameControllerEvent, GameControllerListener, SharedGameControllerListener,
};
pub use keyboard::{Keyboard, KeyboardEvent, KeyboardListener, NpKey, SharedKeyboardListener};
pub use keymap::{KeyEntry, KeyLayout, KeyMap, ScanCodePair};
pub use logger::EventLogger;
pub use manager::DeviceManager;
pub use mouse::{
    Mouse, MouseEvent, MouseListener, ScrollDirection, SharedMouseListener, StandardCursor,
    WHEEL_DELTA,
};
pub use registry::{ListenerId, ListenerRegistry};
pub use tablet::{Tablet, TabletListener};
