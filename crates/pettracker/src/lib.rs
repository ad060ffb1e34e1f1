//! `pettracker` - An NFC pet tag tracker
//!
//! This library binds an NFC tag to a locally stored pet profile with
//! contact, medical and location records, routes between the tracker's
//! pages, watches safe zones and reports events to an external issue
//! tracker and an OAuth identity provider.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod geolocation;
pub mod identity;
pub mod logging;
pub mod net;
pub mod notify;
pub mod pages;
pub mod profile;
pub mod router;
pub mod shell;
pub mod storage;
pub mod tag;
pub mod timer;
pub mod view;

pub use config::Config;
pub use error::{Error, Result};
pub use identity::{AuthUser, Identity};
pub use logging::init_logging;
pub use profile::{ProfilePatch, UserProfile};
pub use router::{Navigation, Route, Router};
pub use shell::{App, HardwareEvent, Services};
pub use storage::{KeyValueStore, MemoryStore, Persistence, SqliteStore, StorageKey};
pub use tag::TagId;
