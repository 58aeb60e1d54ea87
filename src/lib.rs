//! QRTIST - artistic QR codes backed by tracked short links
//!
//! This library composites scannable, error-correction level H QR codes onto
//! arbitrary background illustrations and keeps a small registry of short
//! links so that every scan of a printed code can be counted.
//!
//! # Features
//!
//! - **Compositor**: Dots over the artwork, solid finder patterns, square PNG output
//! - **Link Registry**: SQLite-backed short links with per-scan user-agent tracking
//! - **Freemium Gate**: Free instances see only their most recent links
//! - **HTTP Boundary**: actix-web redirect endpoint plus a small JSON management API
//!
//! # Example
//!
//! ```no_run
//! use qrtist::{Compositor, Registry, RenderConfig, RegistryOptions};
//!
//! fn main() -> qrtist::Result<()> {
//!     let registry = Registry::open_in_memory()?;
//!     let link = registry.create_link("https://example.com/menu")?;
//!     let short_url = RegistryOptions::default().short_url(&link.id);
//!
//!     let background = std::fs::read("artwork.png")?;
//!     let compositor = Compositor::new(RenderConfig::default())?;
//!     let image = compositor.compose_bytes(&background, &short_url)?;
//!     image.save("menu-qr.png")?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]

pub mod compositor;
pub mod config;
pub mod error;
pub mod gate;
pub mod logging;
pub mod output;
pub mod qr;
pub mod registry;
pub mod server;

// Re-exports for convenience
pub use error::{Error, Result};

pub use compositor::{Compositor, RenderConfig, encode_png};
pub use config::{
    LogRotation, LoggingOptions, QrtistConfig, RegistryOptions, RenderOptions, ServerOptions,
};
pub use gate::{FreemiumGate, GatedListing, ProStatus};
pub use qr::{ModuleMatrix, QrDecoder, QrEncoder};
pub use registry::{DateCount, LinkDetail, LinkSummary, Registry, ScanEvent, ShortLink};
pub use server::{AppState, Server};
