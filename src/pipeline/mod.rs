//! Pipeline stages for sticker conversion.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested without the chat collaborator or the network.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ decode ──▶ composite ──▶ encode ──▶ deliver
//! (HTTP)    (WebP)     (over white)  (png/jpg)  (naming, batch)
//! ```
//!
//! 1. [`fetch`]: download the file with a hard byte ceiling; the only
//!    stage with network I/O
//! 2. [`decode`]: WebP → RGBA, sniffing the real content type on failure
//! 3. [`composite`]: flatten onto the shared white backdrop
//! 4. [`encode`]: PNG (lossless, alpha) and JPEG (full + scaled)
//! 5. [`deliver`]: filenames and the sorted grouped send
//!
//! Stages 2–4 are CPU-bound; [`crate::convert`] runs them on the blocking
//! thread pool.

pub mod composite;
pub mod decode;
pub mod deliver;
pub mod encode;
pub mod fetch;
