//! Pure stages shared by the upload and download operations.
//!
//! ## Data Flow
//!
//! ```text
//! note text ──▶ extract ──▶ (uploader / fetch) ──▶ sniff ──▶ rewrite ──▶ note text
//!                               │
//!                           multipart
//! ```
//!
//! 1. [`extract`]: find image links and their verbatim source spans
//! 2. [`multipart`]: build `multipart/form-data` bodies for the PicGo server
//! 3. [`sniff`]: identify downloaded bytes by magic number
//! 4. [`rewrite`]: substitute source spans with new links
//!
//! None of these stages performs I/O.

pub mod extract;
pub mod multipart;
pub mod rewrite;
pub mod sniff;
