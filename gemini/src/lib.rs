//! Synchronous client for Google's **Gemini Developer API**, tuned for
//! batch document extraction.
//!
//! The surface is small on purpose: upload a PDF through the File API,
//! wait for it to become `ACTIVE`, ask for structured JSON with
//! [`generate_json`], then delete the file. A [`KeyRing`] rotates
//! through several API keys so long unattended runs survive per-key
//! quota limits.
//!
//! # Quick start
//!
//! ```no_run
//! use std::path::Path;
//! use std::time::Duration;
//!
//! use tomecut_gemini::{
//!     GeminiBackend, GeminiError, KeyRing, delete_file, generate_json, upload_file,
//!     wait_until_active,
//! };
//!
//! # fn run() -> Result<(), GeminiError> {
//! let ring = KeyRing::from_env("Output/gemini_key_index")?;
//! let value = ring.try_each(|key| {
//!     let backend = GeminiBackend::new(key).with_model("gemini-2.0-flash");
//!     let cfg = backend.config();
//!     let file = upload_file(&cfg, Path::new("book.pdf"))?;
//!     let file = wait_until_active(&cfg, file, Duration::from_secs(300))?;
//!     let value = generate_json(&cfg, "List the lessons as a JSON object.", Some(&file));
//!     let _ = delete_file(&cfg, &file.name);
//!     value
//! })?;
//! println!("{value}");
//! # Ok(()) }
//! ```

mod client;
mod config;
mod error;
mod files;
mod keys;
mod structure;
mod types;

pub use client::generate;
pub use config::{
    AuthMode, DEFAULT_MODEL, GEMINI_API_BASE_URL, GeminiBackend, GeminiConfig, UPLOAD_BASE_URL,
};
pub use error::GeminiError;
pub use files::{FileState, GeminiFile, delete_file, get_file, upload_file, wait_until_active};
pub use keys::{KEYS_ENV_VAR, KeyRing};
pub use structure::{extract_json_value, generate_json};
pub use types::{
    Candidate, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part,
    PromptFeedback,
};
