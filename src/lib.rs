//! CoC Engine - Certificate of Conformity Generator
//!
//! # The Five Rules (Non-Negotiable)
//! 1. Templates Are Data
//! 2. Layout Is Deterministic
//! 3. Missing Assets Degrade, Never Fail
//! 4. One Page Per Document
//! 5. Archives Mirror Input Order

pub mod batch;
pub mod layout;
pub mod render;
pub mod sanitize;
pub mod templates;

pub use batch::{BatchError, BatchPackager};
pub use layout::{lay_out_page, AssetAvailability, Element, LayoutConfig, PageLayout};
pub use render::{effective_date, AssetLibrary, DocumentRenderer, RenderError};
pub use templates::{Identity, StoreError, TechnicalRow, TemplateRecord, TemplateStore};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
