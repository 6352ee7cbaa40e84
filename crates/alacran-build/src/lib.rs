//! Image build pipeline for alacran.
//!
//! # Pipeline
//!
//! ```text
//! ImageMaker::ensure_image
//!   1. Ingest      ── uploaded tar | git clone | inline definition → source_files/
//!   2. Locate      ── alacran-definition (or bare Dockerfile), one level deep at most
//!   3. Validate    ── schemaVersion 2, exactly one directive
//!   4a. Pull       ── imageName: pull the pre-built image, no build
//!   4b. Build      ── Dockerfile → image.tar → docker build → retag + push
//!   5. Cleanup     ── workspace (and uploaded tar) removed on every path
//! ```
//!
//! # Workspace layout
//!
//! ```text
//! <base>/temp/image_raw/<app>/<version>/
//!   source_files/   extracted or cloned source
//!   image.tar       build context handed to the engine
//! ```

pub mod bundle;
pub mod definition;
pub mod dockerfile;
pub mod image_maker;
pub mod ingest;
pub mod template;
pub mod workspace;

pub use definition::{BuildDescriptor, BuildDirective};
pub use image_maker::{ErrorKind, ImageMaker, PipelineError};
pub use template::TemplateCatalog;
