#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Shared test helpers used across the archive and HTTP suites.
//! Layout: fixtures.rs (photo trees and toolchain detection), archivers.rs (stand-in archiver commands and process liveness checks).

pub mod archivers;
pub mod fixtures;
