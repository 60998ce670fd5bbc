#![forbid(unsafe_code)]

//! Stateless glue between an external workflow orchestrator and the video
//! platforms it feeds from: channel listing, background downloads and a
//! handful of pass-through routes.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod downloader;
pub mod extractor;
pub mod fetch;
pub mod lister;
pub mod logging;
pub mod models;
pub mod slug;

#[cfg(test)]
pub(crate) mod test_support;
