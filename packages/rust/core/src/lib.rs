//! Core pipeline orchestration and domain logic for masterdoc.
//!
//! This crate turns a set of article documents and their summaries into one
//! master document: it parses article paths, orders the catalog by section,
//! decorates each article with its preamble, composes everything behind a
//! table of contents, and forces landscape pages (see [`pipeline::build_master`]).

pub mod banners;
pub mod catalog;
pub mod composer;
pub mod decorator;
pub mod inputs;
pub mod orientation;
pub mod paths;
pub mod pipeline;
pub mod styles;
pub mod toc;
