//! Modules layer - persistence infrastructure shared by the features
//!
//! Holds the document object store, its primary/fallback resolver and the
//! download sink.

pub mod storage;
