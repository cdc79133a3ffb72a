//! Trait definitions for extensible components
//!
//! These traits allow users to swap implementations or provide their own
//! for the caching backend that sits in front of the billing provider.

pub mod cache;
