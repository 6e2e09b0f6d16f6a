//! State module for tracking navigation progress
//!
//! This module provides the state machine a browsing session walks through for
//! each navigation attempt.

mod navigation_state;

// Re-export main types
pub use navigation_state::NavigationState;
