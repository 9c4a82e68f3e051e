//! The steps of a submission, each an `impl App` block.
//!
//! - [`branch`]: make sure the per-user branch exists
//! - [`file`]: write the submitted content to the branch
//! - [`pull_request`]: open or refresh the PR from the branch into main
//! - [`submit`]: validate a request and run the three steps in order

pub mod branch;
pub mod file;
pub mod pull_request;
pub mod submit;
