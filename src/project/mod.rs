//! Project namespaces.
//!
//! A project is an isolated directory tree owned by one user:
//!
//! ```text
//! <root>/<user>/<project>/
//!     project_details.txt
//!     feature_extraction/
//!     classification/<classifier_id>/
//!     jobs/{waiting,running,done,error}/<job_id>
//! ```
//!
//! - [`ProjectPaths`]: pure path resolution
//! - [`ProjectNamespace`]: create / delete / list
//! - [`ProjectDetails`]: the `project_details.txt` record

pub mod details;
pub mod namespace;
pub mod paths;

pub use details::ProjectDetails;
pub use namespace::ProjectNamespace;
pub use paths::ProjectPaths;
