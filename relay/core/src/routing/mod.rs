//! Request Routing
//!
//! Priority-ordered fallback across configured endpoints, with quota
//! exhaustion told apart from other failures by error-text signatures.
//!
//! # Architecture
//!
//! ```text
//! +------------------+     +------------------+     +------------------+
//! |  RequestRouter   |---->|  ModelRegistry   |     |  ClientFactory   |
//! |  (route loop)    |     |  (candidates)    |     |  (per attempt)   |
//! +------------------+     +------------------+     +------------------+
//!          |                                                  |
//!          v                                                  v
//! +------------------+                              +------------------+
//! |  FallbackPolicy  |                              |  ProviderClient  |
//! |  classify_failure|                              |  (wire call)     |
//! +------------------+                              +------------------+
//! ```

mod cancel;
mod policy;
mod router;

pub use cancel::CancellationFlag;
pub use policy::{
    classify_failure, quota_signatures_for, FailureClassification, FallbackPolicy,
    ParsePolicyError, RouterConfig, OPENROUTER_QUOTA_SIGNATURES,
};
pub use router::{AttemptFailure, RequestRouter, RouteOutcome, RouterError};
