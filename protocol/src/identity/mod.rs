//! # Identity Module
//!
//! Who can do what in the approval workflow. Every participant is an
//! [`Identity`] with exactly one of two roles: **initiators** propose
//! transactions, **signers** approve or reject them. Roles are fixed at
//! enrollment — there is no promotion path, by design, because "the person
//! who asks for money also approves it" is how audit findings get written.
//!
//! Enrollment is a two-step dance ([`enrollment`]): the service issues a
//! TOTP secret and provisioning URI, and the identity only comes into
//! existence once the applicant proves their authenticator produces valid
//! codes. Secrets that were never confirmed are never persisted.

pub mod enrollment;
pub mod types;

pub use enrollment::{begin_enrollment, confirm_enrollment, EnrollmentTicket};
pub use types::{Identity, IdentityStatus, Role};
