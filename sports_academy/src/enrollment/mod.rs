//! Enrollment and withdrawal.
//!
//! Enrolling charges the tournament's entry cost; withdrawing refunds a
//! configured share of it. Each is one unit of work taken under the
//! tournament and license locks, so a license can never hold two active
//! enrollments in the same tournament or be charged twice.

pub mod manager;
pub mod models;

pub use manager::EnrollmentManager;
pub use models::{
    Enrollment, EnrollmentId, EnrollmentPolicy, NewEnrollment, Withdrawal, WithdrawalCutoff,
};
