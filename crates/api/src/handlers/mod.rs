//! Request handlers.
//!
//! Handlers translate HTTP into calls on the
//! [`InspectionService`](vinspect_live::InspectionService) and map errors
//! via [`AppError`](crate::error::AppError).

pub mod inspection;
