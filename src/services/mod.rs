pub mod availability;
pub mod booking;
pub mod notifications;
pub mod pricing;
