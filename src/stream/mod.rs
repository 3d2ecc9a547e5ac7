//! Stream combinators for UI-facing subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
