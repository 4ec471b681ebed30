//! Rate limiting logic and state management.

mod credit;
mod limiter;
mod policy;
mod state;
mod window;

pub use credit::CreditAccount;
pub use limiter::RateLimiter;
pub use policy::{Policy, Strategy};
pub use state::{Admission, Decision, KeyState, Status};
pub use window::WindowCounter;
