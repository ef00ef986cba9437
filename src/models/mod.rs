mod license;
mod notification;
mod order;
mod referral;

pub use license::*;
pub use notification::*;
pub use order::*;
pub use referral::*;
