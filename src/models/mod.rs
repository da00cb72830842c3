pub mod alert;
pub mod audit;
pub mod checklist;
pub mod enums;
pub mod filters;
pub mod reminder;
pub mod subscription;
pub mod user;

pub use alert::*;
pub use audit::*;
pub use checklist::*;
pub use enums::*;
pub use filters::*;
pub use reminder::*;
pub use subscription::*;
pub use user::*;
