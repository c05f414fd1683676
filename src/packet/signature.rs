mod config;
mod de;
mod ser;
mod subpacket;
mod types;

pub use self::config::*;
pub use self::subpacket::*;
pub use self::types::*;
