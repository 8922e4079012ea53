mod proxy;
mod seen;

pub use proxy::LastGoodProxyStore;
pub use seen::{SeenStore, KEY_SCHEME};
