//! Browser automation: the `PageDriver` capability seam, its WebDriver
//! implementation, fingerprint-masking init scripts, and interaction
//! simulation.

pub mod behavior;
pub mod driver;
pub mod stealth;
pub mod webdriver;

pub use driver::{DriverFactory, NavigationStatus, PageDriver};
pub use webdriver::ChromeDriverFactory;
