//! Configuration module

mod site;

pub use site::ContentConfig;
pub use site::FallbackMode;
pub use site::ListingConfig;
pub use site::SiteConfig;
