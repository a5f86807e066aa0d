mod claims;
mod extractors;

pub use extractors::AdminUser;
