pub mod rss;

pub use rss::RssTrendSource;
