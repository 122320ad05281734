pub mod audit;
pub mod catalog;
pub mod config;
pub mod giftcodes;
pub mod paths;
pub mod reconcile;
pub mod search;
pub mod sheet;
pub mod sitemap;
pub mod store;
pub mod util;
pub mod warn;
