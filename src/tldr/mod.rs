pub mod article;
pub mod audit;
pub mod colors;
pub mod completion;
pub mod config;
pub mod filter;
pub mod label_store;
pub mod labels;
pub mod manual;
pub mod markup;
pub mod paths;
pub mod summary;
pub mod tags;
pub mod truncate;
pub mod util;
pub mod warn;
