pub mod i18n;
pub mod page;
pub mod render;
pub mod results;
pub mod search;
pub mod storage;
pub mod tasks;
pub mod ui;
