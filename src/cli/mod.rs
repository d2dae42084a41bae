pub mod composition;
pub mod portfolio;
pub mod search;
pub mod ui;
