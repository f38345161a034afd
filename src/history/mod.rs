pub mod paginator;
pub mod store;

pub use paginator::{HistoryCursor, HistoryPaginator};
pub use store::{HistoryStore, PageResponse, RestClient, RoomDirectory};
