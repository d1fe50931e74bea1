pub mod domain;
pub mod normalize;

pub use domain::{
    Auction, BidRecord, ContextRow, Event, EventKind, HistoryRow, Pigeon, Section, Snapshot,
    SortType,
};
</content>
