pub mod descriptors;
pub mod pipeline;

pub use descriptors::{
    annotate_counts, AUCTION_DESCRIPTOR, BID_RECORD_DESCRIPTOR, PIGEON_DESCRIPTOR,
    SECTION_DESCRIPTOR,
};
pub use pipeline::{build_batch, build_record, BuildError, RecordDescriptor, Strictness};
