pub mod frame;
pub mod mqtt;

pub use frame::{decode, DecoderConfig, RawFrame, RawFrameData};
</content>
