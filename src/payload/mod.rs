//! The payload module contains the components responsible for decoding
//! the self-describing data record stream of a wM-Bus telegram.

pub mod data_encoding;
pub mod record;
pub mod vif;

pub use data_encoding::*;
pub use record::{
    data_length_for_dif, decode_records, encode_record, DataRecord, RecordFunction, RecordValue,
};
pub use vif::{lookup_primary_vif, VifInfo};
