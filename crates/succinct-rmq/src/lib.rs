#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Constant time range minimum, maximum and sum queries over static numeric sequences.
//!
//! An [`MssIndex`] is built once over a sequence and answers queries in memory. It can be
//! persisted, and later queried in place through an [`IndexReader`] which only reads the table
//! entries each query needs.

mod util;

mod error;
pub use error::{Error, Result};

pub mod scalar;

pub mod sequence;

pub mod io;

// Succinct RMQ tables and query engine
pub mod rmq;

mod index;
#[cfg(feature = "parallel")]
pub use index::ParRangeQuery;
pub use index::{Extremum, IndexOptions, MssIndex, RangeQuery};

mod codec;
pub use codec::{IndexReader, MAGIC, PagedSequence};

pub mod prelude {
    pub use super::{
        Extremum, IndexOptions, IndexReader, MssIndex, RangeQuery, io::FileReader, scalar::Scalar,
        sequence::NumericSequence,
    };

    #[cfg(feature = "parallel")]
    pub use super::ParRangeQuery;
}
