//! Library side of the `iter8` binary: the enrichment pipeline and argument
//! parsing shared with integration tests.

pub mod enrich;
pub mod value_arg;
