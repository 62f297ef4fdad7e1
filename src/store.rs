use crate::error::Error;
use crate::flag::Flag;
use crate::segment::Segment;

/// Store is an interface for the data store that holds flags and segments.
///
/// Flags are returned by value: the evaluator resolves segment references in place before
/// evaluating them.
pub trait Store {
    /// Retrieve the flag with key `flag_key`, or [Error::FlagNotFound].
    fn find_flag_by_key(&self, flag_key: &str) -> Result<Flag, Error>;

    /// Retrieve every flag, in the store's order.
    fn find_all_flags(&self) -> Result<Vec<Flag>, Error>;

    /// Retrieve every segment.
    fn find_all_segments(&self) -> Result<Vec<Segment>, Error>;
}
