//! Macro for concise equality filters.

/// Builds a conjunction of equality filters.
///
/// # Usage
///
/// ```ignore
/// use docrepo::filter;
///
/// // Match everything
/// let all = filter!();
///
/// // Single field
/// let active = filter!(status = "active");
///
/// // Multiple fields are combined with AND
/// let lamps = filter!(kind = "lamp", in_stock = true);
/// ```
#[macro_export]
macro_rules! filter {
    () => {
        $crate::store::Filter::All
    };
    ($($name:ident = $value:expr),+ $(,)?) => {
        $crate::store::Filter::All$(.and($crate::store::Filter::eq(stringify!($name), $value)))+
    };
}
