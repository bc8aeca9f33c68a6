use std::{borrow::Cow, sync::Arc};

/// A work item that can be told apart from other work items by a string key.
///
/// Two values with the same identity are the same logical item for the
/// queue, whatever else they carry. The identity has to stay the same for as
/// long as the value lives inside (or is being processed out of) a queue.
///
/// # Examples
///
/// ```rust
/// use std::borrow::Cow;
///
/// use dedup_queue::Identified;
///
/// struct Resize {
///     image: String,
///     width: u32,
/// }
///
/// impl Identified for Resize {
///     fn identity(&self) -> Cow<'_, str> {
///         Cow::Borrowed(&self.image)
///     }
/// }
///
/// let small = Resize { image: "cat.png".into(), width: 64 };
/// let large = Resize { image: "cat.png".into(), width: 1024 };
/// assert_eq!(small.identity(), large.identity());
/// ```
pub trait Identified {
    /// Returns the key used for deduplication.
    fn identity(&self) -> Cow<'_, str>;
}

impl Identified for String {
    fn identity(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Identified for &str {
    fn identity(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Identified for Cow<'_, str> {
    fn identity(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

impl Identified for Arc<str> {
    fn identity(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }
}

macro_rules! identified_by_display {
    ($($int:ty),*) => {
        $(
            impl Identified for $int {
                fn identity(&self) -> Cow<'_, str> {
                    Cow::Owned(self.to_string())
                }
            }
        )*
    };
}

identified_by_display!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_use_decimal_identity() {
        assert_eq!(42_u32.identity(), "42");
        assert_eq!((-7_i64).identity(), "-7");
    }

    #[test]
    fn string_like_values_share_identity() {
        let owned = String::from("job");
        let shared: Arc<str> = Arc::from("job");
        assert_eq!(owned.identity(), "job".identity());
        assert_eq!(shared.identity(), owned.identity());
    }
}
