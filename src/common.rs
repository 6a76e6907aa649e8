/// Stream sample rate (frames per second).
pub type SampleRate = u32;

/// Number of channels in a stream.
pub type ChannelCount = u16;

/// Fixed-point PCM sample exchanged between pipeline stages.
pub type Sample = i16;

/// Floating point type used by the filters for their internal arithmetic.
#[cfg(not(feature = "64bit"))]
pub type Float = f32;

/// Floating point type used by the filters for their internal arithmetic.
#[cfg(feature = "64bit")]
pub type Float = f64;

/// Checks at compile time that an error type can be moved across threads, cloned and used as a
/// `std::error::Error` source.
macro_rules! assert_error_traits {
    ($to_test:path) => {
        const _: () = { $crate::common::error_traits_hold::<$to_test>() };
    };
}
pub(crate) use assert_error_traits;

#[allow(dead_code)]
pub(crate) const fn error_traits_hold<T: Send + Sync + Clone + std::error::Error + 'static>() {}
