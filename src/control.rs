//! Runtime control of a pipeline by property name.
//!
//! Every stage implements [`Source::set_property`]. A stage applies the properties it owns and
//! forwards everything else to its upstream, so a whole chain can be configured through its
//! outermost stage:
//!
//! ```
//! use sincstretch::buffer::SamplesBuffer;
//! use sincstretch::control::set_named_property;
//! use sincstretch::Source;
//!
//! let source = SamplesBuffer::new(2, 44100, vec![0i16; 44100 * 2]);
//! let mut chain = source.resample(44100).speed_change(1.0);
//!
//! set_named_property(&mut chain, "SampleRate", 48000.0)?;
//! set_named_property(&mut chain, "Rate", 1.25)?;
//! assert_eq!(chain.sample_rate(), 48000);
//! # Ok::<(), sincstretch::control::PropertyError>(())
//! ```

use std::fmt;
use std::str::FromStr;

use crate::common::{assert_error_traits, Float};
use crate::Source;

/// A runtime-adjustable pipeline parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    /// Playback speed multiplier, handled by [`SpeedChange`](crate::source::SpeedChange).
    Rate,
    /// Output sample rate in Hz, handled by [`RateConverter`](crate::source::RateConverter).
    SampleRate,
}

impl Property {
    /// The name the property is addressed by.
    pub fn name(self) -> &'static str {
        match self {
            Property::Rate => "Rate",
            Property::SampleRate => "SampleRate",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Property {
    type Err = PropertyError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "Rate" => Ok(Property::Rate),
            "SampleRate" => Ok(Property::SampleRate),
            other => Err(PropertyError::Unknown(other.to_owned())),
        }
    }
}

/// Error returned when a property can not be applied.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum PropertyError {
    /// No property with this name exists.
    #[error("Unknown property '{0}'")]
    Unknown(String),
    /// No stage in the chain handles this property.
    #[error("No stage in the pipeline handles property '{0}'")]
    Unsupported(Property),
    /// The value is outside the range the property accepts.
    #[error("Invalid value {value} for property '{property}'")]
    InvalidValue {
        /// The property being set.
        property: Property,
        /// The rejected value.
        value: Float,
    },
}
assert_error_traits!(PropertyError);

/// Parses `name` and applies `value` to the first stage of `source` that handles it.
pub fn set_named_property<S>(source: &mut S, name: &str, value: Float) -> Result<(), PropertyError>
where
    S: Source + ?Sized,
{
    let property = name.parse::<Property>()?;
    source.set_property(property, value)
}

/// Highest sample rate accepted as a property value, in Hz.
pub const MAX_SAMPLE_RATE: u32 = 768_000;

/// Validates a sample rate property value and converts it to Hz.
pub(crate) fn sample_rate_value(value: Float) -> Result<u32, PropertyError> {
    let rounded = value.round();
    if !value.is_finite() || rounded < 1.0 || rounded > MAX_SAMPLE_RATE as Float {
        return Err(PropertyError::InvalidValue {
            property: Property::SampleRate,
            value,
        });
    }
    Ok(rounded as u32)
}

/// Validates a playback speed property value.
pub(crate) fn rate_value(value: Float) -> Result<Float, PropertyError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(PropertyError::InvalidValue {
            property: Property::Rate,
            value,
        });
    }
    Ok(value)
}
