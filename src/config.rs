/*
 * Copyright © 2026 The wuid authors
 * Licensed under the Apache License, Version 2.0 (the "Licence");
 * you may not use this file except in compliance with the Licence.
 * You may obtain a copy of the Licence at
 *     https://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the Licence is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the Licence for the specific language governing permissions and
 * limitations under the Licence.
 */

//! Construction-time options for [`Wuid`] generators and the builder that assembles them.

use crate::{H28Source, Result, SourceError, Wuid, RENEW_INTERVAL};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};

/// The amount every call to [`Wuid::next`] advances the internal low counter by.
///
/// Steps are restricted to powers of two between 1 and 1024. This keeps the step-alignment
/// arithmetic used by the renewal state machine (and the obfuscation mask derivation) a simple
/// bitwise operation, and it bounds how quickly a generator can burn through the 36-bit low
/// counter of an epoch.
///
/// Larger steps leave a gap between consecutive IDs that callers can use for their own purposes -
/// most notably for [decimal-digit reservation](ReservedDecimalDigits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Step {
    /// Advance the counter by 1 (the default).
    #[default]
    By1 = 1,
    /// Advance the counter by 2.
    By2 = 2,
    /// Advance the counter by 4.
    By4 = 4,
    /// Advance the counter by 8.
    By8 = 8,
    /// Advance the counter by 16.
    By16 = 16,
    /// Advance the counter by 32.
    By32 = 32,
    /// Advance the counter by 64.
    By64 = 64,
    /// Advance the counter by 128.
    By128 = 128,
    /// Advance the counter by 256.
    By256 = 256,
    /// Advance the counter by 512.
    By512 = 512,
    /// Advance the counter by 1024.
    By1024 = 1024,
}

impl Step {
    /// Returns the step as the signed integer added to the counter.
    #[inline]
    pub fn value(self) -> i64 {
        self as i64
    }
}

/// The number of trailing decimal digits of every emitted ID that are forced to zero.
///
/// Reserving decimal digits lets callers stamp a small type tag into the *decimal representation*
/// of an ID after the fact. For example, with [`Step::By1024`] and three reserved digits, the
/// generator emits values like `68719477000`; a caller tracking an object class `169` can add that
/// tag to the result and hand out `68719477169`, making the class recognizable at a glance.
///
/// The reservation scale (`10^digits`) must be strictly smaller than the configured [`Step`], as
/// the generator would otherwise truncate consecutive IDs onto each other. Reserved digits can't
/// be combined with a [`Section`] tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum ReservedDecimalDigits {
    /// Emit IDs unmodified (the default).
    #[default]
    None = 0,
    /// Zero the last decimal digit of every ID.
    One = 1,
    /// Zero the last two decimal digits of every ID.
    Two = 2,
    /// Zero the last three decimal digits of every ID.
    Three = 3,
}

impl ReservedDecimalDigits {
    /// Returns the reservation scale, i.e. `10^digits`.
    #[inline]
    pub(crate) fn scale(self) -> i64 {
        10_i64.pow(self as u32)
    }
}

/// The obfuscation applied to the low bits of emitted IDs.
///
/// With obfuscation enabled, the low 36 bits of every emitted value are XORed with a mask derived
/// from the configured seed, so consecutive IDs don't look sequential to external observers. The
/// high bits of the *returned* value always remain the true high bits, preserving the rough time
/// ordering of IDs across epochs. Internally, the counter keeps incrementing normally; only the
/// emitted representation is scrambled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Obfuscation {
    /// Emit IDs unmodified (the default).
    #[default]
    None,
    /// Scramble the low bits with a mask derived from the given seed.
    ///
    /// The mask derivation is a fixed three-round multiply-xor-shift avalanche, so the same seed
    /// always yields the same mask. Deployments that rely on obfuscation should treat the seed
    /// like a (weak) secret.
    V1 {
        /// The seed the scramble mask is derived from.
        seed: u64,
    },
}

/// An optional logical-partition tag stored in the top three bits of every emitted ID.
///
/// Sections let a deployment split its ID space into up to eight partitions (e.g. shards or
/// datacenters) that remain distinguishable - and sort separately - by their top bits. A section
/// can't be combined with [`ReservedDecimalDigits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Section {
    /// Don't tag IDs with a section (the default).
    #[default]
    None,
    /// Tag every ID with the given section value. Must be in `0..=7`.
    Value(u8),
}

/// A builder assembling a [`Wuid`] generator.
///
/// Builders are created with [`Wuid::builder`]. All options default to "off" ([`Step::By1`], no
/// reserved digits, no obfuscation, no section), matching the plain WUID scheme. [`build`] checks
/// the option combination and performs the generator's mandatory initial renewal, so a
/// successfully built generator is immediately ready to mint IDs.
///
/// # Example
///
/// ```
/// use wuid::{Obfuscation, Step, Wuid};
///
/// let generator = Wuid::builder("events", || Ok(1 << 36))
///     .step(Step::By4)
///     .obfuscation(Obfuscation::V1 { seed: 0xD1CE })
///     .build()
///     .unwrap();
/// let id = generator.next();
/// // The high bits of emitted IDs are never scrambled
/// assert_eq!(1, id >> 36);
/// ```
///
/// [`build`]: Self::build
#[must_use = "a builder doesn't generate IDs until it's built"]
pub struct Builder {
    pub(crate) name: String,
    pub(crate) step: Step,
    pub(crate) reserved: ReservedDecimalDigits,
    pub(crate) obfuscation: Obfuscation,
    pub(crate) section: Section,
    pub(crate) renew_interval: i64,
    pub(crate) h28: H28Source,
}

impl Builder {
    pub(crate) fn new<F>(name: String, h28: F) -> Self
    where
        F: Fn() -> std::result::Result<i64, SourceError> + Send + Sync + 'static,
    {
        Self {
            name,
            step: Step::default(),
            reserved: ReservedDecimalDigits::default(),
            obfuscation: Obfuscation::default(),
            section: Section::default(),
            renew_interval: RENEW_INTERVAL,
            h28: Box::new(h28),
        }
    }

    /// Sets the amount every [`Wuid::next`] call advances the low counter by.
    pub fn step(mut self, step: Step) -> Self {
        self.step = step;
        self
    }

    /// Sets the number of trailing decimal digits zeroed in every emitted ID.
    ///
    /// The resulting reservation scale must be smaller than the configured [`Step`], and reserved
    /// digits can't be combined with a [`Section`]; [`build`](Self::build) fails with
    /// [`Error::ScaleExceedsStep`](crate::Error::ScaleExceedsStep) or
    /// [`Error::IncompatibleOptions`](crate::Error::IncompatibleOptions) otherwise.
    pub fn reserved_decimal_digits(mut self, reserved: ReservedDecimalDigits) -> Self {
        self.reserved = reserved;
        self
    }

    /// Sets the obfuscation applied to the low bits of emitted IDs.
    pub fn obfuscation(mut self, obfuscation: Obfuscation) -> Self {
        self.obfuscation = obfuscation;
        self
    }

    /// Sets the section tag stored in the top three bits of every emitted ID.
    ///
    /// [`build`](Self::build) fails with
    /// [`Error::SectionOutOfRange`](crate::Error::SectionOutOfRange) for values outside `0..=7`.
    pub fn section(mut self, section: Section) -> Self {
        self.section = section;
        self
    }

    /// Overrides the renewal retry interval.
    ///
    /// This is a test-only injection point that keeps the threshold state machine testable
    /// without minting billions of IDs. The interval must be a power of two.
    #[cfg(test)]
    pub(crate) fn renew_interval(mut self, interval: i64) -> Self {
        debug_assert!(interval.count_ones() == 1);
        self.renew_interval = interval;
        self
    }

    /// Validates the configured options and builds the generator.
    ///
    /// This performs the generator's mandatory initial renewal by invoking the H28 source once.
    /// Apart from the configuration errors listed on the individual options, this propagates any
    /// renewal failure: a source error is returned as
    /// [`Error::Renewal`](crate::Error::Renewal), and sources returning non-positive high bits
    /// fail with [`Error::H28MustBePositive`](crate::Error::H28MustBePositive).
    pub fn build(self) -> Result<Wuid> {
        Wuid::from_builder(self)
    }
}

impl Debug for Builder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // The H28 source is an opaque callback, so we skip it here
        f.debug_struct("Builder")
            .field("name", &self.name)
            .field("step", &self.step)
            .field("reserved", &self.reserved)
            .field("obfuscation", &self.obfuscation)
            .field("section", &self.section)
            .field("renew_interval", &self.renew_interval)
            .finish_non_exhaustive()
    }
}
