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

//! This crate is an implementation of WUIDs - sortable, (mostly) monotonically increasing 64-bit
//! IDs in the spirit of Snowflake-style ID schemes.
//!
//! Unlike classic snowflakes, WUIDs don't embed a wall-clock timestamp. Instead, every generator
//! owns an *epoch* identified by its high bits ("H28"), obtained from an external authority (a
//! database sequence, a distributed counter, a coordination service, ...), and mints IDs by
//! incrementing a 36-bit low counter ("L36") locally. The authority is only consulted when a
//! generator approaches the end of its epoch, so a single coordination round trip is amortized
//! over billions of IDs. This makes WUIDs a good fit for services that need unique, roughly
//! time-ordered IDs at high frequency but can't afford per-ID coordination - and don't want to
//! depend on well-behaved system clocks.
//!
//! The scheme was introduced by the Go [wuid] library; this crate implements the same 64-bit
//! layout and renewal protocol.
//!
//! # The 64-bit layout
//!
//! An ID is a signed 64-bit integer:
//!
//! * bits 63-61 optionally carry a [`Section`] tag - a caller-assigned partition value in
//!   `0..=7`. Without a section, these bits participate in the high-bits region instead.
//! * the high-bits region ("H28", `0x07FF_FFFF << 36`) identifies the epoch and is refreshed by
//!   *renewal*: the generator invokes a caller-supplied H28 source and splices the fresh value
//!   into the counter.
//! * bits 35-0 ("L36") are the low counter, advanced by a configurable power-of-two [`Step`] on
//!   every call.
//!
//! Renewal is driven by two thresholds derived from the 36-bit counter range: once the low
//! counter crosses the *critical value* (80% of the epoch), the generator renews in the
//! background of the [`next`](Wuid::next) call that crossed a retry boundary; renewal failures
//! are swallowed and retried every `2^29` IDs. If the low counter ever reaches the *panic value*
//! (96% of the epoch), the generator panics rather than risk emitting colliding IDs.
//!
//! Emitted values can additionally be transformed without affecting the internal counter:
//! [`Obfuscation`] scrambles the low bits so consecutive IDs don't look sequential, and
//! [`ReservedDecimalDigits`] zeroes trailing decimal digits so callers can stamp a type tag into
//! the decimal representation of every ID.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicI64, Ordering};
//! use wuid::Wuid;
//!
//! // The H28 source hands out a fresh epoch on every renewal. In a real deployment this is
//! // backed by an external authority shared by all instances - e.g. a database sequence.
//! let epoch = AtomicI64::new(0);
//! let generator = Wuid::new("user-ids", move || {
//!     Ok((epoch.fetch_add(1, Ordering::Relaxed) + 1) << 36)
//! })
//! .unwrap();
//!
//! // The generator renews once during construction, so the first ID comes from epoch 1
//! let first = generator.next();
//! assert_eq!((1 << 36) + 1, first);
//! // Within an epoch, consecutive IDs differ by exactly the configured step
//! assert_eq!(first + 1, generator.next());
//! ```
//!
//! # Thread safety
//!
//! [`Wuid`] keeps its counter state behind a mutex and exposes `&self` methods, so a single
//! generator can be shared across threads (e.g. in an `Arc`). The lock is held across the whole
//! increment-check-renew sequence, including the H28 source invocation, so at most one renewal
//! is in flight per instance at any time. The H28 source may block (e.g. for a network round
//! trip); other calls to the same instance wait while it does. Callers that need timeouts must
//! enforce them inside the source.
//!
//! # Features
//!
//! * `serde` - `Serialize` and `Deserialize` implementations for the construction-time option
//!   types, for embedding generator configuration in service config files.
//! * `tracing` - emit `tracing` events when a generator renews its H28 value or swallows a
//!   renewal failure.
//!
//! [wuid]: https://github.com/edwingeng/wuid

#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod config;

pub use config::{Builder, Obfuscation, ReservedDecimalDigits, Section, Step};

use std::fmt::{Display, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The highest-28-bit mask selecting the renewable high-bits region of an ID.
const H28_MASK: i64 = 0x07FF_FFFF << 36;
/// The lowest-36-bit mask selecting the locally incremented counter region.
const L36_MASK: i64 = 0xF_FFFF_FFFF;
/// The lowest-60-bit mask, used to strip the section bits (and the sign bit) in `reset`.
const L60_MASK: i64 = 0x0FFF_FFFF_FFFF_FFFF;
/// The mask selecting the 3-bit section tag.
const SECTION_MASK: i64 = 7 << 60;

/// The low-counter interval at which a failed renewal is retried. Must be a power of two.
pub(crate) const RENEW_INTERVAL: i64 = 0x2000_0000;

/// The error type H28 sources may return.
///
/// Sources are free to fail with any error type; the generator wraps it in
/// [`Error::Renewal`] when propagating a construction-time renewal failure.
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub(crate) type H28Source =
    Box<dyn Fn() -> std::result::Result<i64, SourceError> + Send + Sync + 'static>;

/// The mutable counter state, guarded by the generator's mutex.
struct State {
    n: i64,
    num_renewed: i64,
}

/// A thread-safe WUID generator.
///
/// A generator owns one logical worker identity: its high bits identify the current epoch, and
/// [`next`](Self::next) increments the low counter locally until the epoch approaches
/// exhaustion, at which point the generator *renews* - it fetches a fresh high-bits value from
/// the H28 source supplied at construction. Construction performs one mandatory renewal, so the
/// source must be reachable when the generator is built.
///
/// Generators are built with [`Wuid::new`] (all options at their defaults) or through
/// [`Wuid::builder`].
///
/// # Example
///
/// The example below shares one generator between threads. Every successful renewal must return
/// high bits that differ from the previous ones, which is what the atomic counter provides.
///
/// ```
/// use std::collections::HashSet;
/// use std::sync::atomic::{AtomicI64, Ordering};
/// use std::sync::Arc;
/// use std::thread;
/// use wuid::Wuid;
///
/// let epoch = AtomicI64::new(0);
/// let generator = Arc::new(
///     Wuid::new("shared", move || {
///         Ok((epoch.fetch_add(1, Ordering::Relaxed) + 1) << 36)
///     })
///     .unwrap(),
/// );
///
/// let handles: Vec<_> = (0..2)
///     .map(|_| {
///         let generator = Arc::clone(&generator);
///         thread::spawn(move || (0..100).map(|_| generator.next()).collect::<Vec<_>>())
///     })
///     .collect();
/// let mut ids = HashSet::new();
/// for handle in handles {
///     for id in handle.join().unwrap() {
///         ids.insert(id);
///     }
/// }
/// assert_eq!(200, ids.len());
/// ```
pub struct Wuid {
    state: Mutex<State>,
    step: i64,
    scale: i64,
    obfuscation_mask: i64,
    obfuscated: bool,
    reserved: bool,
    sectioned: bool,
    renew_interval: i64,
    critical_value: i64,
    panic_value: i64,
    name: String,
    h28_source: H28Source,
}

impl Wuid {
    /// Creates a generator with all options at their defaults.
    ///
    /// This is equivalent to `Wuid::builder(name, h28_source).build()`. Refer to [`Builder`] for
    /// the available options.
    ///
    /// # Errors
    ///
    /// Construction performs one mandatory renewal using `h28_source`. If the source fails, this
    /// returns [`Error::Renewal`]; if it returns a value whose masked high bits are zero, this
    /// returns [`Error::H28MustBePositive`].
    pub fn new<F>(name: impl Into<String>, h28_source: F) -> Result<Self>
    where
        F: Fn() -> std::result::Result<i64, SourceError> + Send + Sync + 'static,
    {
        Self::builder(name, h28_source).build()
    }

    /// Creates a [`Builder`] for a generator with the given diagnostic name and H28 source.
    ///
    /// The name has no effect on generation; it identifies the generator in panic messages and
    /// `tracing` events. The source is invoked once per renewal and must return a value whose
    /// masked high bits are positive and differ from the previously accepted ones.
    pub fn builder<F>(name: impl Into<String>, h28_source: F) -> Builder
    where
        F: Fn() -> std::result::Result<i64, SourceError> + Send + Sync + 'static,
    {
        Builder::new(name.into(), h28_source)
    }

    pub(crate) fn from_builder(builder: Builder) -> Result<Self> {
        let step = builder.step.value();
        let mut n = 0_i64;
        let mut sectioned = false;
        if let Section::Value(section) = builder.section {
            if builder.reserved != ReservedDecimalDigits::None {
                return Err(Error::IncompatibleOptions);
            }
            if section > 7 {
                return Err(Error::SectionOutOfRange);
            }
            n = i64::from(section) << 60;
            sectioned = true;
        }
        let (obfuscated, obfuscation_mask) = match builder.obfuscation {
            Obfuscation::None => (false, 0),
            Obfuscation::V1 { seed } => (true, obfuscation_mask(seed, step, builder.reserved)),
        };
        let (reserved, scale) = match builder.reserved {
            ReservedDecimalDigits::None => (false, 1),
            digits => {
                let scale = digits.scale();
                if scale >= step {
                    return Err(Error::ScaleExceedsStep);
                }
                (true, scale)
            }
        };
        let renew_interval = builder.renew_interval;
        let wuid = Self {
            state: Mutex::new(State { n, num_renewed: 0 }),
            step,
            scale,
            obfuscation_mask,
            obfuscated,
            reserved,
            sectioned,
            renew_interval,
            critical_value: ((1_i64 << 36) * 80 / 100) & !(renew_interval - 1),
            panic_value: ((1_i64 << 36) * 96 / 100) & !(renew_interval - 1),
            name: builder.name,
            h28_source: builder.h28,
        };
        {
            let mut state = wuid.lock_state();
            wuid.renew(&mut state)?;
            // The first ID of an epoch must be `H28 | step`, never the bare high-bits value with
            // a zero low region
            state.n &= !L36_MASK;
        }
        Ok(wuid)
    }

    /// Generates the next ID.
    ///
    /// This advances the low counter by the configured [`Step`] and applies the configured output
    /// transforms. When the counter crosses a renewal boundary past the critical threshold, the
    /// call renews the generator's high bits synchronously; a renewal failure is swallowed - the
    /// generator keeps emitting IDs from the stale high bits and retries at the next boundary.
    ///
    /// Raw (untransformed) IDs returned by a single generator are strictly increasing.
    /// [`Obfuscation`] scrambles only the low-bits region of the emitted value, so IDs remain
    /// ordered across epochs; [`ReservedDecimalDigits`] truncation keeps IDs within an epoch
    /// distinct because the reservation scale is smaller than the step.
    ///
    /// # Panics
    ///
    /// Panics if the low counter reaches the panic threshold (96% of the epoch). This only
    /// happens after renewal has kept failing for more than 16% of the epoch's ID space - at
    /// that point the renewal source has been broken or unreachable for an extended period, and
    /// wrapping around would violate uniqueness.
    pub fn next(&self) -> i64 {
        let mut state = self.lock_state();
        state.n += self.step;
        let mut value = state.n;
        let low = value & L36_MASK;
        if low >= self.panic_value {
            panic!(
                "WUID generator {}: identifier space exhausted - too many failed attempts to renew H28",
                self.name
            );
        }
        if low >= self.critical_value && low & (self.renew_interval - 1) == 0 {
            match self.renew(&mut state) {
                Ok(()) => value = state.n,
                Err(_e) => {
                    // Swallowed: IDs keep flowing from the stale high bits, and renewal is
                    // retried at the next interval boundary until the panic margin runs out
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        generator = %self.name,
                        error = %_e,
                        "failed to renew H28, reusing stale high bits"
                    );
                }
            }
        }
        drop(state);
        if self.obfuscated {
            let scrambled = (value & H28_MASK) | ((value ^ self.obfuscation_mask) & L36_MASK);
            if self.reserved {
                return scrambled / self.scale * self.scale;
            }
            return scrambled;
        }
        if self.reserved {
            return value / self.scale * self.scale;
        }
        value
    }

    /// Resets the internal counter to the given value.
    ///
    /// This is an administrative override - e.g. for tests, or for recovery after external
    /// coordination - and is not part of normal operation. The input is masked to 60 bits, and
    /// misaligned low bits are rounded up to the next step boundary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::H28MustBePositive`] if the masked high bits of the input are zero, and
    /// [`Error::NegativeValue`] if the masked result is negative.
    ///
    /// # Panics
    ///
    /// Panics if the low-counter portion of the input lies at or beyond the panic threshold, as
    /// resuming from there could emit colliding IDs.
    pub fn reset(&self, to: i64) -> Result<()> {
        let mut state = self.lock_state();
        let mut n = to & L60_MASK;
        if n & H28_MASK == 0 {
            return Err(Error::H28MustBePositive);
        }
        if n < 0 {
            return Err(Error::NegativeValue);
        }
        if n & L36_MASK >= self.panic_value {
            panic!(
                "WUID generator {}: reset target lies at or beyond the panic threshold",
                self.name
            );
        }
        if self.reserved {
            n |= state.n & SECTION_MASK;
        }
        if n & (self.step - 1) != 0 {
            n = (n & !(self.step - 1)) + self.step;
        }
        state.n = n;
        Ok(())
    }

    /// Overwrites the high-bits region of the internal counter with the given value.
    ///
    /// Unlike a renewal, this bypasses the positivity and change checks of the renewal protocol.
    /// It's intended for test harnesses that need to place a generator in a specific epoch, not
    /// for normal operation - use [`reset`](Self::reset) or let the generator renew itself
    /// instead.
    pub fn load_h28(&self, h28: i64) {
        let mut state = self.lock_state();
        state.n = (state.n & L36_MASK) | (h28 & H28_MASK);
    }

    /// Returns the number of successful renewals this generator has performed.
    ///
    /// The count includes the mandatory renewal during construction, so it's at least 1. This is
    /// a diagnostic value with no effect on generation.
    pub fn renew_count(&self) -> i64 {
        self.lock_state().num_renewed
    }

    /// Returns the diagnostic name of this generator.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetches a fresh H28 value from the source and splices it into the counter.
    ///
    /// In section mode, both the stored and the candidate high bits are additionally masked to 60
    /// bits so the section tag never corrupts the comparison.
    fn renew(&self, state: &mut State) -> Result<()> {
        let (existing, candidate) = if self.sectioned {
            (
                state.n & H28_MASK & L60_MASK,
                (self.h28_source)().map_err(Error::Renewal)? & H28_MASK & L60_MASK,
            )
        } else {
            (
                state.n & H28_MASK,
                (self.h28_source)().map_err(Error::Renewal)? & H28_MASK,
            )
        };
        if candidate <= 0 {
            return Err(Error::H28MustBePositive);
        }
        if candidate == existing {
            return Err(Error::H28Unchanged);
        }
        state.n = if self.sectioned {
            (state.n & SECTION_MASK) | candidate | self.step
        } else {
            candidate | self.step
        };
        state.num_renewed += 1;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            generator = %self.name,
            num_renewed = state.num_renewed,
            "renewed H28"
        );
        Ok(())
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        // The only panic possible while the lock is held is the exhaustion panic. Subsequent
        // calls must keep hitting that panic, not a poisoned-lock error masking it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Wuid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // The H28 source is an opaque callback, so we skip it here
        f.debug_struct("Wuid")
            .field("name", &self.name)
            .field("step", &self.step)
            .field("scale", &self.scale)
            .field("obfuscated", &self.obfuscated)
            .field("sectioned", &self.sectioned)
            .finish_non_exhaustive()
    }
}

/// Derives the 63-bit scramble mask from an obfuscation seed.
///
/// Without decimal-digit reservation, the mask's low bits are forced to all-ones across the step
/// alignment, so scrambling never perturbs the step-aligned low bits of emitted IDs.
fn obfuscation_mask(seed: u64, step: i64, reserved: ReservedDecimalDigits) -> i64 {
    let mut x = seed;
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x = (x ^ (x >> 31)) & 0x7FFF_FFFF_FFFF_FFFF;
    if reserved == ReservedDecimalDigits::None {
        x |= (step - 1) as u64;
    }
    x as i64
}

/// Errors that can occur when constructing, renewing, or resetting a [`Wuid`] generator.
///
/// Exhaustion of the identifier space is deliberately *not* an error: it panics instead, as
/// silently continuing (or letting callers ignore a result) would risk emitting colliding IDs.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// An error that occurs when combining decimal-digit reservation with a section tag.
    ///
    /// The two output transforms are mutually exclusive: a section occupies the top bits that
    /// digit reservation assumes participate in the plain numeric value.
    IncompatibleOptions,
    /// An error that occurs if a [`Section`] value lies outside `0..=7`.
    SectionOutOfRange,
    /// An error that occurs if the reservation scale is not smaller than the configured step.
    ///
    /// With `10^digits >= step`, truncating the reserved digits would collapse consecutive IDs
    /// onto the same value.
    ScaleExceedsStep,
    /// An error that occurs if a (renewed or reset) H28 value has no positive high bits after
    /// masking.
    ///
    /// A zero H28 would make the generator emit bare low-counter values, including 0.
    H28MustBePositive,
    /// An error that occurs if a renewal returns the high bits that are already in use.
    ///
    /// The renewal source must advance on every call; handing out the same value again indicates
    /// a stale or broken authority, and accepting it would restart the epoch's low counter.
    H28Unchanged,
    /// An error that occurs when attempting to reset a generator to a negative value.
    NegativeValue,
    /// A failure propagated from the H28 source.
    ///
    /// During construction, this aborts the build. During [`Wuid::next`], source failures are
    /// swallowed and retried instead, so this variant never surfaces from the hot path.
    Renewal(SourceError),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IncompatibleOptions => {
                write!(f, "decimal-digit reservation can't be combined with a section tag")
            }
            Error::SectionOutOfRange => {
                write!(f, "the section value must be in 0..=7")
            }
            Error::ScaleExceedsStep => {
                write!(f, "the reservation scale must be smaller than the configured step")
            }
            Error::H28MustBePositive => {
                write!(f, "the H28 value must be positive and non-zero")
            }
            Error::H28Unchanged => {
                write!(f, "the renewed H28 value must differ from the current one")
            }
            Error::NegativeValue => {
                write!(f, "can't reset the generator to a negative value")
            }
            Error::Renewal(source) => {
                write!(f, "the H28 source failed: {source}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Renewal(source) => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// The primary result type of this crate.
pub type Result<T> = std::result::Result<T, Error>;

// End skip coverage
