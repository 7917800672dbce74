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

//! Behavioral tests for the public generator surface.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use wuid::{Error, Obfuscation, ReservedDecimalDigits, Section, Step, Wuid};

const L36_MASK: i64 = 0xF_FFFF_FFFF;

fn simple(step: Step) -> Wuid {
    Wuid::builder("test", || Ok(1 << 36))
        .step(step)
        .build()
        .unwrap()
}

#[test]
fn first_id_is_never_the_bare_epoch_value() {
    let generator = Wuid::new("first value", || Ok(1 << 36)).unwrap();
    let first = generator.next();
    assert_ne!(0, first & L36_MASK, "no ID should end its epoch at offset 0");
    assert_eq!((1 << 36) + 1, first);
}

#[test]
fn ids_increase_by_the_configured_step() {
    let steps = [
        Step::By1,
        Step::By2,
        Step::By4,
        Step::By8,
        Step::By16,
        Step::By32,
        Step::By64,
        Step::By128,
        Step::By256,
        Step::By512,
        Step::By1024,
    ];
    for step in steps {
        let generator = simple(step);
        assert_eq!((1 << 36) + step.value(), generator.next());
        assert_eq!((1 << 36) + 2 * step.value(), generator.next());
    }
}

#[test]
fn reset_then_next_yields_the_next_step() {
    let generator = Wuid::new("reset then next", || Ok(1 << 36)).unwrap();
    generator.reset(0x377 << 36).unwrap();
    assert_eq!((0x377 << 36) + 1, generator.next());
}

#[test]
fn reset_resumes_a_full_sequence() {
    for epoch in 1..=100_i64 {
        let generator = Wuid::new("alpha", || Ok(1 << 36)).unwrap();
        generator.reset(epoch << 36).unwrap();
        let mut expected = epoch << 36;
        for _ in 0..100 {
            expected += 1;
            assert_eq!(expected, generator.next());
        }
    }
}

#[test]
fn reset_with_zero_high_bits_fails() {
    let generator = Wuid::new("reset zero", || Ok(1 << 36)).unwrap();
    let result = generator.reset(77);
    assert!(matches!(result, Err(Error::H28MustBePositive)));
}

#[test]
fn reset_rounds_misaligned_values_up_to_the_step() {
    let generator = simple(Step::By16);
    generator.reset((1 << 36) + 5).unwrap();
    // 5 is rounded up to 16, so the next ID continues from there
    assert_eq!((1 << 36) + 32, generator.next());
}

#[test]
fn reserved_digits_zero_the_decimal_suffix() {
    let generator = Wuid::builder("one reserved digit", || Ok(1 << 36))
        .step(Step::By16)
        .reserved_decimal_digits(ReservedDecimalDigits::One)
        .build()
        .unwrap();
    assert_eq!(68_719_476_750, generator.next());
    assert_eq!(68_719_476_760, generator.next());

    let generator = Wuid::builder("three reserved digits", || Ok(1 << 36))
        .step(Step::By1024)
        .reserved_decimal_digits(ReservedDecimalDigits::Three)
        .build()
        .unwrap();
    assert_eq!(68_719_477_000, generator.next());
    assert_eq!(68_719_478_000, generator.next());
    assert_eq!(68_719_479_000, generator.next());
}

#[test]
fn reserved_digits_always_end_in_zeros() {
    let generator = Wuid::builder("two reserved digits", || Ok(1 << 36))
        .step(Step::By1024)
        .reserved_decimal_digits(ReservedDecimalDigits::Two)
        .build()
        .unwrap();
    for _ in 0..1000 {
        assert_eq!(0, generator.next() % 100);
    }
}

#[test]
fn obfuscated_ids_match_the_reference_values() {
    // Reference values produced by the Go wuid library with
    // WithObfuscation(0x1234567890ABCDEF) and an H28 source returning 1 << 36
    let generator = Wuid::builder("obfuscated", || Ok(1 << 36))
        .obfuscation(Obfuscation::V1 {
            seed: 0x1234_5678_90AB_CDEF,
        })
        .build()
        .unwrap();
    assert_eq!(0x12_e5ae_fe5d, generator.next());
    assert_eq!(0x12_e5ae_fe5e, generator.next());
}

#[test]
fn obfuscated_ids_with_reserved_digits_match_the_reference_values() {
    let generator = Wuid::builder("obfuscated", || Ok(1 << 36))
        .step(Step::By1024)
        .reserved_decimal_digits(ReservedDecimalDigits::Three)
        .obfuscation(Obfuscation::V1 {
            seed: 0x1234_5678_90AB_CDEF,
        })
        .build()
        .unwrap();
    assert_eq!(81_162_861_000, generator.next());
    assert_eq!(81_162_860_000, generator.next());
    assert_eq!(81_162_859_000, generator.next());
}

#[test]
fn obfuscation_never_touches_the_high_bits() {
    for seed in [1_u64, 42, 0xFFFF_FFFF_FFFF_FFFF, 0x1234_5678_90AB_CDEF] {
        let generator = Wuid::builder("high bits", || Ok(1 << 36))
            .obfuscation(Obfuscation::V1 { seed })
            .build()
            .unwrap();
        let raw_low = 1_i64; // the first raw ID of the epoch is (1 << 36) + 1
        let id = generator.next();
        assert_eq!(1, id >> 36, "the high bits must be the true high bits");
        assert_ne!(
            raw_low,
            id & L36_MASK,
            "the low bits must be scrambled for a non-trivial mask"
        );
    }
}

#[test]
fn section_occupies_the_top_three_bits() {
    for section in 0..=7_u8 {
        let generator = Wuid::builder("with section", || Ok(1 << 36))
            .section(Section::Value(section))
            .build()
            .unwrap();
        let expected = i64::from(section) << 60;
        assert_eq!(expected | (1 << 36) | 1, generator.next());
        assert_eq!(expected | (1 << 36) | 2, generator.next());
    }
}

#[test]
fn section_and_reserved_digits_are_mutually_exclusive() {
    let result = Wuid::builder("invalid configuration", || Ok(1 << 36))
        .step(Step::By1024)
        .reserved_decimal_digits(ReservedDecimalDigits::Two)
        .section(Section::Value(5))
        .build();
    assert!(matches!(result, Err(Error::IncompatibleOptions)));
}

#[test]
fn section_values_above_seven_are_rejected() {
    let result = Wuid::builder("invalid configuration", || Ok(1 << 36))
        .section(Section::Value(22))
        .build();
    assert!(matches!(result, Err(Error::SectionOutOfRange)));
}

#[test]
fn the_reservation_scale_must_be_smaller_than_the_step() {
    // 10^1 = 10 >= 1
    let result = Wuid::builder("invalid configuration", || Ok(1 << 36))
        .reserved_decimal_digits(ReservedDecimalDigits::One)
        .build();
    assert!(matches!(result, Err(Error::ScaleExceedsStep)));

    // 10^2 = 100 >= 16
    let result = Wuid::builder("invalid configuration", || Ok(1 << 36))
        .step(Step::By16)
        .reserved_decimal_digits(ReservedDecimalDigits::Two)
        .build();
    assert!(matches!(result, Err(Error::ScaleExceedsStep)));

    // 10^1 = 10 < 16 is fine
    assert!(Wuid::builder("valid configuration", || Ok(1 << 36))
        .step(Step::By16)
        .reserved_decimal_digits(ReservedDecimalDigits::One)
        .build()
        .is_ok());
}

#[test]
fn sources_without_positive_high_bits_fail_construction() {
    // A zero value has no high bits at all
    let result = Wuid::new("zero source", || Ok(0));
    assert!(matches!(result, Err(Error::H28MustBePositive)));
    // A value with only low bits set masks to zero high bits
    let result = Wuid::new("low bits only", || Ok(123));
    assert!(matches!(result, Err(Error::H28MustBePositive)));
}

#[test]
fn construction_renews_exactly_once() {
    let generator = Wuid::new("renew count", || Ok(1 << 36)).unwrap();
    assert_eq!(1, generator.renew_count());
    let _ = generator.next();
    assert_eq!(1, generator.renew_count());
}

#[test]
fn load_h28_overrides_the_epoch() {
    let generator = Wuid::new("load h28", || Ok(1 << 36)).unwrap();
    let _ = generator.next();
    generator.load_h28(7 << 36);
    // The low counter is left untouched, so the next ID continues from offset 2
    assert_eq!((7 << 36) + 2, generator.next());
}

#[test]
fn concurrent_ids_are_unique() {
    let generator = Arc::new(Wuid::new("concurrent", || Ok(1 << 36)).unwrap());
    let threads: Vec<_> = (0..4)
        .map(|_| {
            let generator = Arc::clone(&generator);
            thread::spawn(move || (0..10_000).map(|_| generator.next()).collect::<Vec<_>>())
        })
        .collect();
    let mut ids = HashSet::with_capacity(40_000);
    for thread in threads {
        let mut previous = 0;
        for id in thread.join().unwrap() {
            // IDs handed to a single thread are strictly increasing
            assert!(id > previous);
            previous = id;
            ids.insert(id);
        }
    }
    assert_eq!(40_000, ids.len());
}
