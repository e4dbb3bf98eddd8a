use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Steady or instantaneous power draw, in watts.
pub type Watts = Fixed64;

/// Stored energy, in joules (watt-seconds).
pub type Joules = Fixed64;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Convert an f64 to Fixed64. Use only for initialization, never in the sim loop.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

/// Convert an f64 to Fixed64, or `None` if it is not finite or falls outside
/// the Q32.32 range. Use for values read from untrusted input.
#[inline]
pub fn checked_f64_to_fixed64(v: f64) -> Option<Fixed64> {
    Fixed64::checked_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and logging.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}

/// Shorthand for building a wattage from a literal.
#[inline]
pub fn watts(v: f64) -> Watts {
    Fixed64::from_num(v)
}

/// Sum a sequence of wattages.
pub fn sum_watts(values: impl IntoIterator<Item = Watts>) -> Watts {
    values
        .into_iter()
        .fold(Fixed64::ZERO, |acc, w| acc.saturating_add(w))
}

/// Spare capacity: `capacity - load`, never below zero.
#[inline]
pub fn headroom(capacity: Watts, load: Watts) -> Watts {
    capacity.saturating_sub(load).max(Fixed64::ZERO)
}

/// Energy used by drawing `power` for `seconds`. Saturates instead of overflowing.
#[inline]
pub fn energy_for(power: Watts, seconds: Fixed64) -> Joules {
    power.checked_mul(seconds).unwrap_or(Fixed64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed64_basic_arithmetic() {
        let a = f64_to_fixed64(1.5);
        let b = f64_to_fixed64(2.0);
        assert_eq!(fixed64_to_f64(a + b), 3.5);
    }

    #[test]
    fn checked_conversion_rejects_out_of_range() {
        assert_eq!(checked_f64_to_fixed64(2.5), Some(watts(2.5)));
        assert_eq!(checked_f64_to_fixed64(3.0e9), None);
        assert_eq!(checked_f64_to_fixed64(f64::NAN), None);
        assert_eq!(checked_f64_to_fixed64(f64::INFINITY), None);
    }

    #[test]
    fn sum_watts_of_empty_is_zero() {
        assert_eq!(sum_watts(Vec::new()), Fixed64::ZERO);
    }

    #[test]
    fn sum_watts_adds_in_order() {
        assert_eq!(sum_watts([watts(10.0), watts(2.5), watts(0.5)]), watts(13.0));
    }

    #[test]
    fn headroom_clamps_at_zero() {
        assert_eq!(headroom(watts(100.0), watts(40.0)), watts(60.0));
        assert_eq!(headroom(watts(10.0), watts(40.0)), Fixed64::ZERO);
    }

    #[test]
    fn energy_for_multiplies_power_by_time() {
        assert_eq!(energy_for(watts(50.0), watts(2.0)), watts(100.0));
    }

    #[test]
    fn energy_for_saturates() {
        assert_eq!(energy_for(Fixed64::MAX, watts(2.0)), Fixed64::MAX);
    }

    #[test]
    fn fixed64_determinism() {
        let a = f64_to_fixed64(1.0 / 3.0);
        let b = f64_to_fixed64(1.0 / 3.0);
        assert_eq!(a * watts(3.0), b * watts(3.0));
    }
}
