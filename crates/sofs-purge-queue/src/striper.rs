//! Striped object layout arithmetic.

use crate::item::FileLayout;

/// Number of objects a file of `size` bytes occupies under `layout`.
///
/// A period is one pass across all `stripe_count` objects
/// (`object_size * stripe_count` bytes). A partial final period touches
/// fewer objects when the tail ends inside the first stripe pass.
pub fn num_objects(layout: &FileLayout, size: u64) -> u64 {
    debug_assert!(layout.validate().is_ok());
    if size == 0 {
        return 0;
    }

    let stripe_unit = u64::from(layout.stripe_unit);
    let stripe_count = u64::from(layout.stripe_count);
    let period = u64::from(layout.object_size) * stripe_count;

    let num_periods = size.div_ceil(period);
    let tail = size % period;

    // A tail shorter than one stripe pass leaves later stripes untouched.
    let mut unused_tail_objs = 0;
    if tail > 0 && tail < stripe_count * stripe_unit {
        unused_tail_objs = stripe_count - tail.div_ceil(stripe_unit);
    }

    num_periods * stripe_count - unused_tail_objs
}
