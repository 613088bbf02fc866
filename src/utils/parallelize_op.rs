/// `parallelize_op!` macro for repeating an operation across
/// chunks of a 3d array along its slow (z) axis.
///
/// - `parallelize_op!(array, chunk_size, op)`
///
///     Divides `array` into chunks of `chunk_size` z-planes and
///     calls `op(z_start, &mut chunk)` on each chunk in parallel,
///     where `z_start` is the index of the first plane of the chunk
///     in the full array.
///
///     <br>
///
/// - `parallelize_op!((array, other), chunk_size, op)`
///
///     Zips the chunks of two arrays of the same shape so that
///     `op(z_start, &mut chunk, &other_chunk)` sees corresponding planes.
///     The second array is only read.
///
///    _Warning! Behavior is not well-defined if the arrays do not have
///    the same shape!!_
macro_rules! parallelize_op {

    (   $array : expr,
        $chunk_size : expr,
        $op : expr
    ) => {{
        let chunk_size = ($chunk_size).max(1);
        // Create an array of chunks to parallelize
        let array_chunks : Vec<_> = $array
            .axis_chunks_iter_mut(ndarray::Axis(0), chunk_size)
            .collect();

        array_chunks.into_par_iter().enumerate().for_each(
            |(chunk_idx, mut chunk)| {
                let z_start = chunk_idx * chunk_size;
                $op(z_start, &mut chunk)
            }
        );
    }};

    (   ( $array : expr, $other : expr ),
        $chunk_size : expr,
        $op : expr
    ) => {{
        let chunk_size = ($chunk_size).max(1);
        let array_chunks = itertools::izip!(
            $array.axis_chunks_iter_mut(ndarray::Axis(0), chunk_size),
            $other.axis_chunks_iter(ndarray::Axis(0), chunk_size)
        ).collect::<Vec<_>>();

        array_chunks.into_par_iter().enumerate().for_each(
            |(chunk_idx, (mut chunk, other_chunk))| {
                let z_start = chunk_idx * chunk_size;
                $op(z_start, &mut chunk, &other_chunk)
            }
        );
    }};
}

/// `parallelize_reduce!(array, chunk_size, identity, fold, combine)`
///
/// Read-only counterpart to `parallelize_op!`: every chunk of z-planes
/// is folded into an accumulator starting from `identity`, and the
/// per-chunk accumulators are merged with `combine`. `combine` must be
/// associative (min/max, sums).
macro_rules! parallelize_reduce {
    (   $array : expr,
        $chunk_size : expr,
        $identity : expr,
        $fold : expr,
        $combine : expr
    ) => {{
        let chunk_size = ($chunk_size).max(1);
        let array_chunks : Vec<_> = $array
            .axis_chunks_iter(ndarray::Axis(0), chunk_size)
            .collect();

        array_chunks.into_par_iter().enumerate()
            .map(|(chunk_idx, chunk)| $fold(chunk_idx * chunk_size, &chunk))
            .reduce(|| $identity, $combine)
    }};
}

pub (crate) use parallelize_op;
pub (crate) use parallelize_reduce;
