pub use internal::*;

#[cfg(target_arch = "wasm32")]
mod internal {
    pub fn par_iter_mut1<T1: Send + Sync, F: Fn(usize, &mut T1) + Send + Sync>(arr1: &mut [T1], f: F) {
        arr1.into_iter().enumerate().for_each(|(idx, v1)| {
            f(idx, v1);
        });
    }

    pub fn par_chunks_mut1<T1: Send + Sync, F: Fn(usize, &mut [T1]) + Send + Sync>(
        arr1: &mut [T1],
        chunk_size: usize,
        f: F,
    ) {
        arr1.chunks_mut(chunk_size).enumerate().for_each(|(idx, chunk)| {
            f(idx, chunk);
        });
    }

    pub fn par_sort_unstable<T: Ord + Send>(v: &mut [T]) {
        v.sort_unstable();
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod internal {
    use rayon::prelude::*;

    pub fn par_iter_mut1<T1: Send + Sync, F: Fn(usize, &mut T1) + Send + Sync>(arr1: &mut [T1], f: F) {
        arr1.into_par_iter().enumerate().for_each(|(idx, v1)| {
            f(idx, v1);
        });
    }

    /// Every chunk is handed to exactly one task, so `f` may write the whole chunk without synchronization.
    pub fn par_chunks_mut1<T1: Send + Sync, F: Fn(usize, &mut [T1]) + Send + Sync>(
        arr1: &mut [T1],
        chunk_size: usize,
        f: F,
    ) {
        arr1.par_chunks_mut(chunk_size).enumerate().for_each(|(idx, chunk)| {
            f(idx, chunk);
        });
    }

    pub fn par_sort_unstable<T: Ord + Send>(v: &mut [T]) {
        v.par_sort_unstable();
    }
}
