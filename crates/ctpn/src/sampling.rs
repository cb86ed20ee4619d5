use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;

/// Draw `amount` distinct positions out of `0..population`, uniformly at random.
///
/// When `amount` covers the whole population every position is kept and no randomness is used.
/// The result is sorted, so the relative order of the candidates is preserved.
pub fn sample_without_replacement<R>(rng: &mut R, population: usize, amount: usize) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    if amount >= population {
        return (0..population).collect();
    }

    let mut picked = index::sample(rng, population, amount).into_vec();
    picked.sort_unstable();
    picked
}

/// Keep at most `amount` items of `candidates`, chosen uniformly at random.
pub fn subsample<T, R>(rng: &mut R, candidates: &[T], amount: usize) -> Vec<T>
where
    T: Copy,
    R: Rng + ?Sized,
{
    sample_without_replacement(rng, candidates.len(), amount)
        .into_iter()
        .map(|i| candidates[i])
        .collect()
}

/// Independent random source for image `image_index` of a batch.
///
/// The stream only depends on the batch seed and the position of the image, so the batch can be
/// processed in any order, or in parallel, with the same result. The batch seed and the image
/// index fill separate words of the generator seed, so no two pairs of them share a stream.
///
/// A fixed batch seed draws the same samples for an image position in every batch. Vary the seed
/// per batch or per epoch when that is not wanted.
#[must_use]
pub fn image_rng(batch_seed: u64, image_index: usize) -> StdRng {
    let mut seed = [0_u8; 32];
    seed[..8].copy_from_slice(&batch_seed.to_le_bytes());
    seed[8..16].copy_from_slice(&(image_index as u64).to_le_bytes());

    StdRng::from_seed(seed)
}
