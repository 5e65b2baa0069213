use std::collections::{BTreeMap, BTreeSet};
use core::marker::PhantomData;

use crypto::{Digest, Hasher, DIGEST_BYTES};

// PACKAGE SIZING
// ================================================================================================

/// Computes the number of elements per package: the smallest power of two such that a package
/// is at least `size_of_package` bytes, clamped to `max_n_elements`.
pub(crate) fn compute_n_elements_in_package(
    size_of_element: usize,
    size_of_package: usize,
    max_n_elements: u64,
) -> usize {
    assert!(size_of_element > 0, "an element must be at least one byte long");
    if size_of_element >= size_of_package {
        return 1;
    }
    let elements_fit_in_package = (size_of_package - 1) / size_of_element + 1;
    elements_fit_in_package.next_power_of_two().min(max_n_elements as usize)
}

// PACKER/HASHER
// ================================================================================================

/// Groups a flat sequence of fixed-size elements into equal packages and hashes each package
/// down to one digest, producing the leaf layer of the digest tree.
pub struct PackerHasher<H: Hasher> {
    pub size_of_element: usize,
    pub n_elements_in_package: usize,
    pub n_packages: u64,
    _hasher: PhantomData<H>,
}

impl<H: Hasher> PackerHasher<H> {
    /// Returns a packer for `n_elements` elements of `size_of_element` bytes each. Packages are
    /// sized so that they are at least two digests wide.
    pub fn new(size_of_element: usize, n_elements: u64) -> Self {
        assert!(
            n_elements.is_power_of_two(),
            "can only handle a total number of elements that is a power of two"
        );
        let n_elements_in_package =
            compute_n_elements_in_package(size_of_element, 2 * DIGEST_BYTES, n_elements);
        assert!(
            n_elements_in_package.is_power_of_two(),
            "can only pack a number of elements that is a power of two"
        );
        PackerHasher {
            size_of_element,
            n_elements_in_package,
            n_packages: n_elements / n_elements_in_package as u64,
            _hasher: PhantomData,
        }
    }

    /// Partitions `data` into packages and hashes each one, returning the concatenated digests.
    ///
    /// In merkle mode the data is interpreted as pairs of digests and each package is hashed
    /// two-to-one; otherwise each package's bytes are hashed as a stream.
    pub fn pack_and_hash(&self, data: &[u8], is_merkle_layer: bool) -> Vec<u8> {
        if data.is_empty() {
            return vec![];
        }
        assert!(data.len() % self.size_of_element == 0, "data does not divide into elements");
        let n_elements_in_data = (data.len() / self.size_of_element) as u64;
        assert!(
            n_elements_in_data % self.n_elements_in_package as u64 == 0,
            "data does not divide into packages"
        );
        let n_packages = n_elements_in_data / self.n_elements_in_package as u64;
        if is_merkle_layer {
            assert!(
                data.len() as u64 / n_packages == 2 * DIGEST_BYTES as u64,
                "data size is wrong for a merkle layer"
            );
            hash_elements_two_to_one::<H>(data)
        } else {
            hash_elements::<H>(data, n_packages as usize)
        }
    }

    /// Sparse variant of [Self::pack_and_hash]: hashes only the packages covered by the given
    /// element map, keyed by package index. The map must contain every element of each covered
    /// package.
    pub fn pack_and_hash_map(
        &self,
        elements: &BTreeMap<u64, Vec<u8>>,
        is_merkle_layer: bool,
    ) -> BTreeMap<u64, Vec<u8>> {
        let packages: BTreeSet<u64> =
            elements.keys().map(|idx| idx / self.n_elements_in_package as u64).collect();

        let mut hashed_packages = BTreeMap::new();
        for package in packages {
            let first = package * self.n_elements_in_package as u64;
            let last = (package + 1) * self.n_elements_in_package as u64;
            let mut packed_elements =
                Vec::with_capacity(self.size_of_element * self.n_elements_in_package);
            for i in first..last {
                let element_data =
                    elements.get(&i).unwrap_or_else(|| panic!("missing element #{i} of package"));
                assert!(
                    element_data.len() == self.size_of_element,
                    "Element size mismatches the one declared"
                );
                packed_elements.extend_from_slice(element_data);
            }
            hashed_packages.insert(package, self.pack_and_hash(&packed_elements, is_merkle_layer));
        }
        hashed_packages
    }

    /// Returns all element indices of the given packages, in increasing order.
    pub fn get_elements_in_packages(&self, packages: &[u64]) -> Vec<u64> {
        let mut elements_needed = Vec::with_capacity(packages.len() * self.n_elements_in_package);
        for &package in packages {
            elements_needed
                .extend(package * self.n_elements_in_package as u64..(package + 1) * self.n_elements_in_package as u64);
        }
        elements_needed
    }

    /// Returns the elements that share a package with a known element but are not known
    /// themselves, sorted. These are exactly the elements whose bytes must be fetched before
    /// the known elements' package hashes can be recomputed.
    pub fn elements_required_to_compute_hashes(&self, elements_known: &BTreeSet<u64>) -> Vec<u64> {
        let mut packages = BTreeSet::new();
        for &element in elements_known {
            let package_id = element / self.n_elements_in_package as u64;
            assert!(
                package_id < self.n_packages,
                "query out of range. range: [0, {}), query: {package_id}",
                self.n_packages
            );
            packages.insert(package_id);
        }

        let all_packages_elements =
            self.get_elements_in_packages(&packages.into_iter().collect::<Vec<_>>());
        all_packages_elements
            .into_iter()
            .filter(|element| !elements_known.contains(element))
            .collect()
    }
}

// HELPERS
// ================================================================================================

/// Partitions `data` into `n_elements` equal chunks and hashes each one.
fn hash_elements<H: Hasher>(data: &[u8], n_elements: usize) -> Vec<u8> {
    if n_elements == 0 && data.is_empty() {
        return vec![];
    }
    let element_size = data.len() / n_elements;
    let mut result = Vec::with_capacity(n_elements * DIGEST_BYTES);
    for chunk in data.chunks(element_size) {
        result.extend_from_slice(H::hash_bytes_with_length(chunk).as_bytes());
    }
    result
}

/// Interprets `data` as a sequence of digest pairs and hashes each pair two-to-one.
fn hash_elements_two_to_one<H: Hasher>(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len() / 2);
    for pair in data.chunks(2 * DIGEST_BYTES) {
        let left = Digest::from_bytes(&pair[..DIGEST_BYTES]);
        let right = Digest::from_bytes(&pair[DIGEST_BYTES..]);
        result.extend_from_slice(H::hash(&left, &right).as_bytes());
    }
    result
}

// TESTS
// ================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crypto::Keccak256;
    use proptest::prelude::*;

    #[test]
    fn package_sizing() {
        // A package must hold at least two digests' worth of bytes.
        assert_eq!(compute_n_elements_in_package(1, 64, 1 << 20), 64);
        assert_eq!(compute_n_elements_in_package(8, 64, 1 << 20), 8);
        assert_eq!(compute_n_elements_in_package(24, 64, 1 << 20), 4);
        assert_eq!(compute_n_elements_in_package(32, 64, 1 << 20), 2);
        assert_eq!(compute_n_elements_in_package(64, 64, 1 << 20), 1);
        assert_eq!(compute_n_elements_in_package(100, 64, 1 << 20), 1);
        // Clamped by the total number of elements.
        assert_eq!(compute_n_elements_in_package(1, 64, 16), 16);
    }

    #[test]
    fn pack_and_hash_matches_per_package_hashing() {
        let packer = PackerHasher::<Keccak256>::new(8, 32);
        assert_eq!(packer.n_elements_in_package, 8);
        assert_eq!(packer.n_packages, 4);

        let data: Vec<u8> = (0..32 * 8).map(|i| i as u8).collect();
        let hashes = packer.pack_and_hash(&data, false);
        assert_eq!(hashes.len(), 4 * DIGEST_BYTES);
        for (package, chunk) in data.chunks(64).zip(hashes.chunks(DIGEST_BYTES)) {
            assert_eq!(Keccak256::hash_bytes_with_length(package).as_bytes(), chunk);
        }
    }

    #[test]
    fn two_to_one_mode_matches_digest_hashing() {
        let packer = PackerHasher::<Keccak256>::new(DIGEST_BYTES, 8);
        assert_eq!(packer.n_elements_in_package, 2);

        let data: Vec<u8> = (0..8 * DIGEST_BYTES).map(|i| (i % 251) as u8).collect();
        let hashes = packer.pack_and_hash(&data, true);
        for (pair, chunk) in data.chunks(64).zip(hashes.chunks(DIGEST_BYTES)) {
            let left = Digest::from_bytes(&pair[..32]);
            let right = Digest::from_bytes(&pair[32..]);
            assert_eq!(Keccak256::hash(&left, &right).as_bytes(), chunk);
        }
    }

    #[test]
    fn required_elements_complete_packages() {
        let packer = PackerHasher::<Keccak256>::new(8, 16);
        assert_eq!(packer.n_elements_in_package, 8);

        let known = BTreeSet::from([2, 8]);
        let required = packer.elements_required_to_compute_hashes(&known);
        assert_eq!(required, vec![0, 1, 3, 4, 5, 6, 7, 9, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn out_of_range_query_panics() {
        let packer = PackerHasher::<Keccak256>::new(8, 16);
        let known = BTreeSet::from([16]);
        let _ = packer.elements_required_to_compute_hashes(&known);
    }

    proptest! {
        // Known elements plus the elements required to complete them always form whole
        // packages.
        #[test]
        fn union_of_known_and_required_is_whole_packages(
            log_n_elements in 0_u32..10,
            size_of_element in 1_usize..100,
            seed in any::<u64>(),
        ) {
            let n_elements = 1_u64 << log_n_elements;
            let packer = PackerHasher::<Keccak256>::new(size_of_element, n_elements);

            let mut known = BTreeSet::new();
            let mut state = seed;
            for _ in 0..=seed % 7 {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                known.insert(state % n_elements);
            }
            if known.is_empty() {
                known.insert(0);
            }

            let required = packer.elements_required_to_compute_hashes(&known);
            let mut union: BTreeSet<u64> = known.clone();
            union.extend(required.iter().copied());

            let packages: BTreeSet<u64> =
                known.iter().map(|e| e / packer.n_elements_in_package as u64).collect();
            let expected: BTreeSet<u64> = packer
                .get_elements_in_packages(&packages.into_iter().collect::<Vec<_>>())
                .into_iter()
                .collect();
            prop_assert_eq!(union, expected);
        }
    }
}
