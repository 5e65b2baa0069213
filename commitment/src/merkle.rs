use std::collections::{BTreeMap, BTreeSet, VecDeque};
use core::marker::PhantomData;

use channel::{
    FieldElementBytes, NoninteractiveProverChannel, NoninteractiveVerifierChannel, VerifierError,
};
use crypto::{Digest, Hasher};

use crate::safe_log2;

// MERKLE TREE
// ================================================================================================

/// A complete binary Merkle tree over a power-of-two number of digest leaves.
///
/// Nodes are stored as a heap-indexed array: `nodes[1]` is the root and the children of
/// `nodes[i]` are `nodes[2i]` and `nodes[2i + 1]`; leaves occupy `nodes[n..2n)`. Leaves may be
/// added in arbitrary aligned slices, and every internal node derivable from an added slice is
/// computed eagerly, so only the top of the tree remains to be hashed at root time.
pub struct MerkleTree<H: Hasher> {
    nodes: Vec<Digest>,
    data_length: u64,
    _hasher: PhantomData<H>,
}

impl<H: Hasher> MerkleTree<H> {
    /// Returns an empty tree over `data_length` leaves.
    pub fn new(data_length: u64) -> Self {
        assert!(data_length.is_power_of_two(), "data length must be a power of two");
        MerkleTree {
            nodes: vec![Digest::default(); 2 * data_length as usize],
            data_length,
            _hasher: PhantomData,
        }
    }

    /// Returns the number of leaves of this tree.
    pub fn data_length(&self) -> u64 {
        self.data_length
    }

    /// Copies `data` into the leaves starting at `start_index` and computes every internal node
    /// both of whose children are covered by the slice. `start_index` must be aligned to the
    /// slice length.
    pub fn add_data(&mut self, data: &[Digest], start_index: u64) {
        assert!(
            start_index + data.len() as u64 <= self.data_length,
            "data of length {} starting at {start_index} exceeds the data length declared at \
             tree construction, {}",
            data.len(),
            self.data_length
        );
        let first_leaf = (self.data_length + start_index) as usize;
        self.nodes[first_leaf..first_leaf + data.len()].copy_from_slice(data);

        let mut cur = first_leaf / 2;
        let mut sub_layer_length = data.len() / 2;
        while sub_layer_length > 0 {
            for i in cur..cur + sub_layer_length {
                self.nodes[i] = H::hash(&self.nodes[2 * i], &self.nodes[2 * i + 1]);
            }
            sub_layer_length /= 2;
            cur /= 2;
        }
    }

    /// Computes the root, re-hashing every node above depth `min_depth_assumed_correct` and
    /// trusting everything below it.
    pub fn get_root(&mut self, min_depth_assumed_correct: usize) -> Digest {
        assert!(
            min_depth_assumed_correct <= safe_log2(self.data_length),
            "depth assumed correct must be at most the tree's height"
        );
        for i in (1..(1_usize << min_depth_assumed_correct)).rev() {
            self.nodes[i] = H::hash(&self.nodes[2 * i], &self.nodes[2 * i + 1]);
        }
        self.nodes[1]
    }

    /// Sends the decommitment for the given query set over the channel.
    ///
    /// Nodes are discovered with a FIFO sweep from the query leaves towards the root; a sibling
    /// that is itself on the sweep is skipped since the verifier can recompute it.
    pub fn generate_decommitment<F: FieldElementBytes>(
        &self,
        queries: &BTreeSet<u64>,
        channel: &mut NoninteractiveProverChannel<F>,
    ) {
        assert!(!queries.is_empty(), "empty input queries");

        let mut queue = VecDeque::new();
        for &query_idx in queries {
            assert!(query_idx < self.data_length, "query out of range");
            queue.push_back(query_idx + self.data_length);
        }

        let mut node_index = *queue.front().unwrap();
        while node_index != 1 {
            queue.pop_front();
            // Push the parent before the sibling check so the queue never runs empty.
            queue.push_back(node_index / 2);
            let sibling_node_index = node_index ^ 1;
            if *queue.front().unwrap() == sibling_node_index {
                // The sibling is on the sweep itself, so its value is implied.
                queue.pop_front();
            } else {
                channel.send_decommitment_node(
                    &self.nodes[sibling_node_index as usize],
                    &format!("For node {sibling_node_index}"),
                );
            }
            node_index = *queue.front().unwrap();
        }
    }

    /// Replays the decommitment sweep on the verifier side and compares the derived root to the
    /// commitment. Sibling values not implied by the sweep are read from the channel.
    pub fn verify_decommitment<F: FieldElementBytes>(
        data_to_verify: &BTreeMap<u64, Digest>,
        total_data_length: u64,
        merkle_root: &Digest,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<bool, VerifierError> {
        assert!(total_data_length > 0, "data length has to be at least 1");

        let mut queue = VecDeque::new();
        for (&idx, &digest) in data_to_verify {
            queue.push_back((idx + total_data_length, digest));
        }

        let mut siblings = [Digest::default(); 2];
        let (mut node_index, mut node_hash) = *queue.front().expect("empty input queries");
        while node_index != 1 {
            queue.pop_front();
            siblings[(node_index & 1) as usize] = node_hash;

            let sibling_node_index = node_index ^ 1;
            let sibling_node_hash = match queue.front() {
                Some(&(front_index, front_hash)) if front_index == sibling_node_index => {
                    queue.pop_front();
                    front_hash
                }
                _ => channel.receive_decommitment_node(&format!("For node {sibling_node_index}"))?,
            };
            siblings[(sibling_node_index & 1) as usize] = sibling_node_hash;
            queue.push_back((node_index / 2, H::hash(&siblings[0], &siblings[1])));

            (node_index, node_hash) = *queue.front().unwrap();
        }

        Ok(node_hash == *merkle_root)
    }
}

// TESTS
// ================================================================================================
