use std::collections::{BTreeMap, BTreeSet};

use channel::{
    FieldElementBytes, NoninteractiveProverChannel, NoninteractiveVerifierChannel, VerifierError,
};
use math::FieldElement;

use crate::builder::{make_commitment_scheme_prover, make_commitment_scheme_verifier, CommitmentHashes};
use crate::row_col::RowCol;
use crate::scheme::{CommitmentSchemeProver, CommitmentSchemeVerifier};

// QUERY HELPERS
// ================================================================================================

/// Returns the set of rows touched by either query set.
fn all_query_rows(
    data_queries: &BTreeSet<RowCol>,
    integrity_queries: &BTreeSet<RowCol>,
) -> BTreeSet<u64> {
    data_queries.iter().chain(integrity_queries.iter()).map(|query| query.row()).collect()
}

/// Returns every cell of the touched rows that is not an integrity query, i.e. the cells whose
/// values are transmitted over the channel.
fn elements_to_be_transmitted(
    n_columns: usize,
    all_query_rows: &BTreeSet<u64>,
    integrity_queries: &BTreeSet<RowCol>,
) -> BTreeSet<RowCol> {
    let mut to_be_transmitted = BTreeSet::new();
    for &row in all_query_rows {
        for col in 0..n_columns as u64 {
            let query_loc = RowCol::new(row, col);
            if !integrity_queries.contains(&query_loc) {
                to_be_transmitted.insert(query_loc);
            }
        }
    }
    to_be_transmitted
}

fn element_decommit_annotation(row_col: &RowCol) -> String {
    format!("Row {}, Column {}", row_col.row(), row_col.col())
}

/// Serializes columns of field elements in row-major order: the element of column `x` and row
/// `y` lands at byte offset `(y * n_columns + x) * ELEMENT_BYTES`.
fn serialize_field_columns<F: FieldElementBytes>(columns: &[&[F]]) -> Vec<u8> {
    assert!(!columns.is_empty(), "columns must contain at least one column");
    let n_rows = columns[0].len();
    assert!(
        columns.iter().all(|column| column.len() == n_rows),
        "the sizes of the columns must be the same"
    );
    let n_columns = columns.len();

    let mut serialization = vec![0_u8; n_rows * n_columns * F::ELEMENT_BYTES];
    for (col, column) in columns.iter().enumerate() {
        for (row, value) in column.iter().enumerate() {
            let element_idx = row * n_columns + col;
            value.to_bytes_be(
                &mut serialization
                    [element_idx * F::ELEMENT_BYTES..(element_idx + 1) * F::ELEMENT_BYTES],
            );
        }
    }
    serialization
}

// TABLE PROVER
// ================================================================================================

/// A row/column view of field elements over a commitment scheme.
///
/// A table row is one commitment-scheme element; queries are cells. Cells the verifier will
/// recompute on its own (integrity queries) are never transmitted; the remaining cells of every
/// touched row are sent in row-major order during decommitment.
pub struct TableProver<F: FieldElementBytes> {
    n_columns: usize,
    commitment_scheme: Box<dyn CommitmentSchemeProver<F>>,
    data_queries: BTreeSet<RowCol>,
    integrity_queries: BTreeSet<RowCol>,
    all_query_rows: BTreeSet<u64>,
}

impl<F: FieldElementBytes> TableProver<F> {
    pub fn new(n_columns: usize, commitment_scheme: Box<dyn CommitmentSchemeProver<F>>) -> Self {
        TableProver {
            n_columns,
            commitment_scheme,
            data_queries: BTreeSet::new(),
            integrity_queries: BTreeSet::new(),
            all_query_rows: BTreeSet::new(),
        }
    }

    /// Feeds one segment of the table. `segment` holds column slices; a slice may carry
    /// `n_interleaved_columns` columns already interleaved in row-major order, in which case
    /// fewer slices are expected.
    pub fn add_segment_for_commitment(
        &mut self,
        segment: &[&[F]],
        segment_index: usize,
        n_interleaved_columns: usize,
    ) {
        assert!(
            segment.len() * n_interleaved_columns == self.n_columns,
            "segment length is expected to be equal to the number of columns"
        );
        self.commitment_scheme
            .add_segment_for_commitment(&serialize_field_columns(segment), segment_index);
    }

    pub fn commit(&mut self, channel: &mut NoninteractiveProverChannel<F>) {
        self.commitment_scheme.commit(channel);
    }

    /// Starts the decommitment phase and returns the indices of the rows whose elements must be
    /// passed to [Self::decommit]: first every queried row, then the rows the inner commitment
    /// scheme requested.
    pub fn start_decommitment_phase(
        &mut self,
        data_queries: BTreeSet<RowCol>,
        integrity_queries: BTreeSet<RowCol>,
    ) -> Vec<u64> {
        assert!(
            data_queries.is_disjoint(&integrity_queries),
            "data queries and integrity queries must be disjoint"
        );
        self.data_queries = data_queries;
        self.integrity_queries = integrity_queries;
        self.all_query_rows = all_query_rows(&self.data_queries, &self.integrity_queries);

        let requested_elements =
            self.commitment_scheme.start_decommitment_phase(&self.all_query_rows);

        let mut rows_to_request: Vec<u64> = self.all_query_rows.iter().copied().collect();
        rows_to_request.extend_from_slice(&requested_elements);
        rows_to_request
    }

    /// Transmits the non-integrity cells of every queried row and forwards the inner scheme's
    /// rows. `elements_data` holds one slice per column, covering exactly the rows returned by
    /// [Self::start_decommitment_phase], in order.
    pub fn decommit(
        &mut self,
        elements_data: &[Vec<F>],
        channel: &mut NoninteractiveProverChannel<F>,
    ) {
        assert!(
            elements_data.len() == self.n_columns,
            "expected the size of elements_data to be the number of columns"
        );
        for column in elements_data {
            assert!(
                column.len() >= self.all_query_rows.len(),
                "the number of rows does not match the number requested in \
                 start_decommitment_phase"
            );
        }

        // Note: a row all of whose cells are integrity queries does not appear in the
        // transmitted set at all, so the iteration is driven by the rows, not by the set.
        let to_transmit =
            elements_to_be_transmitted(self.n_columns, &self.all_query_rows, &self.integrity_queries);
        let mut to_transmit_it = to_transmit.iter();
        for (i, &row) in self.all_query_rows.iter().enumerate() {
            for col in 0..self.n_columns as u64 {
                let query_loc = RowCol::new(row, col);
                if self.integrity_queries.contains(&query_loc) {
                    continue;
                }
                let expected = to_transmit_it.next();
                assert!(
                    expected == Some(&query_loc),
                    "expected to transmit {:?} but found {query_loc}",
                    expected
                );
                channel.send_field_element(
                    elements_data[col as usize][i],
                    &element_decommit_annotation(&query_loc),
                );
            }
        }

        // The rows past the queried ones belong to the inner commitment scheme.
        let inner_columns: Vec<&[F]> = elements_data
            .iter()
            .map(|column| &column[self.all_query_rows.len()..])
            .collect();
        self.commitment_scheme
            .decommit(&serialize_field_columns(&inner_columns), channel);
    }
}

// TABLE VERIFIER
// ================================================================================================

/// Verifier mirror of [TableProver].
pub struct TableVerifier<F: FieldElementBytes> {
    n_columns: usize,
    commitment_scheme: Box<dyn CommitmentSchemeVerifier<F>>,
}

impl<F: FieldElementBytes> TableVerifier<F> {
    pub fn new(n_columns: usize, commitment_scheme: Box<dyn CommitmentSchemeVerifier<F>>) -> Self {
        TableVerifier { n_columns, commitment_scheme }
    }

    pub fn read_commitment(
        &mut self,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<(), VerifierError> {
        self.commitment_scheme.read_commitment(channel)
    }

    /// Receives the transmitted cells for the given query sets. The returned map holds exactly
    /// the cells of the touched rows that are not integrity queries.
    pub fn query(
        &mut self,
        data_queries: &BTreeSet<RowCol>,
        integrity_queries: &BTreeSet<RowCol>,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<BTreeMap<RowCol, F>, VerifierError> {
        assert!(
            data_queries.is_disjoint(integrity_queries),
            "data queries and integrity queries must be disjoint"
        );
        let mut response = BTreeMap::new();
        let to_receive = elements_to_be_transmitted(
            self.n_columns,
            &all_query_rows(data_queries, integrity_queries),
            integrity_queries,
        );
        for query_loc in to_receive {
            let value = channel.receive_field_element(&element_decommit_annotation(&query_loc))?;
            response.insert(query_loc, value);
        }
        Ok(response)
    }

    /// Rebuilds the queried rows from `all_rows_data` (transmitted cells plus recomputed
    /// integrity cells) and checks them against the commitment.
    pub fn verify_decommitment(
        &mut self,
        all_rows_data: &BTreeMap<RowCol, F>,
        channel: &mut NoninteractiveVerifierChannel<F>,
    ) -> Result<bool, VerifierError> {
        let mut integrity_map: BTreeMap<u64, Vec<u8>> = BTreeMap::new();

        // The map is ordered row-major, so cells appear in the natural reading order of a
        // table: every row must be fully populated before the next one begins.
        let mut entries = all_rows_data.iter().peekable();
        while let Some(&(first_loc, _)) = entries.peek() {
            let cur_row = first_loc.row();
            let mut row_bytes = vec![0_u8; self.n_columns * F::ELEMENT_BYTES];
            for col in 0..self.n_columns as u64 {
                let (loc, value) =
                    entries.next().expect("not enough columns in the provided map");
                assert!(
                    loc.row() == cur_row && loc.col() == col,
                    "data skips cells; expected ({cur_row}, {col}), found {loc}"
                );
                value.to_bytes_be(
                    &mut row_bytes[col as usize * F::ELEMENT_BYTES
                        ..(col as usize + 1) * F::ELEMENT_BYTES],
                );
            }
            let inserted = integrity_map.insert(cur_row, row_bytes);
            assert!(inserted.is_none(), "row already exists in the map");
        }

        self.commitment_scheme.verify_integrity(&integrity_map, channel)
    }
}

// FACTORIES
// ================================================================================================

/// Constructor closure for table provers bound to a commitment configuration; arguments are
/// `(n_segments, n_rows_per_segment, n_columns)`.
pub type TableProverFactory<F> = Box<dyn Fn(usize, u64, usize) -> TableProver<F>>;

/// Constructor closure for table verifiers; arguments are `(n_rows, n_columns)`.
pub type TableVerifierFactory<F> = Box<dyn Fn(u64, usize) -> TableVerifier<F>>;

/// Returns a [TableProverFactory] whose provers commit through the layered scheme built by
/// [make_commitment_scheme_prover].
pub fn make_table_prover_factory<F: FieldElementBytes + 'static>(
    n_out_of_memory_merkle_layers: usize,
    n_verifier_friendly_commitment_layers: usize,
    commitment_hashes: CommitmentHashes,
) -> TableProverFactory<F> {
    Box::new(move |n_segments, n_rows_per_segment, n_columns| {
        let commitment_scheme = make_commitment_scheme_prover::<F>(
            F::ELEMENT_BYTES * n_columns,
            n_rows_per_segment,
            n_segments,
            n_verifier_friendly_commitment_layers,
            commitment_hashes,
            n_out_of_memory_merkle_layers,
        );
        TableProver::new(n_columns, commitment_scheme)
    })
}

/// Returns a [TableVerifierFactory] mirroring [make_table_prover_factory].
pub fn make_table_verifier_factory<F: FieldElementBytes + 'static>(
    n_verifier_friendly_commitment_layers: usize,
    commitment_hashes: CommitmentHashes,
) -> TableVerifierFactory<F> {
    Box::new(move |n_rows, n_columns| {
        let commitment_scheme = make_commitment_scheme_verifier::<F>(
            F::ELEMENT_BYTES * n_columns,
            n_rows,
            n_verifier_friendly_commitment_layers,
            commitment_hashes,
        );
        TableVerifier::new(n_columns, commitment_scheme)
    })
}

// TESTS
// ================================================================================================
