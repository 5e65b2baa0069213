use core::fmt;

use crate::field::FieldElementBytes;

// CHANNEL STATISTICS
// ================================================================================================

/// Counters describing the traffic that went through a channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelStatistics {
    pub byte_count: usize,
    pub hash_count: usize,
    pub commitment_count: usize,
    pub field_element_count: usize,
    pub data_count: usize,
}

impl fmt::Display for ChannelStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Byte count: {}", self.byte_count)?;
        writeln!(f, "Hash count: {}", self.hash_count)?;
        writeln!(f, "Commitment count: {}", self.commitment_count)?;
        writeln!(f, "Field element count: {}", self.field_element_count)?;
        writeln!(f, "Data count: {}", self.data_count)
    }
}

// CHANNEL STATE
// ================================================================================================

/// Bookkeeping shared by the prover and verifier channels: the annotated protocol trace, the
/// scope stack, traffic statistics and the query-phase latch.
pub struct ChannelState {
    annotation_prefix: String,
    annotation_scope: Vec<String>,
    annotations: Vec<String>,
    annotations_enabled: bool,
    extra_annotations_enabled: bool,
    expected_annotations: Option<Vec<String>>,
    prover_to_verifier_bytes: usize,
    pub statistics: ChannelStatistics,
    pub(crate) in_query_phase: bool,
}

impl ChannelState {
    pub fn new() -> Self {
        ChannelState {
            annotation_prefix: ": ".to_string(),
            annotation_scope: Vec::new(),
            annotations: Vec::new(),
            annotations_enabled: true,
            extra_annotations_enabled: true,
            expected_annotations: None,
            prover_to_verifier_bytes: 0,
            statistics: ChannelStatistics::default(),
            in_query_phase: false,
        }
    }

    /// Records an annotation for data sent from the prover to the verifier, advancing the byte
    /// range bookkeeping by `n_bytes`.
    pub(crate) fn annotate_prover_to_verifier(&mut self, annotation: &str, n_bytes: usize) {
        let start = self.prover_to_verifier_bytes;
        self.prover_to_verifier_bytes += n_bytes;
        let end = self.prover_to_verifier_bytes;
        let line = format!("P->V[{start}:{end}]: {}{annotation}\n", self.annotation_prefix);
        self.add_annotation(line);
    }

    /// Records an annotation for randomness sent from the verifier to the prover.
    pub(crate) fn annotate_verifier_to_prover(&mut self, annotation: &str) {
        let line = format!("V->P: {}{annotation}\n", self.annotation_prefix);
        self.add_annotation(line);
    }

    fn add_annotation(&mut self, annotation: String) {
        assert!(
            self.annotations_enabled,
            "cannot add annotation after annotations were disabled"
        );
        if let Some(expected) = &self.expected_annotations {
            let idx = self.annotations.len();
            assert!(idx < expected.len(), "expected annotations list is too short");
            assert_eq!(
                expected[idx], annotation,
                "annotation mismatch: expected '{}', found '{}'",
                expected[idx], annotation
            );
        }
        self.annotations.push(annotation);
    }

    fn update_annotation_prefix(&mut self) {
        let mut prefix = String::new();
        for scope in &self.annotation_scope {
            prefix.push('/');
            prefix.push_str(scope);
        }
        prefix.push_str(": ");
        self.annotation_prefix = prefix;
    }
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Proof Protocol\n")?;
        for annotation in &self.annotations {
            f.write_str(annotation)?;
        }
        writeln!(f, "\nProof Statistics:\n")?;
        write!(f, "{}", self.statistics)
    }
}

// CHANNEL INTERFACE
// ================================================================================================

/// Behavior shared by the prover and verifier channels: annotation scoping, the query-phase
/// latch, and access to the collected trace and statistics.
pub trait Channel {
    /// The field whose elements travel over this channel.
    type Field: FieldElementBytes;

    fn state(&self) -> &ChannelState;
    fn state_mut(&mut self) -> &mut ChannelState;

    /// Pushes a new annotation scope; subsequent annotations are prefixed with it.
    fn enter_annotation_scope(&mut self, scope: &str) {
        let state = self.state_mut();
        state.annotation_scope.push(scope.to_string());
        state.update_annotation_prefix();
    }

    /// Pops the innermost annotation scope.
    fn exit_annotation_scope(&mut self) {
        let state = self.state_mut();
        state.annotation_scope.pop();
        state.update_annotation_prefix();
    }

    /// Runs `f` inside the given annotation scope, guaranteeing the scope is exited afterwards.
    fn in_scope<R>(&mut self, scope: &str, f: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        self.enter_annotation_scope(scope);
        let result = f(self);
        self.exit_annotation_scope();
        result
    }

    /// Latches the query phase. Afterwards no randomness may be drawn on either side.
    fn begin_query_phase(&mut self) {
        self.state_mut().in_query_phase = true;
    }

    fn disable_annotations(&mut self) {
        self.state_mut().annotations_enabled = false;
    }

    fn disable_extra_annotations(&mut self) {
        self.state_mut().extra_annotations_enabled = false;
    }

    fn annotations_enabled(&self) -> bool {
        self.state().annotations_enabled
    }

    fn extra_annotations_disabled(&self) -> bool {
        !self.state().extra_annotations_enabled
    }

    /// Returns the annotated protocol trace collected so far.
    fn annotations(&self) -> &[String] {
        &self.state().annotations
    }

    /// Installs a trace this channel's own annotations are checked against, line by line.
    /// Usually this is the trace collected by the prover channel.
    fn set_expected_annotations(&mut self, expected: Vec<String>) {
        self.state_mut().expected_annotations = Some(expected);
    }

    fn statistics(&self) -> &ChannelStatistics {
        &self.state().statistics
    }
}

// ANNOTATION FORMATTING
// ================================================================================================
// Shared by both channels so that matching operations produce byte-identical annotation lines.

pub(crate) fn format_data(annotation: &str, data: &[u8]) -> String {
    format!("{annotation}: Data(0x{})", hex::encode(data))
}

pub(crate) fn format_field_element<F: FieldElementBytes>(annotation: &str, value: &F) -> String {
    format!("{annotation}: Field Element({})", value.to_hex())
}

pub(crate) fn format_field_element_span<F: FieldElementBytes>(
    annotation: &str,
    values: &[F],
) -> String {
    let rendered: Vec<String> = values.iter().map(|v| v.to_hex()).collect();
    format!("{annotation}: Field Elements({})", rendered.join(", "))
}

pub(crate) fn format_hash(annotation: &str, digest: &crypto::Digest) -> String {
    format!("{annotation}: Hash({})", digest.to_hex())
}

pub(crate) fn format_number(annotation: &str, number: u64) -> String {
    format!("{annotation}: Number({number})")
}
